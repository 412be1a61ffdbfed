// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#[cfg(any(feature = "metrics", test))]
use opentelemetry::KeyValue;

use super::CircuitState;
use super::engine::Transition;
use crate::Outcome;
use crate::utils::TelemetryHelper;
#[cfg(any(feature = "metrics", test))]
use crate::utils::{EVENT_NAME, PIPELINE_NAME, STRATEGY_NAME};

#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_OPENED_EVENT_NAME: &str = "circuit_opened";
#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_CLOSED_EVENT_NAME: &str = "circuit_closed";
#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_HALF_OPENED_EVENT_NAME: &str = "circuit_half_opened";
#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_REJECTED_EVENT_NAME: &str = "circuit_rejected";
#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_PROBE_EVENT_NAME: &str = "circuit_probe";

#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_STATE: &str = "resilience.circuit_breaker.state";
#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_PROBE_RESULT: &str = "resilience.circuit_breaker.probe.result";

/// Reports breaker events to the sinks enabled on the [`Context`](crate::Context).
#[derive(Debug, Clone)]
#[cfg_attr(
    not(any(feature = "metrics", feature = "logs", test)),
    expect(dead_code, reason = "nothing is reported when neither logs nor metrics are enabled")
)]
pub(crate) struct BreakerTelemetry {
    helper: TelemetryHelper,
}

#[cfg_attr(
    not(any(feature = "metrics", feature = "logs", test)),
    expect(unused_variables, reason = "unused when neither logs nor metrics are enabled")
)]
impl BreakerTelemetry {
    pub fn new(helper: TelemetryHelper) -> Self {
        Self { helper }
    }

    pub fn rejected(&self, state: CircuitState) {
        #[cfg(any(feature = "metrics", test))]
        self.report(CIRCUIT_REJECTED_EVENT_NAME, state, None);

        #[cfg(any(feature = "logs", test))]
        if self.helper.logs_enabled {
            tracing::event!(
                name: "tripwire.circuit_breaker.rejected",
                tracing::Level::WARN,
                pipeline.name = %self.helper.pipeline_name,
                strategy.name = %self.helper.strategy_name,
                circuit_breaker.state = state.as_str(),
            );
        }
    }

    pub fn probe(&self, outcome: Outcome) {
        #[cfg(any(feature = "metrics", test))]
        self.report(CIRCUIT_PROBE_EVENT_NAME, CircuitState::HalfOpen, Some(outcome));

        #[cfg(any(feature = "logs", test))]
        if self.helper.logs_enabled {
            tracing::event!(
                name: "tripwire.circuit_breaker.probe",
                tracing::Level::INFO,
                pipeline.name = %self.helper.pipeline_name,
                strategy.name = %self.helper.strategy_name,
                circuit_breaker.state = CircuitState::HalfOpen.as_str(),
                circuit_breaker.probe.result = outcome.as_str(),
            );
        }
    }

    pub fn transition(&self, transition: &Transition) {
        match transition.to {
            CircuitState::Open => {
                #[cfg(any(feature = "metrics", test))]
                self.report(CIRCUIT_OPENED_EVENT_NAME, CircuitState::Open, None);

                #[cfg(any(feature = "logs", test))]
                if self.helper.logs_enabled {
                    tracing::event!(
                        name: "tripwire.circuit_breaker.opened",
                        tracing::Level::WARN,
                        pipeline.name = %self.helper.pipeline_name,
                        strategy.name = %self.helper.strategy_name,
                        circuit_breaker.state = CircuitState::Open.as_str(),
                        circuit_breaker.previous_state = transition.from.as_str(),
                        circuit_breaker.generation = transition.generation,
                        circuit_breaker.failures = transition.counters.failures(),
                        circuit_breaker.successes = transition.counters.successes(),
                    );
                }
            }
            CircuitState::HalfOpen => {
                #[cfg(any(feature = "metrics", test))]
                self.report(CIRCUIT_HALF_OPENED_EVENT_NAME, CircuitState::HalfOpen, None);

                #[cfg(any(feature = "logs", test))]
                if self.helper.logs_enabled {
                    tracing::event!(
                        name: "tripwire.circuit_breaker.half_opened",
                        tracing::Level::INFO,
                        pipeline.name = %self.helper.pipeline_name,
                        strategy.name = %self.helper.strategy_name,
                        circuit_breaker.state = CircuitState::HalfOpen.as_str(),
                        circuit_breaker.generation = transition.generation,
                        circuit_breaker.rejections = transition.counters.rejected(),
                    );
                }
            }
            CircuitState::Closed => {
                #[cfg(any(feature = "metrics", test))]
                self.report(CIRCUIT_CLOSED_EVENT_NAME, CircuitState::Closed, None);

                #[cfg(any(feature = "logs", test))]
                if self.helper.logs_enabled {
                    tracing::event!(
                        name: "tripwire.circuit_breaker.closed",
                        tracing::Level::INFO,
                        pipeline.name = %self.helper.pipeline_name,
                        strategy.name = %self.helper.strategy_name,
                        circuit_breaker.state = CircuitState::Closed.as_str(),
                        circuit_breaker.generation = transition.generation,
                        circuit_breaker.open.duration = transition.broken_for.unwrap_or_default().as_secs(),
                        circuit_breaker.probes.successful = transition.counters.successes(),
                    );
                }
            }
        }
    }

    /// Logs the completion of a call made through an interceptor.
    #[cfg_attr(
        not(any(feature = "logs", test)),
        expect(unused_variables, reason = "only logged, never reported as a metric")
    )]
    pub fn call(&self, state: CircuitState, outcome: Option<Outcome>) {
        #[cfg(any(feature = "logs", test))]
        if self.helper.logs_enabled {
            tracing::event!(
                name: "tripwire.interceptor.call",
                tracing::Level::DEBUG,
                pipeline.name = %self.helper.pipeline_name,
                strategy.name = %self.helper.strategy_name,
                circuit_breaker.state = state.as_str(),
                call.outcome = outcome.map_or("rejected", |outcome| outcome.as_str()),
            );
        }
    }

    #[cfg(any(feature = "metrics", test))]
    fn report(&self, event: &'static str, state: CircuitState, probe_result: Option<Outcome>) {
        if !self.helper.metrics_enabled() {
            return;
        }

        let base = [
            KeyValue::new(PIPELINE_NAME, self.helper.pipeline_name.clone()),
            KeyValue::new(STRATEGY_NAME, self.helper.strategy_name.clone()),
            KeyValue::new(EVENT_NAME, event),
            KeyValue::new(CIRCUIT_STATE, state.as_str()),
        ];

        match probe_result {
            Some(outcome) => {
                let [a, b, c, d] = base;
                self.helper
                    .report_metrics(&[a, b, c, d, KeyValue::new(CIRCUIT_PROBE_RESULT, outcome.as_str())]);
            }
            None => self.helper.report_metrics(&base),
        }
    }
}
