// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;

use tick::Clock;

use crate::{CallError, CircuitOpenError, Context, Outcome};

mod constants;

#[cfg(any(feature = "serde", test))]
mod config;
#[cfg(any(feature = "serde", test))]
pub use config::{BreakerConfig, TripConditionConfig};

mod counters;
pub use counters::Counters;

mod engine;
use engine::{Engine, EngineSettings, Enter, Exit, Ticket, Transition};

mod half_open_mode;
pub use half_open_mode::HalfOpenMode;

mod options;
pub use options::BreakerOptions;
use options::OnStateChange;

mod permit;
pub use permit::Permit;

mod state;
pub use state::{CircuitState, StateChange};

mod telemetry;
pub(crate) use telemetry::BreakerTelemetry;

mod trip;
pub use trip::TripCondition;

/// A thread-safe circuit breaker.
///
/// The breaker is cheap to clone; clones share the same state. It starts closed, opens
/// when its [`TripCondition`] is met, and after the open timeout admits probes in the
/// half-open state until enough of them succeed (closing it) or one fails (reopening it).
///
/// Calls are admitted with [`allow`][Self::allow], which hands out a [`Permit`] used to
/// report the outcome. [`call`][Self::call] wraps that protocol around an async
/// operation, treating `Err` as a failure.
///
/// # Examples
///
/// ```rust
/// # use std::time::Duration;
/// # use tick::Clock;
/// use tripwire::{BreakerOptions, CircuitBreaker, CircuitState, Context};
///
/// # fn example(clock: Clock) {
/// let breaker = CircuitBreaker::new("inventory", &Context::new(&clock), BreakerOptions::default().trip_threshold(2));
///
/// breaker.record_failure();
/// breaker.record_failure();
/// assert_eq!(breaker.state(), CircuitState::Open);
/// assert!(breaker.allow().is_err());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    shared: Arc<BreakerShared>,
}

#[derive(Debug)]
struct BreakerShared {
    name: Cow<'static, str>,
    engine: Engine,
    clock: Clock,
    telemetry: BreakerTelemetry,
    on_state_change: Option<OnStateChange>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    ///
    /// The name identifies the breaker in errors and as `resilience.strategy.name` in
    /// telemetry. Prefer `snake_case`.
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>, context: &Context, options: BreakerOptions) -> Self {
        let name = name.into();
        let clock = context.clock().clone();

        Self {
            shared: Arc::new(BreakerShared {
                engine: Engine::new(EngineSettings::from(&options), clock.clone()),
                telemetry: BreakerTelemetry::new(context.create_telemetry(name.clone())),
                on_state_change: options.on_state_change,
                clock,
                name,
            }),
        }
    }

    /// The breaker's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Asks to make a call.
    ///
    /// Returns a [`Permit`] when the call may proceed. While open, and while half-open with
    /// all probe slots taken, the call is rejected with a [`CircuitOpenError`].
    ///
    /// The first call after the open timeout moves the breaker to half-open and is admitted
    /// as a probe.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitOpenError`] when the call is rejected.
    pub fn allow(&self) -> Result<Permit, CircuitOpenError> {
        match self.shared.engine.enter() {
            Enter::Accepted { ticket, transition } => {
                if let Some(transition) = transition {
                    self.on_transition(&transition);
                }
                Ok(Permit::new(self.clone(), ticket))
            }
            Enter::Rejected { state, retry_after } => {
                self.shared.telemetry.rejected(state);
                Err(CircuitOpenError::new(self.shared.name.clone(), state, retry_after))
            }
        }
    }

    /// Records a success against the current generation, without a permit.
    pub fn record_success(&self) {
        self.record(None, Outcome::Success);
    }

    /// Records a failure against the current generation, without a permit.
    ///
    /// Outcomes recorded while the breaker is open are ignored.
    pub fn record_failure(&self) {
        self.record(None, Outcome::Failure);
    }

    /// Runs `operation` if the breaker admits it and records its result.
    ///
    /// `Ok` counts as a success and `Err` as a failure. If the returned future is dropped
    /// before completion, nothing is counted. Use an [`Interceptor`](crate::Interceptor)
    /// for custom classification or deadlines.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Rejected`] without running `operation` when the breaker rejects
    /// the call, and [`CallError::Operation`] carrying the operation's own error otherwise.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.allow()?;
        let result = operation().await;

        if result.is_ok() {
            permit.succeeded();
        } else {
            permit.failed();
        }

        result.map_err(CallError::Operation)
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.shared.engine.state()
    }

    /// The counters of the current generation.
    #[must_use]
    pub fn counters(&self) -> Counters {
        self.shared.engine.counters()
    }

    /// The current generation. It changes on every transition and on [`reset`][Self::reset] or
    /// [`trip`][Self::trip].
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.shared.engine.generation()
    }

    /// Whether [`allow`][Self::allow] would admit a call right now.
    ///
    /// The answer may be outdated by the time it is acted upon.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.shared.engine.is_ready()
    }

    /// Closes the breaker and clears its counters, regardless of its state.
    pub fn reset(&self) {
        if let Some(transition) = self.shared.engine.force(CircuitState::Closed) {
            self.on_transition(&transition);
        }
    }

    /// Opens the breaker, regardless of its state. The open timeout starts now.
    pub fn trip(&self) {
        if let Some(transition) = self.shared.engine.force(CircuitState::Open) {
            self.on_transition(&transition);
        }
    }

    pub(crate) fn clock(&self) -> &Clock {
        &self.shared.clock
    }

    pub(crate) fn telemetry(&self) -> &BreakerTelemetry {
        &self.shared.telemetry
    }

    pub(crate) fn record(&self, ticket: Option<Ticket>, outcome: Outcome) {
        let exit = self.shared.engine.exit(ticket, outcome);

        if ticket.is_some_and(|ticket| ticket.probe) && exit != Exit::Stale && outcome != Outcome::Indeterminate {
            self.shared.telemetry.probe(outcome);
        }

        if let Exit::Transitioned(transition) = exit {
            self.on_transition(&transition);
        }
    }

    fn on_transition(&self, transition: &Transition) {
        self.shared.telemetry.transition(transition);

        if let Some(on_state_change) = &self.shared.on_state_change {
            on_state_change.call(StateChange {
                from: transition.from,
                to: transition.to,
                at: self.shared.clock.system_time(),
                generation: transition.generation,
            });
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
#[cfg(not(miri))]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use opentelemetry::KeyValue;
    use tick::ClockControl;

    use super::*;
    use crate::testing::{LogCapture, MetricTester};
    use crate::utils::EVENT_NAME;

    static_assertions::assert_impl_all!(CircuitBreaker: Send, Sync, Clone, std::fmt::Debug);
    static_assertions::assert_impl_all!(Permit: Send, Sync);

    fn breaker(control: &ClockControl, options: BreakerOptions) -> CircuitBreaker {
        CircuitBreaker::new("test_breaker", &Context::new(control.to_clock()), options)
    }

    #[test]
    fn name_is_kept() {
        let control = ClockControl::new();
        assert_eq!(breaker(&control, BreakerOptions::default()).name(), "test_breaker");
    }

    #[test]
    fn clones_share_state() {
        let control = ClockControl::new();
        let breaker = breaker(&control, BreakerOptions::default().trip_threshold(1));
        let clone = breaker.clone();

        clone.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn on_state_change_sees_every_transition() {
        let control = ClockControl::new();
        let changes = Arc::new(Mutex::new(Vec::new()));
        let changes_clone = Arc::clone(&changes);
        let breaker = breaker(
            &control,
            BreakerOptions::default()
                .trip_threshold(1)
                .open_timeout(Duration::from_secs(1))
                .on_state_change(move |change| changes_clone.lock().unwrap().push((change.from(), change.to()))),
        );

        breaker.record_failure();
        control.advance(Duration::from_secs(1));
        breaker.allow().unwrap().succeeded();

        assert_eq!(
            *changes.lock().unwrap(),
            vec![
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
    }

    #[test]
    fn on_state_change_can_reenter_breaker() {
        let control = ClockControl::new();
        let observed = Arc::new(Mutex::new(None));
        let observed_clone = Arc::clone(&observed);
        let slot: Arc<Mutex<Option<CircuitBreaker>>> = Arc::new(Mutex::new(None));
        let slot_clone = Arc::clone(&slot);

        let breaker = breaker(
            &control,
            BreakerOptions::default().trip_threshold(1).on_state_change(move |_| {
                if let Some(breaker) = slot_clone.lock().unwrap().as_ref() {
                    *observed_clone.lock().unwrap() = Some(breaker.state());
                }
            }),
        );
        *slot.lock().unwrap() = Some(breaker.clone());

        breaker.record_failure();
        assert_eq!(*observed.lock().unwrap(), Some(CircuitState::Open));

        // break the reference cycle
        slot.lock().unwrap().take();
    }

    #[test]
    fn state_change_carries_clock_time_and_generation() {
        let control = ClockControl::new();
        let clock = control.to_clock();
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        let breaker = CircuitBreaker::new(
            "timed",
            &Context::new(&clock),
            BreakerOptions::default().on_state_change(move |change| *seen_clone.lock().unwrap() = Some(change)),
        );

        breaker.trip();

        let change = seen.lock().unwrap().unwrap();
        assert_eq!(change.at(), clock.system_time());
        assert_eq!(change.generation(), breaker.generation());
    }

    #[test]
    fn reset_and_trip_force_state() {
        let control = ClockControl::new();
        let breaker = breaker(&control, BreakerOptions::default());

        breaker.trip();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.is_ready());

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.is_ready());
        assert_eq!(breaker.counters(), Counters::default());
    }

    #[test]
    fn dropped_probe_is_indeterminate() {
        let control = ClockControl::new();
        let breaker = breaker(
            &control,
            BreakerOptions::default()
                .trip_threshold(1)
                .half_open_mode(HalfOpenMode::limited(1)),
        );

        breaker.record_failure();
        control.advance(Duration::from_secs(5));

        let probe = breaker.allow().unwrap();
        assert!(probe.is_probe());
        breaker.allow().unwrap_err();

        drop(probe);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert_eq!(breaker.counters().total(), 0);
        breaker.allow().unwrap().succeeded();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn permit_dropped_after_fail_on_drop_counts_failure() {
        let control = ClockControl::new();
        let breaker = breaker(&control, BreakerOptions::default().trip_threshold(2));

        drop(breaker.allow().unwrap().fail_on_drop());
        assert_eq!(breaker.counters().failures(), 1);

        breaker.allow().unwrap().fail_on_drop().succeeded();
        assert_eq!(breaker.counters().successes(), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn rejection_reports_retry_after() {
        let control = ClockControl::new();
        let breaker = breaker(&control, BreakerOptions::default().trip_threshold(1));

        breaker.record_failure();
        control.advance(Duration::from_secs(2));

        let error = breaker.allow().unwrap_err();
        assert_eq!(error.state(), CircuitState::Open);
        assert_eq!(error.retry_after(), Duration::from_secs(3));
        assert_eq!(error.breaker(), "test_breaker");
        assert_eq!(breaker.counters().rejected(), 1);
    }

    #[test]
    fn call_runs_operation_and_records() {
        let control = ClockControl::new();
        let breaker = breaker(&control, BreakerOptions::default().trip_threshold(1));

        let ok: Result<u32, CallError<std::io::Error>> = futures::executor::block_on(breaker.call(|| async { Ok(7) }));
        assert_eq!(ok.unwrap(), 7);
        assert_eq!(breaker.counters().successes(), 1);

        let err = futures::executor::block_on(breaker.call(|| async { Err::<u32, _>(std::io::Error::other("down")) }));
        assert_eq!(err.unwrap_err().into_operation_error().unwrap().to_string(), "down");
        assert_eq!(breaker.state(), CircuitState::Open);

        let rejected = futures::executor::block_on(breaker.call(|| async { Ok::<_, std::io::Error>(1) }));
        assert!(rejected.unwrap_err().is_rejected());
    }

    #[test]
    fn lifecycle_is_reported() {
        let control = ClockControl::new();
        let tester = MetricTester::new();
        let logs = LogCapture::new();
        let _guard = logs.set_default();
        let context = Context::new(control.to_clock())
            .name("svc")
            .enable_metrics(tester.meter_provider())
            .enable_logs();
        let breaker = CircuitBreaker::new("dep", &context, BreakerOptions::default().trip_threshold(1));

        breaker.record_failure();
        _ = breaker.allow();
        control.advance(Duration::from_secs(5));
        breaker.allow().unwrap().succeeded();

        for event in ["circuit_opened", "circuit_rejected", "circuit_half_opened", "circuit_probe", "circuit_closed"] {
            tester.assert_attributes(&[KeyValue::new(EVENT_NAME, event)], None);
        }
        logs.assert_contains("tripwire.circuit_breaker.opened");
        logs.assert_contains("tripwire.circuit_breaker.rejected");
        logs.assert_contains("tripwire.circuit_breaker.half_opened");
        logs.assert_contains("tripwire.circuit_breaker.probe");
        logs.assert_contains("tripwire.circuit_breaker.closed");
        logs.assert_contains("pipeline.name=svc");
        logs.assert_contains("strategy.name=dep");
    }
}
