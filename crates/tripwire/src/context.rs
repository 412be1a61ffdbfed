// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;

use tick::Clock;

use crate::utils::TelemetryHelper;

pub(crate) const DEFAULT_CONTEXT_NAME: &str = "default";

#[cfg(any(feature = "metrics", test))]
const METER_SCOPE: &str = "tripwire";

/// Shared dependencies for a group of circuit breakers.
///
/// A context carries the [`Clock`] breakers use to measure timeouts and the telemetry
/// configuration they report through. Create one per component and pass it to every
/// [`CircuitBreaker`](crate::CircuitBreaker) the component owns; the context name is
/// attached to all emitted events as `resilience.pipeline.name`.
///
/// # Examples
///
/// ```rust
/// # use tick::Clock;
/// # use tripwire::Context;
/// # fn example(clock: Clock) {
/// let context = Context::new(&clock).name("checkout");
/// # }
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Context {
    clock: Clock,
    name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    meter: Option<opentelemetry::metrics::Meter>,
    #[cfg(any(feature = "logs", test))]
    logs_enabled: bool,
}

impl Context {
    /// Create a context with a clock. Initializes with `name = "default"`.
    pub fn new(clock: impl AsRef<Clock>) -> Self {
        Self {
            clock: clock.as_ref().clone(),
            name: Cow::Borrowed(DEFAULT_CONTEXT_NAME),
            #[cfg(any(feature = "metrics", test))]
            meter: None,
            #[cfg(any(feature = "logs", test))]
            logs_enabled: false,
        }
    }

    /// Set the context name for telemetry correlation. Prefer `snake_case`.
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Enable metrics reporting with the given OpenTelemetry meter provider.
    #[must_use]
    #[cfg(any(feature = "metrics", test))]
    pub fn enable_metrics(self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        Self {
            meter: Some(provider.meter_with_scope(
                opentelemetry::InstrumentationScope::builder(METER_SCOPE)
                    .with_version(env!("CARGO_PKG_VERSION"))
                    .build(),
            )),
            ..self
        }
    }

    /// Enable structured logging of breaker events.
    #[must_use]
    #[cfg(any(feature = "logs", test))]
    pub fn enable_logs(self) -> Self {
        Self { logs_enabled: true, ..self }
    }

    pub(crate) fn clock(&self) -> &Clock {
        &self.clock
    }

    pub(crate) fn create_telemetry(&self, strategy_name: Cow<'static, str>) -> TelemetryHelper {
        TelemetryHelper {
            pipeline_name: self.name.clone(),
            strategy_name,
            #[cfg(any(feature = "metrics", test))]
            event_reporter: self.meter.as_ref().map(TelemetryHelper::event_counter),
            #[cfg(any(feature = "logs", test))]
            logs_enabled: self.logs_enabled,
        }
    }
}
