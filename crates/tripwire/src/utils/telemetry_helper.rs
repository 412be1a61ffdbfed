// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;

/// Telemetry sinks resolved for a single breaker.
#[derive(Debug, Clone)]
#[cfg_attr(
    not(any(feature = "metrics", feature = "logs", test)),
    expect(dead_code, reason = "names are only read when logs or metrics are enabled")
)]
pub(crate) struct TelemetryHelper {
    pub(crate) pipeline_name: Cow<'static, str>,
    pub(crate) strategy_name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    pub(crate) event_reporter: Option<opentelemetry::metrics::Counter<u64>>,
    #[cfg(any(feature = "logs", test))]
    pub(crate) logs_enabled: bool,
}

impl TelemetryHelper {
    /// One counter carries every breaker event; the `resilience.event.name` attribute tells
    /// them apart.
    #[cfg(any(feature = "metrics", test))]
    pub(crate) fn event_counter(meter: &opentelemetry::metrics::Meter) -> opentelemetry::metrics::Counter<u64> {
        meter
            .u64_counter("resilience.event")
            .with_description("Circuit breaker rejections, probes, state transitions and guarded calls.")
            .with_unit("{event}")
            .build()
    }

    #[cfg(any(feature = "metrics", test))]
    pub(crate) fn metrics_enabled(&self) -> bool {
        self.event_reporter.is_some()
    }

    #[cfg(any(feature = "metrics", test))]
    pub(crate) fn report_metrics(&self, attributes: &[opentelemetry::KeyValue]) {
        if let Some(reporter) = &self.event_reporter {
            reporter.add(1, attributes);
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
#[cfg(not(miri))]
mod tests {
    use opentelemetry::metrics::MeterProvider;
    use opentelemetry_sdk::metrics::{InMemoryMetricExporter, SdkMeterProvider};

    use super::*;

    #[test]
    fn event_counter_describes_breaker_events() {
        let exporter = InMemoryMetricExporter::default();
        let provider = SdkMeterProvider::builder().with_periodic_exporter(exporter.clone()).build();
        let telemetry = TelemetryHelper {
            pipeline_name: "pipeline".into(),
            strategy_name: "breaker".into(),
            event_reporter: Some(TelemetryHelper::event_counter(&provider.meter("test"))),
            logs_enabled: false,
        };

        telemetry.report_metrics(&[]);
        provider.force_flush().unwrap();

        let dump = format!("{:?}", exporter.get_finished_metrics().unwrap());
        assert!(dump.contains("resilience.event"));
        assert!(dump.contains("Circuit breaker"));
        assert!(dump.contains("{event}"));
    }
}
