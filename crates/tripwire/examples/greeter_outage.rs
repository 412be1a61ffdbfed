// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Demonstrates a circuit breaker protecting a greeter client during an outage.
//!
//! The simulated greeter is unreachable for the first 10 seconds. The client calls it once
//! per second through an interceptor:
//! - The first failure opens the circuit.
//! - Calls are rejected without reaching the greeter for the next 5 seconds.
//! - A probe is admitted after the open timeout; three successful probes close the circuit.
//!
//! Breaker events are logged to the console and the `resilience.event` counter is exported
//! to stdout.

use std::time::{Duration, Instant};

use layered::{Execute, Layer, Service};
use ohno::AppError;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_stdout::MetricExporter;
use tick::Clock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tripwire::{BreakerOptions, CallError, CircuitBreaker, Context, Interceptor, Recovery, RecoveryInfo};

const OUTAGE: Duration = Duration::from_secs(10);
const CALLS: u32 = 20;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let meter_provider = configure_telemetry();

    let clock = Clock::new_tokio();
    let context = Context::new(&clock)
        .name("greeter_client")
        .enable_logs()
        .enable_metrics(&meter_provider);

    let breaker = CircuitBreaker::new(
        "greeter",
        &context,
        BreakerOptions::default()
            .trip_threshold(1)
            .open_timeout(Duration::from_secs(5))
            .half_open_success_threshold(3),
    );

    let greeter = Greeter {
        up_at: clock.instant() + OUTAGE,
        clock: clock.clone(),
    };

    let service = Interceptor::layer(&breaker)
        .recovery()
        .observe(|args| println!("breaker state after call: {}", args.state()))
        .layer(Execute::new(move |name: String| {
            let greeter = greeter.clone();
            async move { greeter.say_hello(&name) }
        }));

    for call in 1..=CALLS {
        match service.execute(format!("caller #{call}")).await {
            Ok(reply) => println!("reply: {reply}"),
            Err(CallError::Rejected(rejected)) => println!("not calling, retry in {:?}", rejected.retry_after()),
            Err(error) => println!("greeter failed: {error}"),
        }

        clock.delay(Duration::from_secs(1)).await;
    }

    // Flush metrics to stdout before exiting
    meter_provider.force_flush()?;

    Ok(())
}

/// Simulated greeter that is unreachable until `up_at`.
#[derive(Debug, Clone)]
struct Greeter {
    clock: Clock,
    up_at: Instant,
}

impl Greeter {
    fn say_hello(&self, name: &str) -> Result<String, GreeterError> {
        if self.clock.instant() < self.up_at {
            Err(GreeterError::unreachable())
        } else {
            Ok(format!("hello, {name}"))
        }
    }
}

#[ohno::error]
struct GreeterError {
    recovery: RecoveryInfo,
}

impl GreeterError {
    fn unreachable() -> Self {
        Self::caused_by(RecoveryInfo::unavailable(), "greeter is unreachable")
    }
}

impl Recovery for GreeterError {
    fn recovery(&self) -> RecoveryInfo {
        self.recovery.clone()
    }
}

fn configure_telemetry() -> SdkMeterProvider {
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).init();

    SdkMeterProvider::builder()
        .with_periodic_exporter(MetricExporter::default())
        .build()
}
