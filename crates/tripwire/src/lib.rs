// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(
    not(all(feature = "logs", feature = "metrics", feature = "serde")),
    expect(
        rustdoc::broken_intra_doc_links,
        reason = "too ugly to make 'live links' possible with the combination of features"
    )
)]

//! Circuit breaking for calls to unreliable dependencies.
//!
//! A circuit breaker watches the outcomes of calls made to a dependency and, once the
//! dependency looks unhealthy, fails fast instead of sending more traffic its way. After
//! a cool-down it lets a few trial calls through to decide whether the dependency has
//! recovered.
//!
//! The crate is runtime agnostic. Time is read from a [`tick::Clock`] supplied through a
//! [`Context`], which also carries the telemetry configuration shared by all breakers
//! created from it.
//!
//! # Core Types
//!
//! - [`CircuitBreaker`]: The thread-safe state machine. Callers ask for admission with
//!   [`CircuitBreaker::allow`] and report the result through the returned [`Permit`].
//! - [`Interceptor`]: A [`layered::Service`] middleware that wraps any fallible service with
//!   a breaker, mapping the inner service's results to outcomes.
//! - [`CircuitOpenError`]: Returned when a call is rejected without being executed.
//! - [`CallError`]: The error type produced by calls made through the breaker.
//!
//! # States
//!
//! | State | Admits calls | Leaves when |
//! |-------|--------------|-------------|
//! | [`CircuitState::Closed`] | all | the trip condition is met |
//! | [`CircuitState::Open`] | none | the open timeout elapses |
//! | [`CircuitState::HalfOpen`] | probes | enough probes succeed, or any probe fails |
//!
//! Every transition starts a new *generation*. A permit remembers the generation it was
//! granted in, and outcomes reported against an older generation are ignored. The periodic
//! reset of the closed-state counters keeps the generation, so calls spanning a reset still
//! count.
//!
//! # Quick Start
//!
//! ```rust
//! # use std::time::Duration;
//! # use tick::Clock;
//! use tripwire::{BreakerOptions, CallError, CircuitBreaker, Context};
//!
//! # async fn fetch_greeting() -> Result<String, std::io::Error> { Ok("hello".into()) }
//! # async fn example(clock: Clock) {
//! let context = Context::new(&clock).name("greeter");
//! let breaker = CircuitBreaker::new(
//!     "greeter_client",
//!     &context,
//!     BreakerOptions::default()
//!         .trip_threshold(3)
//!         .open_timeout(Duration::from_secs(10)),
//! );
//!
//! match breaker.call(|| fetch_greeting()).await {
//!     Ok(greeting) => println!("{greeting}"),
//!     Err(CallError::Rejected(rejected)) => println!("not calling: {rejected}"),
//!     Err(error) => println!("call failed: {error}"),
//! }
//! # }
//! ```
//!
//! Manual admission gives full control over what counts as a failure:
//!
//! ```rust
//! # use tick::Clock;
//! # use tripwire::{BreakerOptions, CircuitBreaker, Context};
//! # fn example(clock: Clock) {
//! # let breaker = CircuitBreaker::new("db", &Context::new(&clock), BreakerOptions::default());
//! if let Ok(permit) = breaker.allow() {
//!     let healthy = true; // run the operation
//!     if healthy { permit.succeeded() } else { permit.failed() }
//! }
//! # }
//! ```
//!
//! # Middleware
//!
//! [`Interceptor::layer`] produces a [`Layer`](layered::Layer) that wraps a service
//! returning `Result<T, E>`. See the [`interceptor`] module for details.
//!
//! # Features
//!
//! - `logs`: Emits structured [`tracing`](https://docs.rs/tracing) events for breaker
//!   transitions, rejections and probes. Enable per context with [`Context::enable_logs`].
//! - `metrics`: Reports the `resilience.event` OpenTelemetry counter. Enable per context
//!   with [`Context::enable_metrics`].
//! - `serde`: Adds [`BreakerConfig`], a serializable form of [`BreakerOptions`].
//! - `tower-service`: Implements [`tower_service::Service`](https://docs.rs/tower-service)
//!   for [`Interceptor`].

pub use recoverable::{Recovery, RecoveryInfo, RecoveryKind};

mod utils;

mod context;
pub use context::Context;

mod error;
pub use error::{CallError, CircuitOpenError};
#[cfg(any(feature = "serde", test))]
pub use error::ConfigError;

mod outcome;
pub use outcome::Outcome;

mod breaker;
pub use breaker::{BreakerOptions, CircuitBreaker, CircuitState, Counters, HalfOpenMode, Permit, StateChange, TripCondition};
#[cfg(any(feature = "serde", test))]
pub use breaker::{BreakerConfig, TripConditionConfig};

pub mod interceptor;
#[doc(inline)]
pub use interceptor::{Interceptor, InterceptorLayer};

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
pub(crate) mod testing;
