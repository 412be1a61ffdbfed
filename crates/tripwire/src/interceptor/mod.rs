// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Circuit breaker middleware for [`layered::Service`] stacks.
//!
//! An [`Interceptor`] guards an inner service returning `Result<T, E>`. Each input first
//! asks the breaker for admission:
//!
//! - When rejected, the inner service is not called and the interceptor returns
//!   [`CallError::Rejected`](crate::CallError::Rejected).
//! - When admitted, the inner service runs, its result is classified into an
//!   [`Outcome`](crate::Outcome) and recorded, and the result is returned with errors
//!   wrapped in [`CallError::Operation`](crate::CallError::Operation), unchanged.
//!
//! Exactly one observation is made per call: a `tripwire.interceptor.call` log event when
//! logs are enabled, and the [`observe`](InterceptorLayer::observe) callback when set.
//!
//! # Configuration
//!
//! | Method | Default |
//! |--------|---------|
//! | [`classify_with`](InterceptorLayer::classify_with) | `Ok` succeeds, `Err` fails |
//! | [`recovery`](InterceptorLayer::recovery) | not used |
//! | [`deadline`](InterceptorLayer::deadline) | none |
//! | [`fail_on_cancel`](InterceptorLayer::fail_on_cancel) | dropped calls are indeterminate |
//! | [`observe`](InterceptorLayer::observe) | none |
//! | [`enable_if`](InterceptorLayer::enable_if) | always enabled |
//!
//! A call exceeding its deadline is cancelled, counted as a failure, and reported as
//! [`CallError::TimedOut`](crate::CallError::TimedOut). A call whose future is dropped by
//! the caller before it completes counts as [`Outcome::Indeterminate`](crate::Outcome::Indeterminate)
//! unless [`fail_on_cancel`](InterceptorLayer::fail_on_cancel) is set.
//!
//! # Examples
//!
//! ```rust
//! # use std::time::Duration;
//! # use tick::Clock;
//! use layered::{Execute, Layer, Service};
//! use tripwire::{BreakerOptions, CircuitBreaker, Context, Interceptor};
//!
//! # async fn example(clock: Clock) {
//! let breaker = CircuitBreaker::new("greeter", &Context::new(&clock), BreakerOptions::default());
//!
//! let service = Interceptor::layer(&breaker)
//!     .deadline(Duration::from_secs(2))
//!     .layer(Execute::new(|name: String| async move {
//!         Ok::<_, std::io::Error>(format!("hello {name}"))
//!     }));
//!
//! let greeting = service.execute("world".to_string()).await;
//! assert_eq!(greeting.unwrap(), "hello world");
//! # }
//! ```

mod args;
pub use args::ObserveArgs;

mod callbacks;
pub(crate) use callbacks::{Classify, Observe};

mod layer;
pub use layer::InterceptorLayer;

mod service;
#[cfg(any(feature = "tower-service", test))]
pub use service::InterceptorFuture;
pub use service::Interceptor;
