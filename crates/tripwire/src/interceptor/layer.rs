// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use layered::Layer;

use super::service::InterceptorShared;
use super::{Classify, Interceptor, Observe, ObserveArgs};
use crate::utils::EnableIf;
use crate::{CircuitBreaker, Outcome, Recovery};

/// Builder for [`Interceptor`] middleware, created by [`Interceptor::layer`].
///
/// See the [`interceptor` module](crate::interceptor) for the defaults.
#[derive(Debug)]
pub struct InterceptorLayer<In, T, E> {
    breaker: CircuitBreaker,
    classify: Classify<T, E>,
    observe: Option<Observe>,
    enable_if: EnableIf<In>,
    deadline: Option<Duration>,
    fail_on_cancel: bool,
    _types: PhantomData<fn(In) -> Result<T, E>>,
}

impl<In, T, E> InterceptorLayer<In, T, E> {
    pub(super) fn new(breaker: &CircuitBreaker) -> Self {
        Self {
            breaker: breaker.clone(),
            classify: Classify::by_result(),
            observe: None,
            enable_if: EnableIf::always(),
            deadline: None,
            fail_on_cancel: false,
            _types: PhantomData,
        }
    }

    /// Sets the function deciding the [`Outcome`] of a completed call.
    ///
    /// Use it to keep errors that do not reflect the dependency's health, such as invalid
    /// input, from opening the circuit.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tick::Clock;
    /// # use tripwire::{BreakerOptions, CircuitBreaker, Context, Interceptor, Outcome};
    /// # fn example(clock: Clock) {
    /// # let breaker = CircuitBreaker::new("db", &Context::new(&clock), BreakerOptions::default());
    /// let layer = Interceptor::<String, String, std::io::Error, ()>::layer(&breaker).classify_with(|result| match result {
    ///     Err(error) if error.kind() == std::io::ErrorKind::InvalidInput => Outcome::Success,
    ///     Err(_) => Outcome::Failure,
    ///     Ok(_) => Outcome::Success,
    /// });
    /// # }
    /// ```
    #[must_use]
    pub fn classify_with(mut self, classify: impl Fn(&Result<T, E>) -> Outcome + Send + Sync + 'static) -> Self {
        self.classify = Classify::new(classify);
        self
    }

    /// Classifies errors by their [`Recovery`] information.
    ///
    /// `Ok` is a success. An error is a failure when its recovery kind is `Retry` or
    /// `Unavailable`, and a success otherwise. See [`Outcome::from_recovery`].
    #[must_use]
    pub fn recovery(self) -> Self
    where
        E: Recovery,
    {
        self.classify_with(|result| match result {
            Ok(_) => Outcome::Success,
            Err(error) => Outcome::from_recovery(&error.recovery()),
        })
    }

    /// Cancels calls that run longer than `deadline`.
    ///
    /// A cancelled call counts as a failure and returns
    /// [`CallError::TimedOut`](crate::CallError::TimedOut). The deadline is measured with
    /// the breaker's clock.
    #[must_use]
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Counts calls cancelled by the caller as failures.
    ///
    /// A call is cancelled when its future is dropped before the inner service
    /// responded. By default such calls are [`Outcome::Indeterminate`] and leave the
    /// counters untouched.
    #[must_use]
    pub fn fail_on_cancel(mut self) -> Self {
        self.fail_on_cancel = true;
        self
    }

    /// Registers a function called once for every call, after the breaker made its
    /// decision and recorded the outcome.
    #[must_use]
    pub fn observe(mut self, observe: impl Fn(ObserveArgs) + Send + Sync + 'static) -> Self {
        self.observe = Some(Observe::new(observe));
        self
    }

    /// Guards only inputs for which `enable_if` returns `true`.
    ///
    /// Other inputs go straight to the inner service, their errors wrapped in
    /// [`CallError::Operation`](crate::CallError::Operation), and are neither counted
    /// nor observed.
    #[must_use]
    pub fn enable_if(mut self, enable_if: impl Fn(&In) -> bool + Send + Sync + 'static) -> Self {
        self.enable_if = EnableIf::new(enable_if);
        self
    }

    /// Guards every input (default).
    #[must_use]
    pub fn enable_always(mut self) -> Self {
        self.enable_if = EnableIf::always();
        self
    }

    /// Passes every input straight to the inner service.
    #[must_use]
    pub fn disable(mut self) -> Self {
        self.enable_if = EnableIf::never();
        self
    }
}

impl<In, T, E, S> Layer<S> for InterceptorLayer<In, T, E> {
    type Service = Interceptor<In, T, E, S>;

    fn layer(&self, inner: S) -> Self::Service {
        Interceptor {
            shared: Arc::new(InterceptorShared {
                breaker: self.breaker.clone(),
                classify: self.classify.clone(),
                observe: self.observe.clone(),
                enable_if: self.enable_if.clone(),
                deadline: self.deadline,
                fail_on_cancel: self.fail_on_cancel,
            }),
            inner,
        }
    }
}
