// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ops::ControlFlow;
use std::pin::pin;
#[cfg(any(feature = "tower-service", test))]
use std::pin::Pin;
use std::sync::Arc;
#[cfg(any(feature = "tower-service", test))]
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::{Either, select};
use layered::Service;

use super::{Classify, InterceptorLayer, Observe, ObserveArgs};
use crate::utils::EnableIf;
use crate::{CallError, CircuitBreaker, Outcome, Permit};

/// Middleware that routes calls of an inner service through a [`CircuitBreaker`].
///
/// Created by applying the [`InterceptorLayer`] returned from [`Interceptor::layer`] to a
/// service. See the [`interceptor` module](crate::interceptor) for details.
#[derive(Debug)]
pub struct Interceptor<In, T, E, S> {
    pub(super) shared: Arc<InterceptorShared<In, T, E>>,
    pub(super) inner: S,
}

#[derive(Debug)]
pub(crate) struct InterceptorShared<In, T, E> {
    pub(crate) breaker: CircuitBreaker,
    pub(crate) classify: Classify<T, E>,
    pub(crate) observe: Option<Observe>,
    pub(crate) enable_if: EnableIf<In>,
    pub(crate) deadline: Option<Duration>,
    pub(crate) fail_on_cancel: bool,
}

impl<In, T, E, S: Clone> Clone for Interceptor<In, T, E, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
        }
    }
}

impl<In, T, E> Interceptor<In, T, E, ()> {
    /// Creates an [`InterceptorLayer`] guarding calls with `breaker`.
    ///
    /// Every service produced by the layer shares the breaker's state.
    #[must_use]
    pub fn layer(breaker: &CircuitBreaker) -> InterceptorLayer<In, T, E> {
        InterceptorLayer::new(breaker)
    }
}

// The `layered::Service` impl below and the `tower_service::Service` impl further down
// orchestrate the same steps. Keep their bodies in sync.
impl<In, T, E, S> Service<In> for Interceptor<In, T, E, S>
where
    In: Send,
    T: Send,
    E: Send,
    S: Service<In, Out = Result<T, E>>,
{
    type Out = Result<T, CallError<E>>;

    async fn execute(&self, input: In) -> Self::Out {
        if !self.shared.enable_if.call(&input) {
            return self.inner.execute(input).await.map_err(CallError::Operation);
        }

        let permit = match self.shared.before_execute() {
            ControlFlow::Continue(permit) => permit,
            ControlFlow::Break(output) => return output,
        };

        let invocation = self.shared.invoke(self.inner.execute(input)).await;

        self.shared.after_execute(permit, invocation)
    }
}

/// Future returned by the [`tower_service::Service`] implementation of [`Interceptor`].
#[cfg(any(feature = "tower-service", test))]
pub struct InterceptorFuture<Out> {
    inner: Pin<Box<dyn Future<Output = Out> + Send>>,
}

#[cfg(any(feature = "tower-service", test))]
impl<Out> std::fmt::Debug for InterceptorFuture<Out> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorFuture").finish_non_exhaustive()
    }
}

#[cfg(any(feature = "tower-service", test))]
impl<Out> Future for InterceptorFuture<Out> {
    type Output = Out;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

#[cfg(any(feature = "tower-service", test))]
impl<Req, Res, Err, S> tower_service::Service<Req> for Interceptor<Req, Res, Err, S>
where
    Req: Send + 'static,
    Res: Send + 'static,
    Err: Send + 'static,
    S: tower_service::Service<Req, Response = Res, Error = Err> + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    type Response = Res;
    type Error = CallError<Err>;
    type Future = InterceptorFuture<Result<Res, CallError<Err>>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(CallError::Operation)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        if !self.shared.enable_if.call(&req) {
            let future = self.inner.call(req);
            return InterceptorFuture {
                inner: Box::pin(async move { future.await.map_err(CallError::Operation) }),
            };
        }

        let permit = match self.shared.before_execute() {
            ControlFlow::Continue(permit) => permit,
            ControlFlow::Break(output) => {
                return InterceptorFuture {
                    inner: Box::pin(async move { output }),
                };
            }
        };

        let shared = Arc::clone(&self.shared);
        let future = self.inner.call(req);

        InterceptorFuture {
            inner: Box::pin(async move {
                let invocation = shared.invoke(future).await;
                shared.after_execute(permit, invocation)
            }),
        }
    }
}

enum Invocation<T, E> {
    Completed(Result<T, E>),
    TimedOut(Duration),
}

impl<In, T, E> InterceptorShared<In, T, E> {
    fn before_execute(&self) -> ControlFlow<Result<T, CallError<E>>, Permit> {
        match self.breaker.allow() {
            Ok(permit) if self.fail_on_cancel => ControlFlow::Continue(permit.fail_on_drop()),
            Ok(permit) => ControlFlow::Continue(permit),
            Err(rejected) => {
                self.observe(None);
                ControlFlow::Break(Err(CallError::Rejected(rejected)))
            }
        }
    }

    async fn invoke(&self, future: impl Future<Output = Result<T, E>>) -> Invocation<T, E> {
        let Some(deadline) = self.deadline else {
            return Invocation::Completed(future.await);
        };

        let future = pin!(future);
        let delay = pin!(self.breaker.clock().delay(deadline));

        match select(future, delay).await {
            Either::Left((result, _)) => Invocation::Completed(result),
            Either::Right(((), _)) => Invocation::TimedOut(deadline),
        }
    }

    fn after_execute(&self, permit: Permit, invocation: Invocation<T, E>) -> Result<T, CallError<E>> {
        let (outcome, output) = match invocation {
            Invocation::Completed(result) => (self.classify.call(&result), result.map_err(CallError::Operation)),
            Invocation::TimedOut(deadline) => (Outcome::Failure, Err(CallError::TimedOut(deadline))),
        };

        permit.report(outcome);
        self.observe(Some(outcome));

        output
    }

    fn observe(&self, outcome: Option<Outcome>) {
        let state = self.breaker.state();
        self.breaker.telemetry().call(state, outcome);

        if let Some(observe) = &self.observe {
            observe.call(ObserveArgs {
                state,
                outcome,
                at: self.breaker.clock().system_time(),
            });
        }
    }
}
