// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::time::Duration;

use recoverable::{Recovery, RecoveryInfo};
use thiserror::Error;

use crate::CircuitState;

/// A call was rejected by a circuit breaker without being executed.
///
/// The error is produced either while the circuit is open, or while it is half-open and
/// the configured number of in-flight probes has been reached.
///
/// Its [`Recovery`] classification is [`RecoveryInfo::unavailable`], carrying the time
/// until the breaker will admit a probe as the delay hint when that time is known.
#[derive(Debug, Clone, Error)]
#[error("circuit breaker '{breaker}' is {state}, call rejected")]
pub struct CircuitOpenError {
    breaker: Cow<'static, str>,
    state: CircuitState,
    retry_after: Duration,
}

impl CircuitOpenError {
    pub(crate) fn new(breaker: Cow<'static, str>, state: CircuitState, retry_after: Duration) -> Self {
        Self {
            breaker,
            state,
            retry_after,
        }
    }

    /// Name of the breaker that rejected the call.
    #[must_use]
    pub fn breaker(&self) -> &str {
        &self.breaker
    }

    /// State the breaker was in when it rejected the call.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Time left until the breaker admits a probe.
    ///
    /// Zero when the breaker is half-open and waiting for in-flight probes to finish.
    #[must_use]
    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }
}

impl Recovery for CircuitOpenError {
    fn recovery(&self) -> RecoveryInfo {
        if self.retry_after.is_zero() {
            RecoveryInfo::unavailable()
        } else {
            RecoveryInfo::unavailable().delay(self.retry_after)
        }
    }
}

/// The error returned by calls made through a circuit breaker.
///
/// # Examples
///
/// ```rust
/// # use tripwire::CallError;
/// fn describe(error: &CallError<std::io::Error>) -> &'static str {
///     match error {
///         CallError::Rejected(_) => "dependency is unhealthy, not called",
///         CallError::TimedOut(_) => "dependency did not answer in time",
///         CallError::Operation(_) => "dependency returned an error",
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// The breaker did not admit the call, the operation was not executed.
    #[error(transparent)]
    Rejected(#[from] CircuitOpenError),

    /// The operation did not complete within the configured deadline.
    #[error("call did not complete within {0:?}")]
    TimedOut(Duration),

    /// The operation ran and returned this error, unchanged.
    #[error(transparent)]
    Operation(E),
}

impl<E> CallError<E> {
    /// Returns `true` if the call was rejected without being executed.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Returns `true` if the call exceeded its deadline.
    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }

    /// Returns the rejection, if the call was rejected.
    #[must_use]
    pub fn rejection(&self) -> Option<&CircuitOpenError> {
        match self {
            Self::Rejected(rejected) => Some(rejected),
            _ => None,
        }
    }

    /// Returns the operation's own error, if the operation ran and failed.
    #[must_use]
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Self::Operation(error) => Some(error),
            _ => None,
        }
    }

    /// Consumes the error, returning the operation's own error if there is one.
    #[must_use]
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(error) => Some(error),
            _ => None,
        }
    }
}

impl<E: Recovery> Recovery for CallError<E> {
    fn recovery(&self) -> RecoveryInfo {
        match self {
            Self::Rejected(rejected) => rejected.recovery(),
            Self::TimedOut(_) => RecoveryInfo::retry(),
            Self::Operation(error) => error.recovery(),
        }
    }
}

/// A [`BreakerConfig`](crate::BreakerConfig) could not be turned into options.
#[cfg(any(feature = "serde", test))]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A duration field was negative.
    #[error("'{field}' must not be negative")]
    NegativeDuration {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A count field was zero where at least one is required.
    #[error("'{field}' must be at least 1")]
    Zero {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A ratio field was outside `0.0..=1.0`.
    #[error("'{field}' must be between 0 and 1")]
    NotARatio {
        /// Name of the offending field.
        field: &'static str,
    },
}
