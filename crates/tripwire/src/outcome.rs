// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use recoverable::{RecoveryInfo, RecoveryKind};

/// The result of a call, as seen by a circuit breaker.
///
/// Only [`Outcome::Success`] and [`Outcome::Failure`] move the breaker. An
/// [`Outcome::Indeterminate`] call is not counted at all, but still frees the
/// half-open probe slot it may have occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Outcome {
    /// The dependency handled the call.
    Success,

    /// The dependency failed to handle the call.
    Failure,

    /// The call says nothing about the health of the dependency, e.g. it was cancelled.
    Indeterminate,
}

impl Outcome {
    /// Classifies a [`RecoveryInfo`].
    ///
    /// Transient and service-wide conditions ([`RecoveryKind::Retry`] and
    /// [`RecoveryKind::Unavailable`]) are failures of the dependency. Anything else,
    /// including permanent errors such as invalid input, means the dependency answered.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use tripwire::{Outcome, RecoveryInfo};
    /// assert_eq!(Outcome::from_recovery(&RecoveryInfo::unavailable()), Outcome::Failure);
    /// assert_eq!(Outcome::from_recovery(&RecoveryInfo::never()), Outcome::Success);
    /// ```
    #[must_use]
    pub fn from_recovery(recovery: &RecoveryInfo) -> Self {
        match recovery.kind() {
            RecoveryKind::Retry | RecoveryKind::Unavailable => Self::Failure,
            _ => Self::Success,
        }
    }

    /// Returns the `snake_case` name used in telemetry.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Indeterminate => "indeterminate",
        }
    }
}
