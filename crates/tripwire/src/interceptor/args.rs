// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::SystemTime;

use crate::{CircuitState, Outcome};

/// Describes a finished call, passed to
/// [`InterceptorLayer::observe`](super::InterceptorLayer::observe).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserveArgs {
    pub(super) state: CircuitState,
    pub(super) outcome: Option<Outcome>,
    pub(super) at: SystemTime,
}

impl ObserveArgs {
    /// The breaker state once the call's outcome was recorded.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// The recorded outcome, `None` if the breaker rejected the call.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Whether the breaker rejected the call.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.outcome.is_none()
    }

    /// Wall-clock time the call finished, read from the breaker's clock.
    #[must_use]
    pub fn at(&self) -> SystemTime {
        self.at
    }
}
