// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::time::SystemTime;

/// The state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Calls flow normally while failures are counted.
    Closed,

    /// Calls are rejected immediately.
    Open,

    /// Trial calls are admitted to find out whether the dependency recovered.
    HalfOpen,
}

impl CircuitState {
    /// Returns the `snake_case` name used in telemetry and messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transition between two circuit states, passed to
/// [`BreakerOptions::on_state_change`](crate::BreakerOptions::on_state_change).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub(crate) from: CircuitState,
    pub(crate) to: CircuitState,
    pub(crate) at: SystemTime,
    pub(crate) generation: u64,
}

impl StateChange {
    /// The state the breaker left.
    #[must_use]
    pub fn from(&self) -> CircuitState {
        self.from
    }

    /// The state the breaker entered.
    #[must_use]
    pub fn to(&self) -> CircuitState {
        self.to
    }

    /// Wall-clock time of the transition, read from the breaker's clock.
    #[must_use]
    pub fn at(&self) -> SystemTime {
        self.at
    }

    /// The generation started by the transition.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
