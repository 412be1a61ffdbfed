// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// How many probes a half-open circuit admits at the same time.
///
/// - [`HalfOpenMode::unlimited`]: Every call is admitted as a probe while half-open (default).
///   The circuit closes after enough of them succeed and reopens on the first failure.
/// - [`HalfOpenMode::limited`]: At most `n` probes may be in flight. Further calls are
///   rejected until a probe reports its outcome or is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HalfOpenMode {
    max_in_flight: Option<u32>,
}

impl HalfOpenMode {
    /// Admit every call while half-open.
    #[must_use]
    pub fn unlimited() -> Self {
        Self { max_in_flight: None }
    }

    /// Admit at most `max_in_flight` concurrent probes while half-open.
    ///
    /// The value is clamped to a minimum of 1.
    #[must_use]
    pub fn limited(max_in_flight: u32) -> Self {
        Self {
            max_in_flight: Some(max_in_flight.max(1)),
        }
    }

    /// The probe limit, or `None` when unlimited.
    #[must_use]
    pub fn max_in_flight(&self) -> Option<u32> {
        self.max_in_flight
    }

    pub(super) fn admits(&self, in_flight: u32) -> bool {
        self.max_in_flight.is_none_or(|max| in_flight < max)
    }
}
