// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// A snapshot of the outcomes a breaker counted in its current generation.
///
/// Counters start from zero on every state transition and on every periodic reset
/// of the closed-state window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub(crate) successes: u32,
    pub(crate) failures: u32,
    pub(crate) consecutive_successes: u32,
    pub(crate) consecutive_failures: u32,
    pub(crate) rejected: u32,
}

impl Counters {
    /// Successful calls.
    #[must_use]
    pub fn successes(&self) -> u32 {
        self.successes
    }

    /// Failed calls.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Successes since the last failure.
    #[must_use]
    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes
    }

    /// Failures since the last success.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Calls rejected without being executed.
    #[must_use]
    pub fn rejected(&self) -> u32 {
        self.rejected
    }

    /// Calls with a counted outcome.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.successes.saturating_add(self.failures)
    }

    pub(super) fn on_success(&mut self) {
        self.successes = self.successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    pub(super) fn on_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }

    pub(super) fn on_rejected(&mut self) {
        self.rejected = self.rejected.saturating_add(1);
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_counts_reset_on_opposite_outcome() {
        let mut counters = Counters::default();
        counters.on_failure();
        counters.on_failure();
        assert_eq!(counters.consecutive_failures(), 2);

        counters.on_success();
        assert_eq!(counters.consecutive_failures(), 0);
        assert_eq!(counters.consecutive_successes(), 1);
        assert_eq!(counters.failures(), 2);
        assert_eq!(counters.successes(), 1);
        assert_eq!(counters.total(), 3);
    }

    #[test]
    fn rejected_is_not_part_of_total() {
        let mut counters = Counters::default();
        counters.on_rejected();
        assert_eq!(counters.rejected(), 1);
        assert_eq!(counters.total(), 0);
    }

    #[test]
    fn counters_saturate() {
        let mut counters = Counters {
            failures: u32::MAX,
            consecutive_failures: u32::MAX,
            ..Counters::default()
        };
        counters.on_failure();
        assert_eq!(counters.failures(), u32::MAX);
    }
}
