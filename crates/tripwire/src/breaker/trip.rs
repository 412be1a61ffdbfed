// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::Counters;
use super::constants::DEFAULT_TRIP_THRESHOLD;

/// Decides when a closed circuit opens.
///
/// The condition is evaluated after every failure recorded while closed, against the
/// [`Counters`] of the current window.
///
/// # Examples
///
/// ```rust
/// # use tripwire::{BreakerOptions, TripCondition};
/// // Open after 3 failures in a row, regardless of earlier successes.
/// let options = BreakerOptions::default().trip_condition(TripCondition::consecutive_failures(3));
///
/// // Open once half of at least 20 calls failed.
/// let options = BreakerOptions::default().trip_condition(TripCondition::failure_rate(0.5, 20));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripCondition {
    inner: Condition,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Condition {
    Failures(u32),
    ConsecutiveFailures(u32),
    FailureRate { rate: f32, min_samples: u32 },
}

impl TripCondition {
    /// Trip once the window holds `threshold` failures (default: 5).
    ///
    /// The threshold is clamped to a minimum of 1.
    #[must_use]
    pub fn failures(threshold: u32) -> Self {
        Self {
            inner: Condition::Failures(threshold.max(1)),
        }
    }

    /// Trip after `threshold` failures with no success in between.
    ///
    /// The threshold is clamped to a minimum of 1.
    #[must_use]
    pub fn consecutive_failures(threshold: u32) -> Self {
        Self {
            inner: Condition::ConsecutiveFailures(threshold.max(1)),
        }
    }

    /// Trip once the share of failures reaches `rate` and at least `min_samples` calls
    /// were counted in the window.
    ///
    /// The rate is clamped to `0.0..=1.0` and `min_samples` to a minimum of 1. A NaN
    /// rate is treated as `1.0`, so the circuit opens only when every call failed.
    #[must_use]
    pub fn failure_rate(rate: f32, min_samples: u32) -> Self {
        let rate = if rate.is_nan() { 1.0 } else { rate.clamp(0.0, 1.0) };
        Self {
            inner: Condition::FailureRate {
                rate,
                min_samples: min_samples.max(1),
            },
        }
    }

    pub(super) fn should_trip(&self, counters: &Counters) -> bool {
        match self.inner {
            Condition::Failures(threshold) => counters.failures >= threshold,
            Condition::ConsecutiveFailures(threshold) => counters.consecutive_failures >= threshold,
            Condition::FailureRate { rate, min_samples } => {
                let total = counters.total();
                total >= min_samples && f64::from(counters.failures) / f64::from(total) >= f64::from(rate)
            }
        }
    }
}

impl Default for TripCondition {
    fn default() -> Self {
        Self::failures(DEFAULT_TRIP_THRESHOLD)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn counters(successes: u32, failures: u32, consecutive_failures: u32) -> Counters {
        Counters {
            successes,
            failures,
            consecutive_failures,
            ..Counters::default()
        }
    }

    #[test]
    fn default_is_five_failures() {
        assert_eq!(TripCondition::default(), TripCondition::failures(5));
    }

    #[test]
    fn failures_ignores_successes() {
        let condition = TripCondition::failures(3);
        assert!(!condition.should_trip(&counters(10, 2, 0)));
        assert!(condition.should_trip(&counters(10, 3, 0)));
    }

    #[test]
    fn consecutive_failures_needs_a_run() {
        let condition = TripCondition::consecutive_failures(3);
        assert!(!condition.should_trip(&counters(0, 5, 2)));
        assert!(condition.should_trip(&counters(0, 3, 3)));
    }

    #[test]
    fn failure_rate_needs_min_samples() {
        let condition = TripCondition::failure_rate(0.5, 10);
        assert!(!condition.should_trip(&counters(0, 9, 9)));
        assert!(condition.should_trip(&counters(5, 5, 0)));
        assert!(!condition.should_trip(&counters(6, 4, 0)));
    }

    #[rstest]
    #[case::half(0.5, counters(5, 5, 0), true)]
    #[case::below_rate(0.5, counters(6, 4, 0), false)]
    #[case::zero_rate(0.0, counters(9, 1, 0), true)]
    #[case::above_one(7.0, counters(1, 9, 0), false)]
    #[case::nan_with_success(f32::NAN, counters(1, 9, 0), false)]
    #[case::nan_all_failed(f32::NAN, counters(0, 10, 10), true)]
    fn failure_rate_table(#[case] rate: f32, #[case] window: Counters, #[case] trips: bool) {
        assert_eq!(TripCondition::failure_rate(rate, 10).should_trip(&window), trips);
    }

    #[test]
    fn thresholds_are_clamped() {
        assert_eq!(TripCondition::failures(0), TripCondition::failures(1));
        assert_eq!(TripCondition::consecutive_failures(0), TripCondition::consecutive_failures(1));
        assert_eq!(TripCondition::failure_rate(7.0, 0), TripCondition::failure_rate(1.0, 1));
        assert_eq!(TripCondition::failure_rate(-1.0, 1), TripCondition::failure_rate(0.0, 1));
        assert_eq!(TripCondition::failure_rate(f32::NAN, 1), TripCondition::failure_rate(1.0, 1));
    }
}
