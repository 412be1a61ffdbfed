// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::constants::{DEFAULT_HALF_OPEN_SUCCESS_THRESHOLD, DEFAULT_OPEN_TIMEOUT, DEFAULT_RESET_INTERVAL, MIN_RESET_INTERVAL};
use super::{HalfOpenMode, StateChange, TripCondition};

crate::utils::define_fn_wrapper!(OnStateChange(Fn(change: StateChange)));

/// Settings of a [`CircuitBreaker`](crate::CircuitBreaker).
///
/// | Setting | Default |
/// |---------|---------|
/// | [`trip_condition`][Self::trip_condition] | 5 failures in the window |
/// | [`open_timeout`][Self::open_timeout] | 5 seconds |
/// | [`half_open_success_threshold`][Self::half_open_success_threshold] | 1 |
/// | [`reset_interval`][Self::reset_interval] | 60 seconds |
/// | [`half_open_mode`][Self::half_open_mode] | [`HalfOpenMode::unlimited`] |
///
/// # Examples
///
/// ```rust
/// # use std::time::Duration;
/// # use tripwire::{BreakerOptions, HalfOpenMode};
/// let options = BreakerOptions::default()
///     .trip_threshold(3)
///     .open_timeout(Duration::from_secs(10))
///     .half_open_success_threshold(2)
///     .half_open_mode(HalfOpenMode::limited(1))
///     .on_state_change(|change| println!("{} -> {}", change.from(), change.to()));
/// ```
#[derive(Debug, Clone)]
pub struct BreakerOptions {
    pub(super) trip_condition: TripCondition,
    pub(super) open_timeout: Duration,
    pub(super) half_open_success_threshold: u32,
    pub(super) reset_interval: Option<Duration>,
    pub(super) half_open_mode: HalfOpenMode,
    pub(super) on_state_change: Option<OnStateChange>,
}

impl Default for BreakerOptions {
    fn default() -> Self {
        Self {
            trip_condition: TripCondition::default(),
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            half_open_success_threshold: DEFAULT_HALF_OPEN_SUCCESS_THRESHOLD,
            reset_interval: Some(DEFAULT_RESET_INTERVAL),
            half_open_mode: HalfOpenMode::default(),
            on_state_change: None,
        }
    }
}

impl BreakerOptions {
    /// Open the circuit once `threshold` failures are counted in the current window.
    ///
    /// Shorthand for `trip_condition(TripCondition::failures(threshold))`.
    #[must_use]
    pub fn trip_threshold(self, threshold: u32) -> Self {
        self.trip_condition(TripCondition::failures(threshold))
    }

    /// Sets the condition that opens a closed circuit.
    #[must_use]
    pub fn trip_condition(mut self, condition: TripCondition) -> Self {
        self.trip_condition = condition;
        self
    }

    /// Sets how long the circuit stays open before admitting probes.
    #[must_use]
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Sets how many probes must succeed before a half-open circuit closes.
    ///
    /// The value is clamped to a minimum of 1.
    #[must_use]
    pub fn half_open_success_threshold(mut self, threshold: u32) -> Self {
        self.half_open_success_threshold = threshold.max(1);
        self
    }

    /// Sets the length of the closed-state counting window.
    ///
    /// When the window elapses, the next admission clears the counters. Calls admitted in
    /// the previous window report into the new one. Pass `None` to count for as long as the circuit stays closed. A window
    /// is clamped to a minimum of 1 second.
    #[must_use]
    pub fn reset_interval(mut self, interval: impl Into<Option<Duration>>) -> Self {
        self.reset_interval = interval.into().map(|d| d.max(MIN_RESET_INTERVAL));
        self
    }

    /// Sets how many probes a half-open circuit admits at once.
    #[must_use]
    pub fn half_open_mode(mut self, mode: HalfOpenMode) -> Self {
        self.half_open_mode = mode;
        self
    }

    /// Registers a function called after every state transition.
    ///
    /// The function runs on the thread that caused the transition, after the breaker
    /// released its internal lock, so it may call back into the breaker.
    #[must_use]
    pub fn on_state_change(mut self, on_state_change: impl Fn(StateChange) + Send + Sync + 'static) -> Self {
        self.on_state_change = Some(OnStateChange::new(on_state_change));
        self
    }

    /// The configured trip condition.
    #[must_use]
    pub fn get_trip_condition(&self) -> TripCondition {
        self.trip_condition
    }

    /// The configured open timeout.
    #[must_use]
    pub fn get_open_timeout(&self) -> Duration {
        self.open_timeout
    }

    /// The configured number of probe successes that close the circuit.
    #[must_use]
    pub fn get_half_open_success_threshold(&self) -> u32 {
        self.half_open_success_threshold
    }

    /// The configured counting window, `None` if counters never decay.
    #[must_use]
    pub fn get_reset_interval(&self) -> Option<Duration> {
        self.reset_interval
    }

    /// The configured half-open mode.
    #[must_use]
    pub fn get_half_open_mode(&self) -> HalfOpenMode {
        self.half_open_mode
    }
}
