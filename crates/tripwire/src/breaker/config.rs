// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use jiff::SignedDuration;
use serde::{Deserialize, Serialize};

use super::constants::{DEFAULT_HALF_OPEN_SUCCESS_THRESHOLD, DEFAULT_OPEN_TIMEOUT, DEFAULT_RESET_INTERVAL, DEFAULT_TRIP_THRESHOLD};
use super::{BreakerOptions, HalfOpenMode, TripCondition};
use crate::ConfigError;

/// Serializable settings of a circuit breaker.
///
/// Durations use the formats understood by [`jiff::SignedDuration`], such as `"PT5S"`
/// or `"5s"`. Missing fields take the defaults of [`BreakerOptions`].
///
/// # Examples
///
/// ```rust
/// # use tripwire::{BreakerConfig, BreakerOptions};
/// let config: BreakerConfig = serde_json::from_str(r#"{ "trip_threshold": 3, "open_timeout": "PT10S" }"#).unwrap();
/// let options = BreakerOptions::try_from(config).unwrap();
/// assert_eq!(options.get_open_timeout().as_secs(), 10);
/// ```
///
/// A `trip_condition` replaces `trip_threshold` with any [`TripCondition`]:
///
/// ```rust
/// # use tripwire::{BreakerConfig, BreakerOptions, TripCondition};
/// let json = r#"{ "trip_condition": { "failure_rate": { "rate": 0.5, "min_samples": 20 } } }"#;
/// let options = BreakerOptions::try_from(serde_json::from_str::<BreakerConfig>(json).unwrap()).unwrap();
/// assert_eq!(options.get_trip_condition(), TripCondition::failure_rate(0.5, 20));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakerConfig {
    /// Failures within the counting window that open the circuit.
    pub trip_threshold: u32,

    /// Condition that opens the circuit. Takes precedence over `trip_threshold` when set.
    pub trip_condition: Option<TripConditionConfig>,

    /// Time the circuit stays open before probing.
    pub open_timeout: SignedDuration,

    /// Probe successes that close a half-open circuit.
    pub half_open_success_threshold: u32,

    /// Length of the closed-state counting window, `null` to never reset the counters.
    pub reset_interval: Option<SignedDuration>,

    /// Maximum concurrent half-open probes, `null` for no limit.
    pub half_open_max_probes: Option<u32>,
}

/// Serializable form of a [`TripCondition`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum TripConditionConfig {
    /// See [`TripCondition::failures`].
    Failures {
        /// Failures within the window that open the circuit.
        threshold: u32,
    },

    /// See [`TripCondition::consecutive_failures`].
    ConsecutiveFailures {
        /// Failures in a row that open the circuit.
        threshold: u32,
    },

    /// See [`TripCondition::failure_rate`].
    FailureRate {
        /// Share of failed calls, between 0 and 1.
        rate: f32,
        /// Calls the window must hold before the rate is considered.
        min_samples: u32,
    },
}

impl TryFrom<TripConditionConfig> for TripCondition {
    type Error = ConfigError;

    fn try_from(config: TripConditionConfig) -> Result<Self, Self::Error> {
        match config {
            TripConditionConfig::Failures { threshold } => Ok(Self::failures(at_least_one(threshold, "trip_condition.threshold")?)),
            TripConditionConfig::ConsecutiveFailures { threshold } => {
                Ok(Self::consecutive_failures(at_least_one(threshold, "trip_condition.threshold")?))
            }
            TripConditionConfig::FailureRate { rate, min_samples } => {
                if !(0.0..=1.0).contains(&rate) {
                    return Err(ConfigError::NotARatio { field: "trip_condition.rate" });
                }
                Ok(Self::failure_rate(rate, at_least_one(min_samples, "trip_condition.min_samples")?))
            }
        }
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            trip_threshold: DEFAULT_TRIP_THRESHOLD,
            trip_condition: None,
            open_timeout: to_signed(DEFAULT_OPEN_TIMEOUT),
            half_open_success_threshold: DEFAULT_HALF_OPEN_SUCCESS_THRESHOLD,
            reset_interval: Some(to_signed(DEFAULT_RESET_INTERVAL)),
            half_open_max_probes: None,
        }
    }
}

impl TryFrom<BreakerConfig> for BreakerOptions {
    type Error = ConfigError;

    fn try_from(config: BreakerConfig) -> Result<Self, Self::Error> {
        let trip_condition = match config.trip_condition {
            Some(condition) => TripCondition::try_from(condition)?,
            None => TripCondition::failures(at_least_one(config.trip_threshold, "trip_threshold")?),
        };
        let half_open_success_threshold = at_least_one(config.half_open_success_threshold, "half_open_success_threshold")?;
        let open_timeout = to_unsigned(config.open_timeout, "open_timeout")?;
        let reset_interval = config
            .reset_interval
            .map(|interval| to_unsigned(interval, "reset_interval"))
            .transpose()?;
        let half_open_mode = match config.half_open_max_probes {
            Some(max) => HalfOpenMode::limited(at_least_one(max, "half_open_max_probes")?),
            None => HalfOpenMode::unlimited(),
        };

        Ok(Self::default()
            .trip_condition(trip_condition)
            .open_timeout(open_timeout)
            .half_open_success_threshold(half_open_success_threshold)
            .reset_interval(reset_interval)
            .half_open_mode(half_open_mode))
    }
}

fn at_least_one(value: u32, field: &'static str) -> Result<u32, ConfigError> {
    if value == 0 { Err(ConfigError::Zero { field }) } else { Ok(value) }
}

fn to_unsigned(duration: SignedDuration, field: &'static str) -> Result<Duration, ConfigError> {
    if duration.is_negative() {
        Err(ConfigError::NegativeDuration { field })
    } else {
        Ok(duration.unsigned_abs())
    }
}

fn to_signed(duration: Duration) -> SignedDuration {
    SignedDuration::try_from(duration).unwrap_or(SignedDuration::MAX)
}
