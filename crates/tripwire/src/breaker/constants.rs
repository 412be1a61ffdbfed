// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Default number of failures within the counting window that trips the circuit.
pub(crate) const DEFAULT_TRIP_THRESHOLD: u32 = 5;

/// Default time the circuit stays open before it starts admitting probes.
pub(crate) const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of successful probes that close a half-open circuit.
pub(crate) const DEFAULT_HALF_OPEN_SUCCESS_THRESHOLD: u32 = 1;

/// Default length of the closed-state counting window.
pub(crate) const DEFAULT_RESET_INTERVAL: Duration = Duration::from_secs(60);

/// Minimum length of the closed-state counting window.
pub(crate) const MIN_RESET_INTERVAL: Duration = Duration::from_secs(1);

pub(crate) const ERR_POISONED_LOCK: &str =
    "poisoned lock - cannot continue execution because security and privacy guarantees can no longer be upheld";
