// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::CircuitBreaker;
use super::engine::Ticket;
use crate::Outcome;

/// Admission to make one call through a [`CircuitBreaker`].
///
/// A permit is returned by [`CircuitBreaker::allow`] and must be consumed by reporting
/// the call's outcome. A permit dropped without a report counts as
/// [`Outcome::Indeterminate`], so a cancelled call never blocks a half-open circuit.
/// Use [`fail_on_drop`][Self::fail_on_drop] to count abandoned calls as failures instead.
///
/// The permit remembers the generation it was issued in. If the breaker changed state
/// since then, the reported outcome is discarded. A reset of the closed-state counting
/// window does not start a new generation, so such outcomes count in the new window.
#[derive(Debug)]
#[must_use = "report the outcome of the call through the permit"]
pub struct Permit {
    breaker: CircuitBreaker,
    ticket: Ticket,
    reported: bool,
    on_drop: Outcome,
}

impl Permit {
    pub(super) fn new(breaker: CircuitBreaker, ticket: Ticket) -> Self {
        Self {
            breaker,
            ticket,
            reported: false,
            on_drop: Outcome::Indeterminate,
        }
    }

    /// The generation this permit was issued in.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.ticket.generation
    }

    /// Whether this permit is a half-open probe.
    #[must_use]
    pub fn is_probe(&self) -> bool {
        self.ticket.probe
    }

    /// Counts the call as failed if the permit is dropped without a report.
    ///
    /// Use it when abandoning a call, for example cancelling it before a response
    /// arrived, says the dependency is unhealthy.
    #[must_use]
    pub fn fail_on_drop(mut self) -> Self {
        self.on_drop = Outcome::Failure;
        self
    }

    /// Reports that the call succeeded.
    pub fn succeeded(self) {
        self.report(Outcome::Success);
    }

    /// Reports that the call failed.
    pub fn failed(self) {
        self.report(Outcome::Failure);
    }

    /// Reports that the call says nothing about the dependency's health.
    pub fn indeterminate(self) {
        self.report(Outcome::Indeterminate);
    }

    /// Reports the given outcome.
    pub fn report(mut self, outcome: Outcome) {
        self.reported = true;
        self.breaker.record(Some(self.ticket), outcome);
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if !self.reported {
            self.breaker.record(Some(self.ticket), self.on_drop);
        }
    }
}
