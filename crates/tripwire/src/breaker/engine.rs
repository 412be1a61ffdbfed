// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tick::Clock;

use super::constants::ERR_POISONED_LOCK;
use super::{BreakerOptions, CircuitState, Counters, HalfOpenMode, TripCondition};
use crate::Outcome;

/// The numeric part of [`BreakerOptions`] the state machine needs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EngineSettings {
    pub trip_condition: TripCondition,
    pub open_timeout: Duration,
    pub half_open_success_threshold: u32,
    pub reset_interval: Option<Duration>,
    pub half_open_mode: HalfOpenMode,
}

impl From<&BreakerOptions> for EngineSettings {
    fn from(options: &BreakerOptions) -> Self {
        Self {
            trip_condition: options.trip_condition,
            open_timeout: options.open_timeout,
            half_open_success_threshold: options.half_open_success_threshold,
            reset_interval: options.reset_interval,
            half_open_mode: options.half_open_mode,
        }
    }
}

/// Identifies an admitted call: the generation it was admitted in and whether it holds a
/// half-open probe slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub generation: u64,
    pub probe: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
    pub generation: u64,
    /// Counters of the generation that just ended.
    #[cfg_attr(not(any(feature = "logs", test)), expect(dead_code, reason = "only logged"))]
    pub counters: Counters,
    /// Time since the circuit left the closed state, reported when it closes again.
    #[cfg_attr(not(any(feature = "logs", test)), expect(dead_code, reason = "only logged"))]
    pub broken_for: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Enter {
    Accepted { ticket: Ticket, transition: Option<Transition> },
    Rejected { state: CircuitState, retry_after: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Exit {
    Unchanged,
    /// The outcome belongs to an earlier generation and was discarded.
    Stale,
    Transitioned(Transition),
}

/// Thread-safe circuit state machine.
#[derive(Debug)]
pub(crate) struct Engine {
    core: Mutex<Core>,
    settings: EngineSettings,
    clock: Clock,
}

impl Engine {
    pub fn new(settings: EngineSettings, clock: Clock) -> Self {
        Self {
            core: Mutex::new(Core::new(clock.instant())),
            settings,
            clock,
        }
    }

    // NOTE: Read the clock before taking the lock, all methods below keep the critical section short.

    pub fn enter(&self) -> Enter {
        let now = self.clock.instant();
        self.core.lock().expect(ERR_POISONED_LOCK).enter(now, &self.settings)
    }

    pub fn exit(&self, ticket: Option<Ticket>, outcome: Outcome) -> Exit {
        let now = self.clock.instant();
        self.core.lock().expect(ERR_POISONED_LOCK).exit(ticket, outcome, now, &self.settings)
    }

    pub fn force(&self, target: CircuitState) -> Option<Transition> {
        let now = self.clock.instant();
        self.core.lock().expect(ERR_POISONED_LOCK).force(target, now)
    }

    pub fn is_ready(&self) -> bool {
        let now = self.clock.instant();
        self.core.lock().expect(ERR_POISONED_LOCK).is_ready(now, &self.settings)
    }

    pub fn state(&self) -> CircuitState {
        self.core.lock().expect(ERR_POISONED_LOCK).state.kind()
    }

    pub fn counters(&self) -> Counters {
        self.core.lock().expect(ERR_POISONED_LOCK).counters
    }

    pub fn generation(&self) -> u64 {
        self.core.lock().expect(ERR_POISONED_LOCK).generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed { window_start: Instant },
    Open { opened_at: Instant, broken_since: Instant },
    HalfOpen { in_flight: u32, broken_since: Instant },
}

impl State {
    fn kind(&self) -> CircuitState {
        match self {
            Self::Closed { .. } => CircuitState::Closed,
            Self::Open { .. } => CircuitState::Open,
            Self::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    fn broken_since(&self) -> Option<Instant> {
        match *self {
            Self::Closed { .. } => None,
            Self::Open { broken_since, .. } | Self::HalfOpen { broken_since, .. } => Some(broken_since),
        }
    }
}

#[derive(Debug)]
struct Core {
    state: State,
    generation: u64,
    counters: Counters,
}

impl Core {
    fn new(now: Instant) -> Self {
        Self {
            state: State::Closed { window_start: now },
            generation: 0,
            counters: Counters::default(),
        }
    }

    fn ticket(&self, probe: bool) -> Ticket {
        Ticket {
            generation: self.generation,
            probe,
        }
    }

    fn start_generation(&mut self) -> Counters {
        self.generation = self.generation.wrapping_add(1);
        std::mem::take(&mut self.counters)
    }

    fn transition(&mut self, next: State, now: Instant) -> Transition {
        let from = self.state.kind();
        let broken_for = match (self.state.broken_since(), next) {
            (Some(since), State::Closed { .. }) => Some(now.saturating_duration_since(since)),
            _ => None,
        };

        self.state = next;
        let counters = self.start_generation();

        Transition {
            from,
            to: next.kind(),
            generation: self.generation,
            counters,
            broken_for,
        }
    }

    fn enter(&mut self, now: Instant, settings: &EngineSettings) -> Enter {
        match self.state {
            State::Closed { window_start } => {
                let window_elapsed = settings
                    .reset_interval
                    .is_some_and(|interval| now.saturating_duration_since(window_start) >= interval);

                // permits issued in the previous window stay valid and count against the new one
                if window_elapsed {
                    self.state = State::Closed { window_start: now };
                    self.counters = Counters::default();
                }

                Enter::Accepted {
                    ticket: self.ticket(false),
                    transition: None,
                }
            }
            State::Open { opened_at, broken_since } => {
                let elapsed = now.saturating_duration_since(opened_at);

                if elapsed >= settings.open_timeout {
                    // the caller that observes the timeout becomes the first probe
                    let transition = self.transition(State::HalfOpen { in_flight: 1, broken_since }, now);
                    Enter::Accepted {
                        ticket: self.ticket(true),
                        transition: Some(transition),
                    }
                } else {
                    self.counters.on_rejected();
                    Enter::Rejected {
                        state: CircuitState::Open,
                        retry_after: settings.open_timeout.saturating_sub(elapsed),
                    }
                }
            }
            State::HalfOpen { in_flight, broken_since } => {
                if settings.half_open_mode.admits(in_flight) {
                    self.state = State::HalfOpen {
                        in_flight: in_flight.saturating_add(1),
                        broken_since,
                    };
                    Enter::Accepted {
                        ticket: self.ticket(true),
                        transition: None,
                    }
                } else {
                    self.counters.on_rejected();
                    Enter::Rejected {
                        state: CircuitState::HalfOpen,
                        retry_after: Duration::ZERO,
                    }
                }
            }
        }
    }

    fn exit(&mut self, ticket: Option<Ticket>, outcome: Outcome, now: Instant, settings: &EngineSettings) -> Exit {
        if let Some(ticket) = ticket {
            if ticket.generation != self.generation {
                return Exit::Stale;
            }

            if ticket.probe
                && let State::HalfOpen { in_flight, .. } = &mut self.state
            {
                *in_flight = in_flight.saturating_sub(1);
            }
        }

        match (self.state, outcome) {
            (_, Outcome::Indeterminate) | (State::Open { .. }, _) => Exit::Unchanged,
            (State::Closed { .. }, Outcome::Success) => {
                self.counters.on_success();
                Exit::Unchanged
            }
            (State::Closed { .. }, Outcome::Failure) => {
                self.counters.on_failure();

                if settings.trip_condition.should_trip(&self.counters) {
                    Exit::Transitioned(self.transition(
                        State::Open {
                            opened_at: now,
                            broken_since: now,
                        },
                        now,
                    ))
                } else {
                    Exit::Unchanged
                }
            }
            (State::HalfOpen { .. }, Outcome::Success) => {
                self.counters.on_success();

                if self.counters.successes >= settings.half_open_success_threshold {
                    Exit::Transitioned(self.transition(State::Closed { window_start: now }, now))
                } else {
                    Exit::Unchanged
                }
            }
            (State::HalfOpen { broken_since, .. }, Outcome::Failure) => {
                self.counters.on_failure();
                Exit::Transitioned(self.transition(
                    State::Open {
                        opened_at: now,
                        broken_since,
                    },
                    now,
                ))
            }
        }
    }

    fn force(&mut self, target: CircuitState, now: Instant) -> Option<Transition> {
        let next = match target {
            CircuitState::Closed => State::Closed { window_start: now },
            CircuitState::Open | CircuitState::HalfOpen => State::Open {
                opened_at: now,
                broken_since: self.state.broken_since().unwrap_or(now),
            },
        };

        let unchanged = self.state.kind() == next.kind();
        let transition = self.transition(next, now);
        (!unchanged).then_some(transition)
    }

    fn is_ready(&self, now: Instant, settings: &EngineSettings) -> bool {
        match self.state {
            State::Closed { .. } => true,
            State::Open { opened_at, .. } => now.saturating_duration_since(opened_at) >= settings.open_timeout,
            State::HalfOpen { in_flight, .. } => settings.half_open_mode.admits(in_flight),
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use tick::ClockControl;

    use super::*;

    const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

    fn settings() -> EngineSettings {
        EngineSettings {
            trip_condition: TripCondition::failures(3),
            open_timeout: OPEN_TIMEOUT,
            half_open_success_threshold: 2,
            reset_interval: Some(Duration::from_secs(60)),
            half_open_mode: HalfOpenMode::unlimited(),
        }
    }

    fn accepted(enter: Enter) -> (Ticket, Option<Transition>) {
        match enter {
            Enter::Accepted { ticket, transition } => (ticket, transition),
            Enter::Rejected { .. } => panic!("expected the call to be accepted, got {enter:?}"),
        }
    }

    fn open_core(now: Instant, settings: &EngineSettings) -> Core {
        let mut core = Core::new(now);
        for _ in 0..3 {
            let (ticket, _) = accepted(core.enter(now, settings));
            core.exit(Some(ticket), Outcome::Failure, now, settings);
        }
        assert_eq!(core.state.kind(), CircuitState::Open);
        core
    }

    #[test]
    fn closed_admits_and_counts() {
        let now = Instant::now();
        let settings = settings();
        let mut core = Core::new(now);

        let (ticket, transition) = accepted(core.enter(now, &settings));
        assert!(!ticket.probe);
        assert!(transition.is_none());

        assert_eq!(core.exit(Some(ticket), Outcome::Success, now, &settings), Exit::Unchanged);
        assert_eq!(core.counters.successes(), 1);
    }

    #[test]
    fn trips_exactly_at_threshold() {
        let now = Instant::now();
        let settings = settings();
        let mut core = Core::new(now);

        for _ in 0..2 {
            assert_eq!(core.exit(None, Outcome::Failure, now, &settings), Exit::Unchanged);
        }
        assert_eq!(core.state.kind(), CircuitState::Closed);

        let Exit::Transitioned(transition) = core.exit(None, Outcome::Failure, now, &settings) else {
            panic!("expected the circuit to open");
        };
        assert_eq!(transition.from, CircuitState::Closed);
        assert_eq!(transition.to, CircuitState::Open);
        assert_eq!(transition.counters.failures(), 3);
        assert_eq!(transition.generation, 1);
        assert_eq!(core.counters, Counters::default());
    }

    #[test]
    fn open_rejects_until_timeout() {
        let now = Instant::now();
        let settings = settings();
        let mut core = open_core(now, &settings);

        let later = now + Duration::from_secs(4);
        assert_eq!(
            core.enter(later, &settings),
            Enter::Rejected {
                state: CircuitState::Open,
                retry_after: Duration::from_secs(6),
            }
        );
        assert_eq!(core.counters.rejected(), 1);
        assert!(!core.is_ready(later, &settings));
        assert!(core.is_ready(now + OPEN_TIMEOUT, &settings));
    }

    #[test]
    fn open_ignores_outcomes() {
        let now = Instant::now();
        let settings = settings();
        let mut core = open_core(now, &settings);
        let generation = core.generation;

        assert_eq!(core.exit(None, Outcome::Success, now, &settings), Exit::Unchanged);
        assert_eq!(core.exit(None, Outcome::Failure, now, &settings), Exit::Unchanged);
        assert_eq!(core.state.kind(), CircuitState::Open);
        assert_eq!(core.generation, generation);
    }

    #[test]
    fn first_caller_after_timeout_becomes_probe() {
        let now = Instant::now();
        let settings = settings();
        let mut core = open_core(now, &settings);

        let (ticket, transition) = accepted(core.enter(now + OPEN_TIMEOUT, &settings));
        assert!(ticket.probe);
        let transition = transition.unwrap();
        assert_eq!(transition.from, CircuitState::Open);
        assert_eq!(transition.to, CircuitState::HalfOpen);
        assert_eq!(ticket.generation, transition.generation);
        assert!(matches!(core.state, State::HalfOpen { in_flight: 1, .. }));
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let now = Instant::now();
        let settings = settings();
        let mut core = open_core(now, &settings);
        let probe_time = now + OPEN_TIMEOUT;

        let (first, _) = accepted(core.enter(probe_time, &settings));
        let (second, _) = accepted(core.enter(probe_time, &settings));

        assert_eq!(core.exit(Some(first), Outcome::Success, probe_time, &settings), Exit::Unchanged);
        assert_eq!(core.state.kind(), CircuitState::HalfOpen);

        let closed_at = probe_time + Duration::from_secs(1);
        let Exit::Transitioned(transition) = core.exit(Some(second), Outcome::Success, closed_at, &settings) else {
            panic!("expected the circuit to close");
        };
        assert_eq!(transition.to, CircuitState::Closed);
        assert_eq!(transition.broken_for, Some(Duration::from_secs(11)));
        assert_eq!(core.counters, Counters::default());
    }

    #[test]
    fn half_open_failure_reopens_with_new_timestamp() {
        let now = Instant::now();
        let settings = settings();
        let mut core = open_core(now, &settings);
        let probe_time = now + OPEN_TIMEOUT;

        let (probe, _) = accepted(core.enter(probe_time, &settings));
        let Exit::Transitioned(transition) = core.exit(Some(probe), Outcome::Failure, probe_time, &settings) else {
            panic!("expected the circuit to reopen");
        };
        assert_eq!(transition.from, CircuitState::HalfOpen);
        assert_eq!(transition.to, CircuitState::Open);
        assert!(matches!(core.state, State::Open { opened_at, broken_since } if opened_at == probe_time && broken_since == now));

        // the open timeout restarts from the reopening
        assert!(matches!(
            core.enter(probe_time + Duration::from_secs(1), &settings),
            Enter::Rejected { state: CircuitState::Open, .. }
        ));
    }

    #[test]
    fn stale_outcomes_are_ignored() {
        let now = Instant::now();
        let settings = settings();
        let mut core = Core::new(now);

        let (old_ticket, _) = accepted(core.enter(now, &settings));
        for _ in 0..3 {
            core.exit(None, Outcome::Failure, now, &settings);
        }
        let (probe, _) = accepted(core.enter(now + OPEN_TIMEOUT, &settings));

        // a success from before the circuit opened must not count as a probe success
        assert_eq!(core.exit(Some(old_ticket), Outcome::Success, now + OPEN_TIMEOUT, &settings), Exit::Stale);
        assert_eq!(core.counters.successes(), 0);
        assert!(matches!(core.state, State::HalfOpen { in_flight: 1, .. }));

        core.exit(Some(probe), Outcome::Indeterminate, now + OPEN_TIMEOUT, &settings);
        assert!(matches!(core.state, State::HalfOpen { in_flight: 0, .. }));
    }

    #[test]
    fn limited_half_open_rejects_extra_probes() {
        let now = Instant::now();
        let settings = EngineSettings {
            half_open_mode: HalfOpenMode::limited(1),
            ..settings()
        };
        let mut core = open_core(now, &settings);
        let probe_time = now + OPEN_TIMEOUT;

        let (probe, _) = accepted(core.enter(probe_time, &settings));
        assert_eq!(
            core.enter(probe_time, &settings),
            Enter::Rejected {
                state: CircuitState::HalfOpen,
                retry_after: Duration::ZERO,
            }
        );
        assert!(!core.is_ready(probe_time, &settings));

        // an indeterminate probe frees its slot without moving the circuit
        assert_eq!(core.exit(Some(probe), Outcome::Indeterminate, probe_time, &settings), Exit::Unchanged);
        assert!(core.is_ready(probe_time, &settings));
        accepted(core.enter(probe_time, &settings));
    }

    #[test]
    fn window_reset_clears_counters_and_keeps_generation() {
        let now = Instant::now();
        let settings = settings();
        let mut core = Core::new(now);

        let (early, _) = accepted(core.enter(now, &settings));
        core.exit(None, Outcome::Failure, now, &settings);
        core.exit(None, Outcome::Failure, now, &settings);

        let later = now + Duration::from_secs(60);
        let (ticket, transition) = accepted(core.enter(later, &settings));
        assert!(transition.is_none());
        assert_eq!(core.counters, Counters::default());
        assert_eq!(ticket.generation, 0);
        assert_eq!(core.state, State::Closed { window_start: later });

        assert_eq!(core.exit(Some(early), Outcome::Failure, later, &settings), Exit::Unchanged);
        assert_eq!(core.counters.failures(), 1);
    }

    #[test]
    fn failures_straddling_window_reset_still_trip() {
        let now = Instant::now();
        let settings = settings();
        let mut core = Core::new(now);
        let before_reset = now + Duration::from_millis(59_900);

        let tickets: Vec<_> = (0..3).map(|_| accepted(core.enter(before_reset, &settings)).0).collect();
        accepted(core.enter(now + Duration::from_secs(60), &settings));

        let done = now + Duration::from_millis(60_100);
        let exits: Vec<_> = tickets
            .into_iter()
            .map(|ticket| core.exit(Some(ticket), Outcome::Failure, done, &settings))
            .collect();

        assert!(matches!(exits.last(), Some(Exit::Transitioned(t)) if t.to == CircuitState::Open));
        assert_eq!(core.state.kind(), CircuitState::Open);
    }

    #[test]
    fn window_does_not_reset_when_disabled() {
        let now = Instant::now();
        let settings = EngineSettings {
            reset_interval: None,
            ..settings()
        };
        let mut core = Core::new(now);
        core.exit(None, Outcome::Failure, now, &settings);

        accepted(core.enter(now + Duration::from_secs(3600), &settings));
        assert_eq!(core.counters.failures(), 1);
        assert_eq!(core.generation, 0);
    }

    #[test]
    fn force_reports_only_real_transitions() {
        let now = Instant::now();
        let mut core = Core::new(now);

        assert!(core.force(CircuitState::Closed, now).is_none());
        assert_eq!(core.generation, 1);

        let transition = core.force(CircuitState::Open, now).unwrap();
        assert_eq!(transition.to, CircuitState::Open);
        assert!(core.force(CircuitState::Open, now).is_none());

        let transition = core.force(CircuitState::Closed, now + Duration::from_secs(2)).unwrap();
        assert_eq!(transition.from, CircuitState::Open);
        assert_eq!(transition.broken_for, Some(Duration::from_secs(2)));
    }

    #[test]
    fn engine_reads_clock() {
        let control = ClockControl::new();
        let engine = Engine::new(settings(), control.to_clock());

        for _ in 0..3 {
            engine.exit(None, Outcome::Failure);
        }
        assert_eq!(engine.state(), CircuitState::Open);
        assert!(!engine.is_ready());

        control.advance(OPEN_TIMEOUT);
        assert!(engine.is_ready());
        assert!(matches!(engine.enter(), Enter::Accepted { transition: Some(_), .. }));
        assert_eq!(engine.state(), CircuitState::HalfOpen);
        assert_eq!(engine.generation(), 2);
        assert_eq!(engine.counters(), Counters::default());
    }
}
