//! Timeout escalation state machine
//!
//! A configured timeout escalates in three stages, each armed by the previous one:
//!
//! | Phase | Deadline | Action on fire |
//! |-------|----------|----------------|
//! | `Running` | timeout + grace | send the graceful signal |
//! | `SignaledGraceful` | + kill_after | send the forceful signal |
//! | `SignaledForceful` | + resolve_after | force-resolve with a synthetic result |
//! | `ForceResolved` | none | nothing |
//!
//! The state machine only decides; the launcher performs the actions and races them against the
//! child's own exit through a [`OnceResolution`].

use std::time::Duration;
use tokio::time::Instant;

/// Durations of the escalation stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    /// Added to the configured timeout before the graceful signal
    pub grace: Duration,

    /// Wait between the graceful and the forceful signal
    pub kill_after: Duration,

    /// Wait after the forceful signal before giving up on the child
    pub resolve_after: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            kill_after: Duration::from_secs(5),
            resolve_after: Duration::from_secs(2),
        }
    }
}

impl TimeoutPolicy {
    /// Upper bound on how long a launch can take with the given timeout
    pub fn worst_case(&self, timeout: Duration) -> Duration {
        timeout
            .saturating_add(self.grace)
            .saturating_add(self.kill_after)
            .saturating_add(self.resolve_after)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardPhase {
    Running,
    SignaledGraceful,
    SignaledForceful,
    ForceResolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardAction {
    SendGraceful,
    SendForceful,
    ForceResolve,
}

#[derive(Debug)]
pub struct TimeoutGuard {
    phase: GuardPhase,
    deadline: Option<Instant>,
    policy: TimeoutPolicy,
}

impl TimeoutGuard {
    /// Arms the guard; without a timeout it never fires
    ///
    /// A timeout too large to represent as an instant is treated as no timeout.
    pub fn new(timeout: Option<Duration>, policy: TimeoutPolicy, now: Instant) -> Self {
        Self {
            phase: GuardPhase::Running,
            deadline: timeout
                .and_then(|t| now.checked_add(t))
                .and_then(|d| d.checked_add(policy.grace)),
            policy,
        }
    }

    pub fn phase(&self) -> GuardPhase {
        self.phase
    }

    /// The instant at which [`TimeoutGuard::on_deadline`] should next be called
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once the first stage has fired
    pub fn timed_out(&self) -> bool {
        self.phase != GuardPhase::Running
    }

    /// Advances one stage and re-arms the deadline for the next one
    pub fn on_deadline(&mut self, now: Instant) -> Option<GuardAction> {
        let (next, deadline, action) = match self.phase {
            GuardPhase::Running => (
                GuardPhase::SignaledGraceful,
                now.checked_add(self.policy.kill_after),
                GuardAction::SendGraceful,
            ),
            GuardPhase::SignaledGraceful => (
                GuardPhase::SignaledForceful,
                now.checked_add(self.policy.resolve_after),
                GuardAction::SendForceful,
            ),
            GuardPhase::SignaledForceful => {
                (GuardPhase::ForceResolved, None, GuardAction::ForceResolve)
            }
            GuardPhase::ForceResolved => return None,
        };

        self.phase = next;
        self.deadline = deadline;
        Some(action)
    }
}

/// Holds the first value offered to it; later offers are ignored
#[derive(Debug)]
pub struct OnceResolution<T> {
    value: Option<T>,
}

impl<T> OnceResolution<T> {
    pub fn new() -> Self {
        Self { value: None }
    }

    /// Returns true if this call won the resolution
    pub fn resolve(&mut self, value: T) -> bool {
        if self.value.is_some() {
            return false;
        }
        self.value = Some(value);
        true
    }

    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }

    pub fn into_inner(self) -> Option<T> {
        self.value
    }
}

impl<T> Default for OnceResolution<T> {
    fn default() -> Self {
        Self::new()
    }
}
