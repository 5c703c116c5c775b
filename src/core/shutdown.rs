//! # Shutdown coordinator: bounded-time fleet termination.
//!
//! A pure state machine; the supervisor performs the I/O it asks for.
//!
//! ```text
//!            signal                         pending empty
//!   Idle ─────────────► Draining ─────────────────────────► Complete
//!                          │                                    ▲
//!                          └──── deadline elapsed ──────────────┘
//!                                (force-kill what is still pending)
//! ```
//!
//! ## Rules
//! - [`ShutdownCoordinator::begin`] opens at most one session per lifetime; later
//!   calls return `None` and change nothing (a second signal is ignored).
//! - `pending` is a snapshot of the registry taken at `begin`; only those
//!   identities are waited for.
//! - The deadline is fixed at `begin + grace` and is never extended.
//! - `Complete` is terminal.

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::time::Instant;

use crate::core::registry::WorkerId;

/// How a session reached [`Phase::Complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every pending worker exited within the grace period.
    Drained,
    /// The deadline fired; the listed number of workers were force-terminated.
    Deadline,
}

impl Completion {
    /// Stable label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Completion::Drained => "drained",
            Completion::Deadline => "deadline",
        }
    }
}

/// State kept while a termination sequence is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownSession {
    /// After this instant, remaining workers are force-terminated.
    pub deadline: Instant,
    /// Workers not yet confirmed exited.
    pub pending: BTreeSet<WorkerId>,
}

/// Coordinator phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// No termination requested.
    Idle,
    /// Waiting for workers to drain.
    Draining(ShutdownSession),
    /// Terminal state.
    Complete {
        /// How the session ended.
        via: Completion,
        /// Number of workers force-terminated.
        forced: usize,
    },
}

/// Drives the `Idle → Draining → Complete` protocol.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    grace: Duration,
    phase: Phase,
}

impl ShutdownCoordinator {
    /// Creates an idle coordinator with grace period `grace`.
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            phase: Phase::Idle,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Configured grace period.
    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// True once a session has been opened (draining or complete).
    pub fn in_shutdown(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    /// Deadline of the active session, if any.
    pub fn deadline(&self) -> Option<Instant> {
        match &self.phase {
            Phase::Draining(s) => Some(s.deadline),
            _ => None,
        }
    }

    /// Opens the session: `Idle → Draining` (or straight to `Complete` when
    /// `live` is empty).
    ///
    /// Returns the identities to send shutdown requests to, or `None` if a
    /// session was already opened.
    pub fn begin(
        &mut self,
        now: Instant,
        live: impl IntoIterator<Item = WorkerId>,
    ) -> Option<Vec<WorkerId>> {
        if self.in_shutdown() {
            return None;
        }
        let pending: BTreeSet<WorkerId> = live.into_iter().collect();
        let targets: Vec<WorkerId> = pending.iter().copied().collect();

        self.phase = if pending.is_empty() {
            Phase::Complete {
                via: Completion::Drained,
                forced: 0,
            }
        } else {
            Phase::Draining(ShutdownSession {
                deadline: now + self.grace,
                pending,
            })
        };
        Some(targets)
    }

    /// Records an observed exit.
    ///
    /// Returns `true` if `id` was pending. Completes the session when the last
    /// pending worker exits.
    pub fn observe_exit(&mut self, id: WorkerId) -> bool {
        let Phase::Draining(session) = &mut self.phase else {
            return false;
        };
        let was_pending = session.pending.remove(&id);
        if session.pending.is_empty() {
            self.phase = Phase::Complete {
                via: Completion::Drained,
                forced: 0,
            };
        }
        was_pending
    }

    /// Deadline elapsed: `Draining → Complete`.
    ///
    /// Returns every identity still pending; the caller force-terminates them.
    /// Returns an empty list when not draining.
    pub fn expire(&mut self) -> Vec<WorkerId> {
        let Phase::Draining(session) = &mut self.phase else {
            return Vec::new();
        };
        let stuck: Vec<WorkerId> = std::mem::take(&mut session.pending).into_iter().collect();
        self.phase = Phase::Complete {
            via: Completion::Deadline,
            forced: stuck.len(),
        };
        stuck
    }
}
