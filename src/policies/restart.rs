//! # Restart policy for worker processes.
//!
//! [`RestartPolicy`] decides whether a worker that has exited gets a replacement.
//!
//! - [`RestartPolicy::Never`] exits are final (restart disabled by configuration).
//! - [`RestartPolicy::OnFailure`] abnormal exits are replaced, clean exits are not (default).
//!
//! ## Decision rules
//! [`RestartPolicy::decide`] evaluates, in order:
//! ```text
//! 1. supervisor is shutting down   → DoNotRestart(ShuttingDown)   (exit was requested)
//! 2. policy is Never               → DoNotRestart(Disabled)
//! 3. code == 0 and no signal       → DoNotRestart(CleanExit)      (deliberate recycle)
//! 4. anything else                 → Restart                      (exactly one replacement)
//! ```
//!
//! The function is pure: the supervisor calls it once per exit notification, so
//! each exit yields at most one replacement.

use crate::core::WorkerExit;

/// Policy controlling whether an exited worker is replaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RestartPolicy {
    /// Never replace exited workers.
    Never,
    /// Replace workers that exit with a non-zero code or a signal (default).
    #[default]
    OnFailure,
}

/// What the supervisor is doing when an exit is evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SupervisorMode {
    /// Normal operation.
    Serving,
    /// A shutdown session is active; every exit is expected.
    ShuttingDown,
}

/// Why a replacement was not spawned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The exit happened during a shutdown session.
    ShuttingDown,
    /// Restarts are disabled by configuration.
    Disabled,
    /// The worker exited with status 0 and no signal.
    CleanExit,
}

impl SkipReason {
    /// Stable label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::ShuttingDown => "shutting_down",
            SkipReason::Disabled => "restart_disabled",
            SkipReason::CleanExit => "clean_exit",
        }
    }
}

/// Outcome of [`RestartPolicy::decide`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartDecision {
    /// Spawn exactly one replacement.
    Restart,
    /// Leave the slot empty.
    DoNotRestart(SkipReason),
}

impl RestartPolicy {
    /// Maps the `enable_restart` configuration flag onto a policy.
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            RestartPolicy::OnFailure
        } else {
            RestartPolicy::Never
        }
    }

    /// Decides whether `exit` warrants a replacement worker.
    pub fn decide(&self, exit: &WorkerExit, mode: SupervisorMode) -> RestartDecision {
        if mode == SupervisorMode::ShuttingDown {
            return RestartDecision::DoNotRestart(SkipReason::ShuttingDown);
        }
        if *self == RestartPolicy::Never {
            return RestartDecision::DoNotRestart(SkipReason::Disabled);
        }
        if exit.is_clean() {
            return RestartDecision::DoNotRestart(SkipReason::CleanExit);
        }
        RestartDecision::Restart
    }
}
