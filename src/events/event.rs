//! # Lifecycle events emitted by the supervisor.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Worker lifecycle**: spawn, ready, exit, spawn failure
//! - **Restart decisions**: replacement scheduled or skipped
//! - **Shutdown protocol**: signal received/ignored, request sent, force kill, completion
//!
//! The [`Event`] struct carries worker identity, pid, exit status, delays and
//! reasons. Events are the supervisor's only diagnostic surface; the
//! [`LogWriter`](crate::LogWriter) turns them into structured log records.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use procvisor::{Event, EventKind, WorkerExit, WorkerId};
//!
//! let ev = Event::new(EventKind::WorkerExited)
//!     .with_worker(WorkerId::new(2))
//!     .with_pid(Some(4242))
//!     .with_exit(&WorkerExit::code(1));
//!
//! assert_eq!(ev.kind, EventKind::WorkerExited);
//! assert_eq!(ev.worker, Some(2));
//! assert_eq!(ev.exit_code, Some(1));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::core::{WorkerExit, WorkerId};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of supervisor events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Worker lifecycle ===
    /// A worker process was created.
    ///
    /// Sets: `worker`, `pid`
    WorkerSpawned,

    /// A worker reported its listener bound (Starting → Running).
    ///
    /// Sets: `worker`, `pid`
    WorkerReady,

    /// The OS reported a worker's exit.
    ///
    /// Sets: `worker`, `pid`, `exit_code` and/or `exit_signal`, `uptime_ms`,
    /// `reason` (`expected` during shutdown)
    WorkerExited,

    /// A worker process could not be created.
    ///
    /// Sets: `worker`, `reason`
    WorkerSpawnFailed,

    // === Restart decisions ===
    /// A replacement was scheduled for an exited worker.
    ///
    /// Sets: `worker` (the exited one), `delay_ms`, `attempt` (crash streak)
    RestartScheduled,

    /// No replacement will be spawned for an exited worker.
    ///
    /// Sets: `worker`, `reason` (skip reason); when a shutdown drops delayed
    /// replacements, `attempt` (number dropped) instead of `worker`
    RestartSkipped,

    // === Shutdown protocol ===
    /// A termination signal started the shutdown session.
    ///
    /// Sets: `reason` (signal name), `delay_ms` (grace period), `attempt` (pending workers)
    ShutdownRequested,

    /// A termination signal arrived while a session was already active.
    ///
    /// Sets: `reason` (signal name)
    ShutdownSignalIgnored,

    /// A shutdown request was delivered to a worker.
    ///
    /// Sets: `worker`, `pid`, `reason` (only if delivery failed)
    ShutdownRequestSent,

    /// The grace period elapsed and a worker was killed.
    ///
    /// Sets: `worker`, `pid`
    WorkerForceKilled,

    /// The shutdown session finished.
    ///
    /// Sets: `attempt` (number of forced kills), `reason` (`drained` or `deadline`)
    ShutdownComplete,

    /// Every worker exited on its own and none will be replaced.
    FleetDrained,
}

impl EventKind {
    /// Stable snake_case name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::WorkerSpawned => "worker_spawned",
            EventKind::WorkerReady => "worker_ready",
            EventKind::WorkerExited => "worker_exited",
            EventKind::WorkerSpawnFailed => "worker_spawn_failed",
            EventKind::RestartScheduled => "restart_scheduled",
            EventKind::RestartSkipped => "restart_skipped",
            EventKind::ShutdownRequested => "shutdown_requested",
            EventKind::ShutdownSignalIgnored => "shutdown_signal_ignored",
            EventKind::ShutdownRequestSent => "shutdown_request_sent",
            EventKind::WorkerForceKilled => "worker_force_killed",
            EventKind::ShutdownComplete => "shutdown_complete",
            EventKind::FleetDrained => "fleet_drained",
        }
    }
}

/// Supervisor event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Worker identity, if applicable.
    pub worker: Option<u64>,
    /// OS process id of the worker, if known.
    pub pid: Option<u32>,
    /// Exit code of an exited worker.
    pub exit_code: Option<i32>,
    /// Terminating signal number of an exited worker.
    pub exit_signal: Option<i32>,
    /// Delay in milliseconds (restart pacing, grace period).
    pub delay_ms: Option<u32>,
    /// How long an exited worker ran, in milliseconds.
    pub uptime_ms: Option<u64>,
    /// Counter (crash streak, pending workers, forced kills).
    pub attempt: Option<u32>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            pid: None,
            exit_code: None,
            exit_signal: None,
            delay_ms: None,
            uptime_ms: None,
            attempt: None,
            reason: None,
        }
    }

    /// Attaches a worker identity.
    #[inline]
    pub fn with_worker(mut self, id: WorkerId) -> Self {
        self.worker = Some(id.get());
        self
    }

    /// Attaches the worker's pid (if known).
    #[inline]
    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    /// Attaches an exit status.
    #[inline]
    pub fn with_exit(mut self, exit: &WorkerExit) -> Self {
        self.exit_code = exit.code;
        self.exit_signal = exit.signal;
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches the lifetime of an exited worker.
    #[inline]
    pub fn with_uptime(mut self, d: Duration) -> Self {
        self.uptime_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// Attaches a counter.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::WorkerSpawned);
        let b = Event::new(EventKind::WorkerSpawned);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn delay_saturates() {
        let ev = Event::new(EventKind::RestartScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn exit_fields_copied() {
        let ev = Event::new(EventKind::WorkerExited).with_exit(&WorkerExit::signal(15));
        assert_eq!(ev.exit_code, None);
        assert_eq!(ev.exit_signal, Some(15));
    }
}
