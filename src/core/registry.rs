//! # Worker registry: the supervisor's view of its fleet.
//!
//! Pure bookkeeping, no I/O: the supervisor inserts a record when it spawns a
//! worker, updates its state on lifecycle notices and removes it once the exit
//! has been observed.
//!
//! ## Lifecycle
//! ```text
//! spawn ──► Starting ──ready──► Running ──shutdown request──► ShuttingDown
//!              │                   │                              │
//!              └───────────────────┴──────── exit observed ───────┴──► Exited ──► removed
//! ```
//!
//! ## Rules
//! - The registry is owned by the supervisor control loop; every mutation runs
//!   on that single task, so there is no locking.
//! - [`Registry::take_exited`] removes the record; a duplicate exit notice for the
//!   same identity finds nothing and therefore cannot trigger a second restart.
//! - Identities are never reused within one supervisor lifetime.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::core::launcher::WorkerHandle;
use crate::core::signals::signal_name;

/// Opaque worker identity, unique for the lifetime of a supervisor.
///
/// Not the OS pid: pids are recycled, identities are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    /// Wraps a raw identity.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw identity value.
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a worker record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Process created, listener not yet confirmed.
    Starting,
    /// Listener bound, serving requests.
    Running,
    /// Shutdown requested, waiting for exit.
    ShuttingDown,
    /// Exit observed by the OS.
    Exited,
}

/// OS-level exit status of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Signal number, if the process was terminated by a signal.
    pub signal: Option<i32>,
}

impl WorkerExit {
    /// Normal exit with `code`.
    pub const fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Termination by signal number `signal`.
    pub const fn signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// Status could not be determined (wait failed).
    pub const fn unknown() -> Self {
        Self {
            code: None,
            signal: None,
        }
    }

    /// Exit code 0 and no signal: a deliberate exit.
    pub fn is_clean(&self) -> bool {
        self.code == Some(0) && self.signal.is_none()
    }
}

impl From<std::process::ExitStatus> for WorkerExit {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (_, Some(sig)) => write!(f, "signal {}", signal_name(sig)),
            (Some(code), None) => write!(f, "code {code}"),
            (None, None) => f.write_str("unknown status"),
        }
    }
}

/// One supervised worker.
pub struct WorkerRecord {
    /// Identity of the worker.
    pub id: WorkerId,
    /// OS process id (diagnostics only).
    pub pid: Option<u32>,
    /// Current lifecycle state.
    pub state: WorkerState,
    /// Exit status, set only when `state == Exited`.
    pub exit: Option<WorkerExit>,
    /// When the process was created.
    pub spawned_at: Instant,
    /// Control handle for the process.
    pub handle: Box<dyn WorkerHandle>,
}

impl WorkerRecord {
    /// New record in state [`WorkerState::Starting`].
    pub fn starting(id: WorkerId, handle: Box<dyn WorkerHandle>) -> Self {
        Self {
            id,
            pid: handle.pid(),
            state: WorkerState::Starting,
            exit: None,
            spawned_at: Instant::now(),
            handle,
        }
    }

    /// Time since the process was created.
    pub fn uptime(&self) -> Duration {
        self.spawned_at.elapsed()
    }
}

impl fmt::Debug for WorkerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerRecord")
            .field("id", &self.id)
            .field("pid", &self.pid)
            .field("state", &self.state)
            .field("exit", &self.exit)
            .finish_non_exhaustive()
    }
}

/// Live mapping from worker identity to record.
#[derive(Debug, Default)]
pub struct Registry {
    workers: BTreeMap<WorkerId, WorkerRecord>,
    next_id: u64,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next identity (starting at 1).
    pub fn allocate_id(&mut self) -> WorkerId {
        self.next_id += 1;
        WorkerId(self.next_id)
    }

    /// Inserts a record. Returns `false` (and drops nothing) if the identity is taken.
    pub fn insert(&mut self, record: WorkerRecord) -> bool {
        if self.workers.contains_key(&record.id) {
            return false;
        }
        self.workers.insert(record.id, record);
        true
    }

    /// Looks up a record by identity.
    pub fn get(&self, id: WorkerId) -> Option<&WorkerRecord> {
        self.workers.get(&id)
    }

    /// Starting → Running. Returns `true` if the state changed.
    pub fn mark_running(&mut self, id: WorkerId) -> bool {
        match self.workers.get_mut(&id) {
            Some(rec) if rec.state == WorkerState::Starting => {
                rec.state = WorkerState::Running;
                true
            }
            _ => false,
        }
    }

    /// Starting/Running → ShuttingDown. Returns `true` if the state changed.
    pub fn mark_shutting_down(&mut self, id: WorkerId) -> bool {
        match self.workers.get_mut(&id) {
            Some(rec) if matches!(rec.state, WorkerState::Starting | WorkerState::Running) => {
                rec.state = WorkerState::ShuttingDown;
                true
            }
            _ => false,
        }
    }

    /// Marks the worker exited and removes it.
    ///
    /// Returns `None` if the identity is unknown (already processed).
    pub fn take_exited(&mut self, id: WorkerId, exit: WorkerExit) -> Option<WorkerRecord> {
        let mut rec = self.workers.remove(&id)?;
        rec.state = WorkerState::Exited;
        rec.exit = Some(exit);
        Some(rec)
    }

    /// Sorted identities of all registered workers.
    pub fn ids(&self) -> Vec<WorkerId> {
        self.workers.keys().copied().collect()
    }

    /// Number of registered workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// True if no worker is registered.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
