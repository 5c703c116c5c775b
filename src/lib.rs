//! # procvisor
//!
//! **Procvisor** runs an HTTP service as a fleet of worker processes that
//! share one listening port. The supervising process never serves requests:
//! it spawns the workers, replaces the ones that die abnormally and, on a
//! termination signal, shuts the whole fleet down within a bounded time.
//!
//! ## Architecture
//! ```text
//!                    SIGINT / SIGTERM / SIGQUIT
//!                               │
//! ┌─────────────────────────────▼─────────────────────────────────────┐
//! │  Supervisor (single control loop)                                 │
//! │  - Registry            (worker id → state, handle)                │
//! │  - RestartPolicy       (replace abnormal exits, BackoffPolicy)    │
//! │  - ShutdownCoordinator (Idle → Draining → Complete, one deadline) │
//! │  - SubscriberSet       (lifecycle events → LogWriter, ...)        │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        │ Launcher         │                  │         ▲
//!        ▼                  ▼                  ▼         │ Notice::Ready / Notice::Exited
//!   ┌──────────┐       ┌──────────┐       ┌──────────┐   │ (stdout "ready", OS exit status)
//!   │ worker 1 │       │ worker 2 │  ...  │ worker N │───┘
//!   │ (axum)   │       │ (axum)   │       │ (axum)   │
//!   └────┬─────┘       └────┬─────┘       └────┬─────┘
//!        └──────────────────┼──────────────────┘
//!                           ▼
//!                shared port (SO_REUSEPORT)
//! ```
//!
//! ### Shutdown
//! ```text
//! signal ─► ShutdownRequested ─► SIGTERM to every worker ─► deadline armed (grace)
//!   ├─ all exited before deadline ─► ShutdownComplete(drained)
//!   └─ deadline fired             ─► SIGKILL remaining ─► ShutdownComplete(deadline)
//! a second signal while draining ─► ShutdownSignalIgnored
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Spawn, track, replace and stop worker processes.          | [`Supervisor`], [`SupervisorBuilder`]       |
//! | **Processes**     | Pluggable process creation and control.                   | [`Launcher`], [`ProcessLauncher`]           |
//! | **Policies**      | Whether and when a crashed worker is replaced.            | [`RestartPolicy`], [`BackoffPolicy`]        |
//! | **Shutdown**      | Bounded-time termination state machine.                   | [`ShutdownCoordinator`]                     |
//! | **Events**        | Lifecycle events with fan-out to subscribers.             | [`Event`], [`Subscribe`], [`LogWriter`]     |
//! | **Workers**       | Shared-port HTTP worker with graceful drain.              | [`WorkerRuntime`], [`RequestStack`]         |
//! | **Configuration** | Supervisor and worker settings.                           | [`Config`], [`WorkerConfig`]                |
//! | **Errors**        | Typed errors and worker exit codes.                       | [`SupervisorError`], [`WorkerError`]        |
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use procvisor::{Config, LogWriter, ProcessLauncher, Subscribe, SupervisorBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let launcher = ProcessLauncher::current_exe()?.arg("worker");
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!
//!     let supervisor = SupervisorBuilder::new(Config::default(), Arc::new(launcher))
//!         .with_subscribers(subs)
//!         .build()?;
//!
//!     let report = supervisor.run(procvisor::subscribe()?).await?;
//!     println!("forced kills: {}", report.forced_kills);
//!     Ok(())
//! }
//! ```

pub mod cli;
mod config;
mod core;
mod error;
mod events;
mod policies;
mod subscribers;
mod worker;

pub use config::{Config, WorkerConfig, default_workers};
pub use core::{
    Completion, Launcher, Notice, Notifier, Phase, ProcessLauncher, READY_LINE, Registry,
    ShutdownCoordinator, ShutdownSession, Supervisor, SupervisorBuilder, SupervisorReport,
    TermSignal, WORKER_ID_ENV, WorkerExit, WorkerHandle, WorkerId, WorkerRecord, WorkerState,
    signal_name, subscribe,
};
pub use error::{
    EXIT_BIND_FAILURE, EXIT_CONFIG_FAILURE, EXIT_DATABASE_FAILURE, EXIT_OK, EXIT_SERVE_FAILURE,
    SupervisorError, WorkerError,
};
pub use events::{Event, EventKind};
pub use policies::{
    BackoffPolicy, JitterPolicy, RestartDecision, RestartPolicy, SkipReason, SupervisorMode,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use worker::{DefaultStack, RequestStack, WorkerRuntime, bind_shared, database_hosts};
