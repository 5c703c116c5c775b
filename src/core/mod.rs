//! Supervisor core: fleet bookkeeping, process control and shutdown.
//!
//! The main entry point is [`Supervisor`], built with [`SupervisorBuilder`].
//!
//! Internal modules:
//! - [`registry`]: worker identities, states and exit statuses (no I/O);
//! - [`shutdown`]: the `Idle → Draining → Complete` state machine;
//! - [`launcher`]: process creation, readiness and exit notices;
//! - [`signals`]: termination signal subscription;
//! - [`supervisor`]: the control loop composing all of the above;
//! - [`builder`]: configuration validation and wiring.

mod builder;
mod launcher;
mod registry;
mod shutdown;
mod signals;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use launcher::{
    Launcher, Notice, Notifier, ProcessLauncher, READY_LINE, WORKER_ID_ENV, WorkerHandle,
};
pub use registry::{Registry, WorkerExit, WorkerId, WorkerRecord, WorkerState};
pub use shutdown::{Completion, Phase, ShutdownCoordinator, ShutdownSession};
pub use signals::{TermSignal, signal_name, subscribe};
pub use supervisor::{Supervisor, SupervisorReport};
