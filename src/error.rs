//! Error types used by the supervisor and the worker runtime.
//!
//! This module defines two main error enums:
//!
//! - [`SupervisorError`]: errors raised by the supervising process itself.
//! - [`WorkerError`]: errors that terminate a single worker process.
//!
//! Both types provide a stable [`as_label`](SupervisorError::as_label) for logs.
//! [`WorkerError::exit_code`] maps each failure to the distinguishable process
//! status the supervisor observes.

use std::io;

use thiserror::Error;

/// Worker exited cleanly after draining.
pub const EXIT_OK: i32 = 0;
/// Worker failed while serving requests.
pub const EXIT_SERVE_FAILURE: i32 = 1;
/// Worker (or supervisor) rejected its configuration.
pub const EXIT_CONFIG_FAILURE: i32 = 2;
/// Worker could not acquire the shared listening port.
pub const EXIT_BIND_FAILURE: i32 = 3;
/// Worker could not reach its database.
pub const EXIT_DATABASE_FAILURE: i32 = 4;

/// # Errors produced by the supervisor.
///
/// Worker deaths are **not** errors here: they are handled by the restart
/// policy and reported as lifecycle events. These variants cover failures
/// that stop the supervisor from doing its job at all.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// A worker process could not be created.
    #[error("failed to spawn worker #{worker}: {source}")]
    Spawn {
        /// Identity the worker would have received.
        worker: u64,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Termination signal handlers could not be installed.
    #[error("failed to subscribe to termination signals: {0}")]
    Signals(#[source] io::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use procvisor::SupervisorError;
    ///
    /// let err = SupervisorError::Config("workers must be >= 1".into());
    /// assert_eq!(err.as_label(), "supervisor_config");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::Spawn { .. } => "supervisor_spawn",
            SupervisorError::Signals(_) => "supervisor_signals",
            SupervisorError::Config(_) => "supervisor_config",
        }
    }
}

/// # Errors that end a worker process.
///
/// Every variant is fatal to the worker only; the supervisor sees the
/// resulting non-zero exit status and applies its restart policy.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The shared port could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the worker tried to listen on.
        addr: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The database collaborator refused or timed out.
    #[error("database connection failed: {0}")]
    Database(String),

    /// The HTTP server stopped with an I/O error.
    #[error("server error: {0}")]
    Serve(#[source] io::Error),

    /// Worker configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl WorkerError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Bind { .. } => "worker_bind",
            WorkerError::Database(_) => "worker_database",
            WorkerError::Serve(_) => "worker_serve",
            WorkerError::Config(_) => "worker_config",
        }
    }

    /// Process exit status the worker terminates with for this error.
    ///
    /// # Example
    /// ```
    /// use procvisor::{WorkerError, EXIT_DATABASE_FAILURE};
    ///
    /// let err = WorkerError::Database("connection refused".into());
    /// assert_eq!(err.exit_code(), EXIT_DATABASE_FAILURE);
    /// ```
    pub fn exit_code(&self) -> i32 {
        match self {
            WorkerError::Bind { .. } => EXIT_BIND_FAILURE,
            WorkerError::Database(_) => EXIT_DATABASE_FAILURE,
            WorkerError::Serve(_) => EXIT_SERVE_FAILURE,
            WorkerError::Config(_) => EXIT_CONFIG_FAILURE,
        }
    }
}
