//! # Runtime configuration.
//!
//! [`Config`] holds the supervisor settings, [`WorkerConfig`] the settings each
//! worker process needs to serve. Both are plain structs with defaults; the
//! binary fills them from command-line flags and environment variables (see
//! [`cli`](crate::cli)).
//!
//! ## Defaults
//! - `workers`: available parallelism (processing units)
//! - `enable_restart`: `true`
//! - `shutdown_grace`: 5000 ms
//! - `restart_backoff`: immediate (no pacing)
//! - worker listens on `0.0.0.0:3000`, no database, 5 s connect timeout, 30 s request timeout

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::error::{SupervisorError, WorkerError};
use crate::policies::{BackoffPolicy, RestartPolicy};

/// Supervisor configuration.
///
/// ## Field semantics
/// - `workers`: fleet size (must be `>= 1`)
/// - `enable_restart`: replace workers that exit abnormally
/// - `shutdown_grace`: time workers get to drain before they are killed (`0` = kill at once)
/// - `restart_backoff`: delay before a replacement is spawned
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Number of worker processes.
    pub workers: usize,
    /// Whether abnormal exits are replaced.
    pub enable_restart: bool,
    /// Deadline for the shutdown session.
    pub shutdown_grace: Duration,
    /// Pacing for replacement workers.
    pub restart_backoff: BackoffPolicy,
}

impl Config {
    /// Restart policy derived from `enable_restart`.
    #[inline]
    pub fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy::from_enabled(self.enable_restart)
    }

    /// Checks invariants the supervisor relies on.
    pub fn validate(&self) -> Result<(), SupervisorError> {
        if self.workers == 0 {
            return Err(SupervisorError::Config("workers must be >= 1".into()));
        }
        let backoff = &self.restart_backoff;
        if !backoff.factor.is_finite() || backoff.factor <= 0.0 {
            return Err(SupervisorError::Config(
                "restart delay factor must be a positive number".into(),
            ));
        }
        Ok(())
    }

    /// Checks that every worker of the fleet can run with `worker`.
    ///
    /// Port 0 lets each worker pick its own ephemeral port, so it is only
    /// accepted for a single-worker fleet.
    pub fn validate_worker(&self, worker: &WorkerConfig) -> Result<(), SupervisorError> {
        worker
            .validate()
            .map_err(|e| SupervisorError::Config(e.to_string()))?;
        if worker.port == 0 && self.workers > 1 {
            return Err(SupervisorError::Config(format!(
                "port 0 would give each of the {} workers its own port; set an explicit port",
                self.workers
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            enable_restart: true,
            shutdown_grace: Duration::from_millis(5000),
            restart_backoff: BackoffPolicy::immediate(),
        }
    }
}

/// Number of processing units, or 1 if it cannot be determined.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Settings of one worker process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Address to listen on.
    pub host: IpAddr,
    /// Shared port.
    pub port: u16,
    /// Database URL; `None` skips the connectivity check.
    pub database_url: Option<String>,
    /// Bound on the database connectivity check.
    pub db_connect_timeout: Duration,
    /// Bound on each request, so draining never waits forever on one connection.
    pub request_timeout: Duration,
}

impl WorkerConfig {
    /// Socket address to bind.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Checks invariants the worker relies on.
    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.request_timeout.is_zero() {
            return Err(WorkerError::Config("request timeout must be > 0".into()));
        }
        if self.db_connect_timeout.is_zero() {
            return Err(WorkerError::Config(
                "database connect timeout must be > 0".into(),
            ));
        }
        Ok(())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            database_url: None,
            db_connect_timeout: Duration::from_millis(5000),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert!(cfg.workers >= 1);
        assert!(cfg.enable_restart);
        assert_eq!(cfg.shutdown_grace, Duration::from_millis(5000));
        assert!(cfg.restart_backoff.is_immediate());
        assert_eq!(cfg.restart_policy(), RestartPolicy::OnFailure);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_workers_rejected() {
        let cfg = Config {
            workers: 0,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(SupervisorError::Config(_))));
    }

    #[test]
    fn disabled_restart_maps_to_never() {
        let cfg = Config {
            enable_restart: false,
            ..Config::default()
        };
        assert_eq!(cfg.restart_policy(), RestartPolicy::Never);
    }

    #[test]
    fn ephemeral_port_needs_a_single_worker() {
        let worker = WorkerConfig {
            port: 0,
            ..WorkerConfig::default()
        };
        let fleet = Config {
            workers: 2,
            ..Config::default()
        };
        assert!(matches!(
            fleet.validate_worker(&worker),
            Err(SupervisorError::Config(_))
        ));

        let single = Config {
            workers: 1,
            ..Config::default()
        };
        assert!(single.validate_worker(&worker).is_ok());
        assert!(fleet.validate_worker(&WorkerConfig::default()).is_ok());
    }

    #[test]
    fn worker_addr() {
        let cfg = WorkerConfig {
            port: 8080,
            ..WorkerConfig::default()
        };
        assert_eq!(cfg.addr().to_string(), "0.0.0.0:8080");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_request_timeout_rejected() {
        let cfg = WorkerConfig {
            request_timeout: Duration::ZERO,
            ..WorkerConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(WorkerError::Config(_))));
    }
}
