//! # Command-line and environment configuration.
//!
//! Every setting can be given as a flag or an environment variable. Before
//! parsing, [`load_env_files`] reads `config/.env.<APP_ENV>.local`
//! (`APP_ENV` falls back to `NODE_ENV`, then to `development`); variables
//! already set in the environment win over the file.
//!
//! ```text
//! procvisor [--workers N] [--enable-restart BOOL] [--shutdown-grace-ms MS] [worker flags]
//! procvisor worker [worker flags]          (spawned by the supervisor)
//! ```

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::config::{Config, WorkerConfig, default_workers};
use crate::policies::{BackoffPolicy, JitterPolicy};

/// Environment variable selecting the `.env` profile.
pub const APP_ENV: &str = "APP_ENV";

/// Profile variable honoured when [`APP_ENV`] is unset.
pub const NODE_ENV: &str = "NODE_ENV";

const DEFAULT_PROFILE: &str = "development";

/// Environment variable carrying the database URL.
pub const DATABASE_URL_ENV: &str = "DB_URI";

/// Pre-fork HTTP worker supervisor.
#[derive(Parser, Debug)]
#[command(name = "procvisor", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub supervisor: SupervisorArgs,

    #[command(flatten)]
    pub worker: WorkerArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single worker process (spawned by the supervisor).
    #[command(hide = true)]
    Worker(WorkerArgs),
}

/// Supervisor settings.
#[derive(Args, Debug, Clone)]
pub struct SupervisorArgs {
    /// Number of worker processes [default: number of CPUs]
    #[arg(long, env = "PROCVISOR_WORKERS", value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: Option<u16>,

    /// Replace workers that exit abnormally.
    #[arg(long, env = "PROCVISOR_ENABLE_RESTART", default_value_t = true, action = ArgAction::Set)]
    pub enable_restart: bool,

    /// Time workers get to drain after a termination signal.
    #[arg(long, env = "PROCVISOR_SHUTDOWN_GRACE_MS", default_value_t = 5000)]
    pub shutdown_grace_ms: u64,

    /// Delay before the first replacement of a crash streak (0 = immediate).
    #[arg(long, env = "PROCVISOR_RESTART_DELAY_MS", default_value_t = 0)]
    pub restart_delay_ms: u64,

    /// Cap on the replacement delay.
    #[arg(long, env = "PROCVISOR_RESTART_DELAY_MAX_MS", default_value_t = 30_000)]
    pub restart_delay_max_ms: u64,

    /// Growth factor of the replacement delay.
    #[arg(long, env = "PROCVISOR_RESTART_DELAY_FACTOR", default_value_t = 2.0)]
    pub restart_delay_factor: f64,

    /// Randomization of the replacement delay.
    #[arg(long, env = "PROCVISOR_RESTART_JITTER", value_enum, default_value_t = JitterArg::None)]
    pub restart_jitter: JitterArg,
}

/// Jitter choices on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterArg {
    None,
    Full,
    Equal,
}

impl From<JitterArg> for JitterPolicy {
    fn from(arg: JitterArg) -> Self {
        match arg {
            JitterArg::None => JitterPolicy::None,
            JitterArg::Full => JitterPolicy::Full,
            JitterArg::Equal => JitterPolicy::Equal,
        }
    }
}

impl SupervisorArgs {
    /// Builds the supervisor [`Config`].
    pub fn to_config(&self) -> Config {
        Config {
            workers: self.workers.map(usize::from).unwrap_or_else(default_workers),
            enable_restart: self.enable_restart,
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
            restart_backoff: BackoffPolicy {
                first: Duration::from_millis(self.restart_delay_ms),
                max: Duration::from_millis(self.restart_delay_max_ms),
                factor: self.restart_delay_factor,
                jitter: self.restart_jitter.into(),
            },
        }
    }
}

/// Worker settings; the supervisor forwards them to every worker it spawns.
#[derive(Args, Debug, Clone)]
pub struct WorkerArgs {
    /// Address to listen on.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port shared by all workers.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Database URL checked at worker startup.
    #[arg(long, env = DATABASE_URL_ENV, hide_env_values = true)]
    pub database_url: Option<String>,

    /// Bound on the database connectivity check.
    #[arg(long, env = "PROCVISOR_DB_CONNECT_TIMEOUT_MS", default_value_t = 5000)]
    pub db_connect_timeout_ms: u64,

    /// Bound on each request.
    #[arg(long, env = "PROCVISOR_REQUEST_TIMEOUT_MS", default_value_t = 30_000)]
    pub request_timeout_ms: u64,
}

impl WorkerArgs {
    /// Builds the [`WorkerConfig`].
    pub fn to_config(&self) -> WorkerConfig {
        WorkerConfig {
            host: self.host,
            port: self.port,
            database_url: self.database_url.clone(),
            db_connect_timeout: Duration::from_millis(self.db_connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    /// Arguments for the `worker` subcommand.
    ///
    /// The database URL is not included; it travels in the environment so it
    /// does not show up in process listings.
    pub fn to_worker_argv(&self) -> Vec<OsString> {
        vec![
            "worker".into(),
            "--host".into(),
            self.host.to_string().into(),
            "--port".into(),
            self.port.to_string().into(),
            "--db-connect-timeout-ms".into(),
            self.db_connect_timeout_ms.to_string().into(),
            "--request-timeout-ms".into(),
            self.request_timeout_ms.to_string().into(),
        ]
    }
}

/// Path of the `.env` file for the current profile.
pub fn env_file_path() -> PathBuf {
    profile_path(std::env::var(APP_ENV).ok(), std::env::var(NODE_ENV).ok())
}

fn profile_path(app_env: Option<String>, node_env: Option<String>) -> PathBuf {
    let profile = app_env
        .or(node_env)
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
    PathBuf::from(format!("config/.env.{profile}.local"))
}

/// Loads the profile `.env` file if present.
///
/// Returns the path that was loaded. A missing file is not an error.
pub fn load_env_files() -> Result<Option<PathBuf>, dotenvy::Error> {
    let path = env_file_path();
    match dotenvy::from_path(&path) {
        Ok(()) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
