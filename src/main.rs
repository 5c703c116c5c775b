use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::Instrument;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use procvisor::cli::{self, Cli, Command, DATABASE_URL_ENV, SupervisorArgs, WorkerArgs};
use procvisor::{
    EXIT_CONFIG_FAILURE, EXIT_SERVE_FAILURE, LogWriter, ProcessLauncher, Subscribe,
    SupervisorBuilder, SupervisorError, SupervisorReport, WORKER_ID_ENV, WorkerRuntime,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Loaded before tracing so RUST_LOG may come from the file.
    let env_file = cli::load_env_files();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match env_file {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "loaded env file"),
        Ok(None) => {}
        Err(e) => {
            tracing::error!(error = %e, "unreadable env file");
            return exit_code(EXIT_CONFIG_FAILURE);
        }
    }

    let Cli {
        command,
        supervisor,
        worker,
    } = Cli::parse();
    match command {
        Some(Command::Worker(args)) => run_worker(args).await,
        None => match supervise(supervisor, worker).await {
            Ok(report) => {
                tracing::info!(
                    spawned = report.spawned,
                    restarts = report.restarts,
                    exits = report.exits,
                    forced_kills = report.forced_kills,
                    "supervisor exiting"
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "supervisor failed");
                match e.downcast_ref::<SupervisorError>() {
                    Some(SupervisorError::Config(_)) => exit_code(EXIT_CONFIG_FAILURE),
                    _ => exit_code(EXIT_SERVE_FAILURE),
                }
            }
        },
    }
}

async fn supervise(
    args: SupervisorArgs,
    worker_args: WorkerArgs,
) -> anyhow::Result<SupervisorReport> {
    let cfg = args.to_config();
    let worker = worker_args.to_config();
    cfg.validate_worker(&worker)?;

    let mut launcher = ProcessLauncher::current_exe()
        .context("cannot locate the procvisor binary")?
        .args(worker_args.to_worker_argv());
    if let Some(url) = &worker.database_url {
        launcher = launcher.env(DATABASE_URL_ENV, url);
    }

    let signals = procvisor::subscribe().map_err(SupervisorError::Signals)?;
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    tracing::info!(
        workers = cfg.workers,
        addr = %worker.addr(),
        restart = cfg.enable_restart,
        grace_ms = cfg.shutdown_grace.as_millis() as u64,
        "starting fleet"
    );
    let supervisor = SupervisorBuilder::new(cfg, Arc::new(launcher))
        .with_subscribers(subs)
        .build()?;
    Ok(supervisor.run(signals).await?)
}

async fn run_worker(args: WorkerArgs) -> ExitCode {
    let id = std::env::var(WORKER_ID_ENV).unwrap_or_else(|_| "-".to_string());
    let span = tracing::info_span!("worker", id = %id, pid = std::process::id());

    match WorkerRuntime::new(args.to_config())
        .run()
        .instrument(span)
        .await
    {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(worker = %id, error = %e, label = e.as_label(), "worker failed");
            exit_code(e.exit_code())
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
