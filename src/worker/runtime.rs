//! # Worker runtime: one process, one listener, one request pipeline.
//!
//! ```text
//! run()
//!   ├─ install SIGINT/SIGTERM/SIGQUIT watcher ──► CancellationToken
//!   ├─ stack.connect_database()         (cancellable; error ─► exit 4)
//!   ├─ bind_shared(host:port)           (error ─► exit 3)
//!   ├─ print "ready" on stdout          (supervisor: Starting → Running)
//!   └─ axum::serve(listener, router)
//!         .with_graceful_shutdown(token.cancelled())
//!           └─ stop accepting, finish in-flight requests ─► exit 0
//! ```
//!
//! Each request is bounded by `request_timeout`, and so is the drain once the
//! token is cancelled: a connection that never finishes sending its request
//! is abandoned when that bound elapses.

use std::future::IntoFuture;
use std::io::{self, Write};
use std::net::SocketAddr;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::WorkerConfig;
use crate::core::{READY_LINE, TermSignal, subscribe};
use crate::error::WorkerError;
use crate::worker::listener::bind_shared;
use crate::worker::stack::{DefaultStack, RequestStack};

/// Runs one worker until it is told to stop.
pub struct WorkerRuntime<S = DefaultStack> {
    cfg: WorkerConfig,
    stack: S,
    shutdown: CancellationToken,
}

impl WorkerRuntime<DefaultStack> {
    /// Worker serving the [`DefaultStack`].
    pub fn new(cfg: WorkerConfig) -> Self {
        Self::with_stack(cfg, DefaultStack)
    }
}

impl<S: RequestStack> WorkerRuntime<S> {
    /// Worker serving `stack`.
    pub fn with_stack(cfg: WorkerConfig, stack: S) -> Self {
        Self {
            cfg,
            stack,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the worker when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serves until a termination signal arrives, reporting readiness on stdout.
    pub async fn run(self) -> Result<(), WorkerError> {
        self.cfg.validate()?;
        watch_signals(self.shutdown.clone()).map_err(WorkerError::Serve)?;
        self.serve(announce_ready).await
    }

    /// Serves until the shutdown token is cancelled.
    ///
    /// `ready` is called once with the bound address before the first
    /// connection is accepted.
    pub async fn serve<F>(self, ready: F) -> Result<(), WorkerError>
    where
        F: FnOnce(SocketAddr) -> io::Result<()> + Send,
    {
        tokio::select! {
            res = self.stack.connect_database(&self.cfg) => res?,
            () = self.shutdown.cancelled() => {
                tracing::info!("shutdown requested before the database was reachable");
                return Ok(());
            }
        }

        let addr = self.cfg.addr();
        let listener = bind_shared(addr).map_err(|source| WorkerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let local = listener.local_addr().map_err(WorkerError::Serve)?;
        ready(local).map_err(WorkerError::Serve)?;
        tracing::info!(addr = %local, "worker listening");

        let app = self
            .stack
            .router()
            .layer(TimeoutLayer::new(self.cfg.request_timeout))
            .layer(TraceLayer::new_for_http());

        let token = self.shutdown.clone();
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .into_future();
        tokio::pin!(server);

        tokio::select! {
            res = &mut server => {
                res.map_err(WorkerError::Serve)?;
                tracing::info!("worker drained");
                return Ok(());
            }
            () = self.shutdown.cancelled() => {}
        }

        // Connections that never complete a request are not covered by the
        // timeout layer; the drain itself gets the same bound.
        match tokio::time::timeout(self.cfg.request_timeout, &mut server).await {
            Ok(res) => {
                res.map_err(WorkerError::Serve)?;
                tracing::info!("worker drained");
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.cfg.request_timeout.as_millis() as u64,
                    "drain timed out, abandoning open connections"
                );
            }
        }
        Ok(())
    }
}

/// Cancels `token` on the first termination signal.
fn watch_signals(token: CancellationToken) -> io::Result<()> {
    spawn_signal_watch(subscribe()?, token);
    Ok(())
}

/// The watcher runs inside the caller's span, so its records keep the worker identity.
fn spawn_signal_watch(
    mut signals: mpsc::Receiver<TermSignal>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            if let Some(sig) = signals.recv().await {
                tracing::info!(signal = sig.as_str(), "draining");
                token.cancel();
            }
        }
        .in_current_span(),
    )
}

fn announce_ready(_: SocketAddr) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{READY_LINE}")?;
    out.flush()
}
