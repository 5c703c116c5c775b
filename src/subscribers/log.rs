//! # LogWriter: structured lifecycle records
//!
//! Turns each [`Event`] into one `tracing` record under the `procvisor` target.
//! Every record carries the event kind and sequence number; worker events also
//! carry `worker` and `pid`, exits carry `code`/`signal`.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO procvisor: worker spawned kind="worker_spawned" seq=0 worker=1 pid=4711
//! INFO procvisor: worker ready kind="worker_ready" seq=4 worker=1 pid=4711
//! WARN procvisor: worker exited kind="worker_exited" seq=9 worker=2 pid=4712 signal="SIGKILL" uptime_ms=81250
//! INFO procvisor: replacement scheduled kind="restart_scheduled" seq=10 worker=2 delay_ms=0 streak=1
//! INFO procvisor: shutdown requested kind="shutdown_requested" seq=14 signal="SIGINT" grace_ms=5000 pending=4
//! INFO procvisor: shutdown request sent kind="shutdown_request_sent" seq=15 worker=1 pid=4711
//! WARN procvisor: grace period elapsed, worker killed kind="worker_force_killed" seq=19 worker=5 pid=4790
//! INFO procvisor: shutdown complete kind="shutdown_complete" seq=20 forced=1 via="deadline"
//! ```

use async_trait::async_trait;

use crate::core::signal_name;
use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber backed by `tracing`.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let kind = e.kind.as_str();
        let seq = e.seq;
        let reason = e.reason.as_deref();

        match e.kind {
            EventKind::WorkerSpawned => {
                tracing::info!(target: "procvisor", kind, seq, worker = e.worker, pid = e.pid, "worker spawned");
            }
            EventKind::WorkerReady => {
                tracing::info!(target: "procvisor", kind, seq, worker = e.worker, pid = e.pid, "worker ready");
            }
            EventKind::WorkerExited => {
                let signal = e.exit_signal.map(signal_name);
                if e.exit_code == Some(0) && e.exit_signal.is_none() {
                    tracing::info!(target: "procvisor", kind, seq, worker = e.worker, pid = e.pid, code = e.exit_code, signal, uptime_ms = e.uptime_ms, reason, "worker exited");
                } else {
                    tracing::warn!(target: "procvisor", kind, seq, worker = e.worker, pid = e.pid, code = e.exit_code, signal, uptime_ms = e.uptime_ms, reason, "worker exited");
                }
            }
            EventKind::WorkerSpawnFailed => {
                tracing::error!(target: "procvisor", kind, seq, worker = e.worker, reason, "failed to spawn worker");
            }
            EventKind::RestartScheduled => {
                tracing::info!(target: "procvisor", kind, seq, worker = e.worker, delay_ms = e.delay_ms, streak = e.attempt, "replacement scheduled");
            }
            EventKind::RestartSkipped => {
                tracing::info!(target: "procvisor", kind, seq, worker = e.worker, dropped = e.attempt, reason, "no replacement");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(target: "procvisor", kind, seq, signal = reason, grace_ms = e.delay_ms, pending = e.attempt, "shutdown requested");
            }
            EventKind::ShutdownSignalIgnored => {
                tracing::debug!(target: "procvisor", kind, seq, signal = reason, "shutdown already in progress, signal ignored");
            }
            EventKind::ShutdownRequestSent => {
                if reason.is_some() {
                    tracing::warn!(target: "procvisor", kind, seq, worker = e.worker, pid = e.pid, reason, "shutdown request not delivered");
                } else {
                    tracing::info!(target: "procvisor", kind, seq, worker = e.worker, pid = e.pid, "shutdown request sent");
                }
            }
            EventKind::WorkerForceKilled => {
                tracing::warn!(target: "procvisor", kind, seq, worker = e.worker, pid = e.pid, "grace period elapsed, worker killed");
            }
            EventKind::ShutdownComplete => {
                tracing::info!(target: "procvisor", kind, seq, forced = e.attempt, via = reason, "shutdown complete");
            }
            EventKind::FleetDrained => {
                tracing::info!(target: "procvisor", kind, seq, "all workers exited, nothing left to supervise");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }

    fn queue_capacity(&self) -> usize {
        4096
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;
    use crate::core::WorkerId;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl Capture {
        fn lines(&self) -> Vec<String> {
            let raw = self.0.lock().unwrap().clone();
            String::from_utf8_lossy(&raw).lines().map(str::to_owned).collect()
        }
    }

    #[tokio::test]
    async fn shutdown_fan_out_is_visible_at_info() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let writer = LogWriter::new();
        writer
            .on_event(
                &Event::new(EventKind::ShutdownRequestSent)
                    .with_worker(WorkerId::new(1))
                    .with_pid(Some(4711)),
            )
            .await;
        writer
            .on_event(
                &Event::new(EventKind::ShutdownRequestSent)
                    .with_worker(WorkerId::new(2))
                    .with_reason("ESRCH: No such process"),
            )
            .await;

        let lines = capture.lines();
        assert!(
            lines
                .iter()
                .any(|l| l.contains("INFO") && l.contains("shutdown request sent")),
            "{lines:?}"
        );
        assert!(
            lines
                .iter()
                .any(|l| l.contains("WARN") && l.contains("shutdown request not delivered")),
            "{lines:?}"
        );
    }

    #[tokio::test]
    async fn exit_record_carries_uptime() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        LogWriter::new()
            .on_event(
                &Event::new(EventKind::WorkerExited)
                    .with_worker(WorkerId::new(3))
                    .with_exit(&crate::core::WorkerExit::code(1))
                    .with_uptime(std::time::Duration::from_millis(1500)),
            )
            .await;

        let lines = capture.lines();
        assert!(lines.iter().any(|l| l.contains("uptime_ms=1500")), "{lines:?}");
    }
}
