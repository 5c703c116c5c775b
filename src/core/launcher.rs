//! # Worker process creation and control.
//!
//! The supervisor never touches processes directly; it goes through a
//! [`Launcher`], which creates a worker and returns a [`WorkerHandle`] for it.
//! Lifecycle facts flow back as [`Notice`] messages on a channel that feeds the
//! supervisor's control loop.
//!
//! ## Process launcher
//! ```text
//! ProcessLauncher::launch(id)
//!     └─► Command(current_exe worker ...) ── spawn ──► child (own process group)
//!           └─► watcher task (owns Child):
//!                 ├─ stdout line "ready"   ─► Notice::Ready(id)     (at most once)
//!                 ├─ Control::Terminate    ─► SIGTERM to child pid
//!                 ├─ Control::Kill         ─► Child::start_kill (SIGKILL)
//!                 └─ child.wait()          ─► Notice::Exited(id, status)   (exactly once)
//! ```
//!
//! ## Rules
//! - Only the watcher reaps its child, so a signal is never sent to a recycled pid.
//! - Each launched worker produces exactly one `Exited` notice.
//! - Workers run in their own process group: a terminal Ctrl-C reaches only the
//!   supervisor, which then coordinates the shutdown.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;

use crate::core::registry::{WorkerExit, WorkerId};

/// Line a worker prints on stdout once its listener is bound.
pub const READY_LINE: &str = "ready";

/// Environment variable carrying the worker identity into the child.
pub const WORKER_ID_ENV: &str = "PROCVISOR_WORKER_ID";

/// Lifecycle fact reported to the supervisor control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The worker bound its listener.
    Ready(WorkerId),
    /// The OS reported the worker's exit.
    Exited(WorkerId, WorkerExit),
}

/// Sending half of the notice channel handed to every launched worker.
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl Notifier {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Notice>) -> Self {
        Self { tx }
    }

    /// Reports that `id` is ready.
    pub fn ready(&self, id: WorkerId) {
        let _ = self.tx.send(Notice::Ready(id));
    }

    /// Reports that `id` exited with `exit`.
    pub fn exited(&self, id: WorkerId, exit: WorkerExit) {
        let _ = self.tx.send(Notice::Exited(id, exit));
    }
}

/// Control surface of one launched worker.
pub trait WorkerHandle: Send + Sync {
    /// OS process id, if known.
    fn pid(&self) -> Option<u32>;

    /// Asks the worker to drain and exit.
    fn request_shutdown(&self) -> io::Result<()>;

    /// Terminates the worker immediately.
    fn force_kill(&self) -> io::Result<()>;
}

/// Creates worker processes.
///
/// Implementations must eventually report exactly one [`Notice::Exited`] per
/// successfully launched worker through `notifier`.
pub trait Launcher: Send + Sync + 'static {
    /// Launches worker `id`.
    fn launch(&self, id: WorkerId, notifier: Notifier) -> io::Result<Box<dyn WorkerHandle>>;
}

/// Launches workers as child processes of a given program.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl ProcessLauncher {
    /// Launcher running `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    /// Launcher re-executing the current binary.
    pub fn current_exe() -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Appends a command-line argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several command-line arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable for every worker.
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    fn command(&self, id: WorkerId) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .env(WORKER_ID_ENV, id.get().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, id: WorkerId, notifier: Notifier) -> io::Result<Box<dyn WorkerHandle>> {
        let mut child = self.command(id).spawn()?;
        let pid = child.id();
        let stdout = child.stdout.take();
        let (control, rx) = mpsc::unbounded_channel();

        tokio::spawn(watch(id, child, stdout, rx, notifier));

        Ok(Box::new(ProcessHandle { pid, control }))
    }
}

#[derive(Debug, Clone, Copy)]
enum Control {
    Terminate,
    Kill,
}

struct ProcessHandle {
    pid: Option<u32>,
    control: mpsc::UnboundedSender<Control>,
}

impl ProcessHandle {
    fn send(&self, cmd: Control) -> io::Result<()> {
        self.control
            .send(cmd)
            .map_err(|_| io::Error::new(io::ErrorKind::NotConnected, "worker already reaped"))
    }
}

impl WorkerHandle for ProcessHandle {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn request_shutdown(&self) -> io::Result<()> {
        self.send(Control::Terminate)
    }

    fn force_kill(&self) -> io::Result<()> {
        self.send(Control::Kill)
    }
}

/// Owns the child until it is reaped; see module docs.
async fn watch(
    id: WorkerId,
    mut child: Child,
    stdout: Option<ChildStdout>,
    mut control: mpsc::UnboundedReceiver<Control>,
    notifier: Notifier,
) {
    let mut lines = stdout.map(|s| BufReader::new(s).lines());
    let mut ready = false;

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(cmd) = control.recv() => match cmd {
                Control::Terminate => {
                    if let Err(e) = terminate(&mut child) {
                        tracing::debug!(worker = id.get(), error = %e, "failed to deliver SIGTERM");
                    }
                }
                Control::Kill => {
                    if let Err(e) = child.start_kill() {
                        tracing::debug!(worker = id.get(), error = %e, "failed to kill worker");
                    }
                }
            },
            line = next_line(&mut lines) => match line {
                Ok(Some(l)) => {
                    if !ready && l.trim() == READY_LINE {
                        ready = true;
                        notifier.ready(id);
                    }
                }
                Ok(None) | Err(_) => lines = None,
            },
        }
    };

    let exit = match status {
        Ok(s) => WorkerExit::from(s),
        Err(e) => {
            tracing::warn!(worker = id.get(), error = %e, "failed to wait for worker");
            WorkerExit::unknown()
        }
    };
    notifier.exited(id, exit);
}

async fn next_line(lines: &mut Option<Lines<BufReader<ChildStdout>>>) -> io::Result<Option<String>> {
    match lines {
        Some(l) => l.next_line().await,
        None => std::future::pending().await,
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) -> io::Result<()> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let pid = child
        .id()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "worker already reaped"))?;
    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}
