//! # Termination signal subscription.
//!
//! [`subscribe`] installs the OS handlers and forwards every recognized signal
//! as a [`TermSignal`] message to the supervisor control loop.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes)
//! - `SIGQUIT` (quit signal)
//!
//! **Windows platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`]
//!
//! All of them trigger the same shutdown. Handlers stay installed for the
//! lifetime of the forwarding task, so a second signal is delivered as another
//! message instead of killing the process.

use std::io;

use tokio::sync::mpsc;

/// A recognized termination signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermSignal {
    /// `SIGINT` / Ctrl-C.
    Interrupt,
    /// `SIGTERM`.
    Terminate,
    /// `SIGQUIT`.
    Quit,
}

impl TermSignal {
    /// Conventional signal name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TermSignal::Interrupt => "SIGINT",
            TermSignal::Terminate => "SIGTERM",
            TermSignal::Quit => "SIGQUIT",
        }
    }
}

/// Installs termination signal handlers and returns the channel they feed.
///
/// Returns `Err` if signal registration fails. Must be called inside a tokio runtime.
#[cfg(unix)]
pub fn subscribe() -> io::Result<mpsc::Receiver<TermSignal>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        loop {
            let sig = tokio::select! {
                Some(()) = sigint.recv()  => TermSignal::Interrupt,
                Some(()) = sigterm.recv() => TermSignal::Terminate,
                Some(()) = sigquit.recv() => TermSignal::Quit,
                else => break,
            };
            if tx.send(sig).await.is_err() {
                break;
            }
        }
    });
    Ok(rx)
}

/// Installs termination signal handlers and returns the channel they feed.
#[cfg(not(unix))]
pub fn subscribe() -> io::Result<mpsc::Receiver<TermSignal>> {
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(TermSignal::Interrupt).await.is_err() {
                break;
            }
        }
    });
    Ok(rx)
}

/// Human-readable name for a raw signal number.
#[cfg(unix)]
pub fn signal_name(sig: i32) -> &'static str {
    nix::sys::signal::Signal::try_from(sig)
        .map(|s| s.as_str())
        .unwrap_or("unknown")
}

/// Human-readable name for a raw signal number.
#[cfg(not(unix))]
pub fn signal_name(_sig: i32) -> &'static str {
    "unknown"
}
