//! Restart and pacing policies.
//!
//! This module groups the knobs that control **if** a crashed worker is replaced
//! and **how long** the supervisor waits before doing so.
//!
//! ## Contents
//! - [`RestartPolicy`] whether an exit gets a replacement (never / on-failure)
//! - [`BackoffPolicy`] delay before a replacement (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy for those delays
//!
//! ## Quick wiring
//! ```text
//! worker exit ──► RestartPolicy::decide(exit, mode)
//!                   ├─ Restart       ─► BackoffPolicy::next(streak) ─► spawn replacement
//!                   └─ DoNotRestart  ─► slot stays empty
//! ```
//!
//! ## Defaults
//! - `RestartPolicy::OnFailure`.
//! - `BackoffPolicy::immediate()`: zero delay, no cap on how often a slot is refilled.

mod backoff;
mod jitter;
mod restart;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use restart::{RestartDecision, RestartPolicy, SkipReason, SupervisorMode};
