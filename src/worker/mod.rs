//! Worker side: the process the supervisor spawns.
//!
//! ## Contents
//! - [`WorkerRuntime`] bind, report readiness, serve, drain on signal
//! - [`RequestStack`] / [`DefaultStack`] the application collaborator
//! - [`bind_shared`] the `SO_REUSEPORT` listener shared by the fleet

mod listener;
mod runtime;
mod stack;

pub use listener::bind_shared;
pub use runtime::WorkerRuntime;
pub use stack::{DefaultStack, RequestStack, database_hosts};
