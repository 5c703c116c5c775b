//! Supervisor lifecycle events.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//!
//! ## Quick reference
//! - **Publisher**: the supervisor control loop (one event per lifecycle transition).
//! - **Consumers**: [`SubscriberSet`](crate::SubscriberSet) fans each event out to
//!   the configured subscribers, e.g. [`LogWriter`](crate::LogWriter).

mod event;

pub use event::{Event, EventKind};
