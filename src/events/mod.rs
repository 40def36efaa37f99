//! Lifecycle events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to lifecycle events emitted by the scheduler façade,
//! the per-task executor, and the stream sink.
//!
//! ## Contents
//! - [`EventKind`], [`TaskEvent`] event classification and payload
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Scheduler::start` (`Created`), the executor
//!   (`Scheduled`/`Started`/terminal kinds), `StreamSink` (`Progress`).
//! - **Consumers**: the fan-out listener (forwards to `SubscriberSet`) and
//!   any caller holding a receiver from `Scheduler::subscribe`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{EventKind, TaskEvent};
