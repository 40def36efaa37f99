//! # Event subscribers for the scheduler runtime.
//!
//! This module provides the [`Subscribe`] trait and the non-blocking fan-out
//! machinery that delivers [`TaskEvent`](crate::events::TaskEvent)s broadcast
//! through the [`Bus`](crate::events::Bus) to registered listeners.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Executor ── publish(TaskEvent) ──► Bus ──► fan-out listener
//!                                               │
//!                                               ▼
//!                                         SubscriberSet
//!                                     ┌────────┼─────────┐
//!                                     ▼        ▼         ▼
//!                                 LogWriter  Metrics   Custom ...
//! ```
//!
//! ## Rules
//! - Fan-out is fire-and-forget: each subscriber has its own bounded queue
//!   and worker; a slow or panicking subscriber never reaches the executor.
//! - Subscribers are registered process-wide at build time
//!   ([`SchedulerBuilder::with_subscribers`](crate::SchedulerBuilder::with_subscribers)).
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use async_trait::async_trait;
//! use runpool::{EventKind, Subscribe, TaskEvent};
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, event: &TaskEvent) {
//!         if event.kind == EventKind::Failed {
//!             // increment failure counter
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "failure-counter"
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
