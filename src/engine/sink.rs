//! # Stream capture between a worker and its task.
//!
//! [`StreamSink`] is the write side the engine sees while running one task:
//! output and error items land in the task's drainable buffers, progress
//! records additionally overwrite the task's `last_progress` and publish a
//! `Progress` event on the bus.
//!
//! ## Rules
//! - Appends are non-blocking; buffers are unbounded.
//! - One sink is wired per task execution and must not outlive it.

use std::sync::Arc;

use serde_json::Value;

use crate::events::{Bus, EventKind, TaskEvent};
use crate::jobs::{Job, ProgressRecord};

/// Engine-facing writer for one task's captured streams.
#[derive(Clone)]
pub struct StreamSink {
    job: Arc<Job>,
    bus: Bus,
}

impl StreamSink {
    pub(crate) fn new(job: Arc<Job>, bus: Bus) -> Self {
        Self { job, bus }
    }

    /// Appends one item to the task's output stream.
    pub fn output(&self, item: Value) {
        self.job.push_output(item);
    }

    /// Appends one line to the task's error stream.
    pub fn error(&self, line: impl Into<String>) {
        self.job.push_error(line.into());
    }

    /// Appends a progress record, retains it as `last_progress`, and
    /// publishes a `Progress` event.
    pub fn progress(&self, record: ProgressRecord) {
        self.job.push_progress(record.clone());
        self.bus.publish(
            TaskEvent::now(EventKind::Progress, Arc::clone(&self.job)).with_progress(record),
        );
    }
}
