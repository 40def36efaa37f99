//! # Lifecycle events emitted for submitted tasks.
//!
//! The [`EventKind`] enum mirrors the task state machine plus the two
//! submission-side kinds (`Created`, `Scheduled`) and the stream-side
//! `Progress`. The [`TaskEvent`] struct carries the task handle itself so
//! subscribers can inspect status, buffers, and timestamps without a lookup.
//!
//! ## Ordering guarantees
//! For a single task, `Created` precedes every other event, and the terminal
//! event is published exactly once. Across tasks no ordering is guaranteed;
//! within one subscriber, delivery is FIFO per its queue.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::jobs::{Job, JobStatus, ProgressRecord};

/// Classification of task lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Task registered with its pool.
    Created,
    /// Executor accepted the task for queueing.
    Scheduled,
    /// Admission acquired; execution began.
    Started,
    /// A progress record was captured.
    Progress,
    /// Engine returned without error.
    Completed,
    /// Engine error with no overriding signal.
    Failed,
    /// Stop request won.
    Cancelled,
    /// Deadline won.
    TimedOut,
}

impl EventKind {
    /// True for the four terminal kinds.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EventKind::Completed | EventKind::Failed | EventKind::Cancelled | EventKind::TimedOut
        )
    }

    /// Returns a short stable label (snake_case) for logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Scheduled => "scheduled",
            EventKind::Started => "started",
            EventKind::Progress => "progress",
            EventKind::Completed => "completed",
            EventKind::Failed => "failed",
            EventKind::Cancelled => "cancelled",
            EventKind::TimedOut => "timed_out",
        }
    }

    /// Maps a terminal task status to its event kind.
    pub(crate) fn from_terminal(status: JobStatus) -> EventKind {
        match status {
            JobStatus::Completed => EventKind::Completed,
            JobStatus::Failed => EventKind::Failed,
            JobStatus::Cancelled => EventKind::Cancelled,
            JobStatus::TimedOut => EventKind::TimedOut,
            // Non-terminal statuses never reach this mapping.
            JobStatus::Created | JobStatus::Scheduled | JobStatus::Running => {
                unreachable!("terminal event requested for non-terminal status")
            }
        }
    }
}

/// One lifecycle event, carrying the task handle and optional progress payload.
#[derive(Clone)]
pub struct TaskEvent {
    /// The task this event belongs to.
    pub job: Arc<Job>,
    /// The kind of event.
    pub kind: EventKind,
    /// Progress payload; set only for [`EventKind::Progress`].
    pub progress: Option<ProgressRecord>,
    /// Wall-clock publication timestamp (UTC).
    pub at: DateTime<Utc>,
}

impl TaskEvent {
    /// Creates a new event of the given kind stamped with the current time.
    pub fn now(kind: EventKind, job: Arc<Job>) -> Self {
        Self {
            job,
            kind,
            progress: None,
            at: Utc::now(),
        }
    }

    /// Attaches a progress payload.
    pub fn with_progress(mut self, record: ProgressRecord) -> Self {
        self.progress = Some(record);
        self
    }
}
