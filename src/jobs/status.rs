//! # Task state machine.
//!
//! States and permitted transitions:
//!
//! ```text
//!               Created ── Scheduled ── Running ──▶ Completed
//!                     └──────────────┐     │   ├──▶ Failed
//!                                    │     ├──▶ Cancelled
//!                                    │     └──▶ TimedOut
//!                    Cancelled ◀─────┘  (pre-start cancellation)
//! ```
//!
//! ## Rules
//! - Terminal states ({Completed, Failed, Cancelled, TimedOut}) are absorbing.
//! - `Created → Cancelled` and `Scheduled → Cancelled` cover stop requests
//!   that fire before the admission gate is acquired.

use serde::Serialize;

/// Lifecycle state of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    /// Registered, executor not yet accepted.
    Created,
    /// Accepted for queueing, waiting on the admission gate.
    Scheduled,
    /// Executing on a worker context.
    Running,
    /// Engine returned without error; no cancel or deadline fired.
    Completed,
    /// Engine error with no overriding signal.
    Failed,
    /// Stop request observed (pre-start or cooperative mid-run).
    Cancelled,
    /// Deadline elapsed before the engine returned.
    TimedOut,
}

impl JobStatus {
    /// True for absorbing states.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::TimedOut
        )
    }

    /// True while the task still occupies (or may occupy) a worker.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Returns a short stable label (snake_case) for logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::Scheduled => "scheduled",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::TimedOut => "timed_out",
        }
    }

    /// Whether moving from `self` to `next` follows a permitted edge.
    pub(crate) fn allows(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Created, Scheduled)
                | (Created, Cancelled)
                | (Scheduled, Running)
                | (Scheduled, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Running, TimedOut)
        )
    }
}
