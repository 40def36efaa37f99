//! # Error types used by the scheduler and the engine seam.
//!
//! This module defines two main error enums:
//!
//! - [`SchedulerError`] errors raised at the scheduler boundary (bad arguments,
//!   state conflicts, missing modules, disposal).
//! - [`ExecError`] errors raised by the script engine while a worker context
//!   runs a task.
//!
//! Both types provide `as_label` helpers for logs and metrics.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::contracts::ModuleCheck;

/// # Errors produced at the scheduler boundary.
///
/// These represent rejected operations, not task failures: a task that blows up
/// inside the engine transitions to `Failed` and surfaces through events and
/// the error stream instead.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Caller-supplied value is out of range or malformed.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the input.
        reason: String,
    },

    /// Referenced pool does not exist.
    #[error("pool '{name}' not found")]
    PoolNotFound {
        /// The missing pool name (normalized lowercase).
        name: String,
    },

    /// Operation requires an idle pool, but tasks are active.
    #[error("tasks are active in pool '{name}' ({active} running or queued); stop them or wait for completion first")]
    PoolBusy {
        /// The busy pool.
        name: String,
        /// Number of tasks in a non-terminal state.
        active: usize,
    },

    /// The default pool cannot be removed.
    #[error("the 'default' pool cannot be removed")]
    DefaultPoolProtected,

    /// Attempted to remove a task that has not reached a terminal state.
    #[error("task '{id}' is still active; stop it and wait for completion before removing")]
    JobActive {
        /// The active task id.
        id: Uuid,
    },

    /// One or more configured modules failed the availability probe.
    ///
    /// Carries the full probe result per missing module so callers can print
    /// each diagnostic alongside the search path that was consulted.
    #[error("{} module(s) unavailable: {}; module search path: {search_path}", .missing.len(), format_missing(.missing))]
    MissingModules {
        /// Probe results for every module that was not found.
        missing: Vec<ModuleCheck>,
        /// Verbatim value of the host's module-search-path variable.
        search_path: String,
    },

    /// Shrinking the admission gate did not complete within the bounded wait.
    #[error("resizing pool '{pool}' timed out after {waited:?}; running tasks did not release in time")]
    ResizeTimedOut {
        /// The pool being resized.
        pool: String,
        /// How long the shrink waited for permits.
        waited: Duration,
    },

    /// Operation attempted after [`Scheduler::shutdown`](crate::Scheduler::shutdown).
    #[error("scheduler has been shut down")]
    Disposed,
}

impl SchedulerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SchedulerError::InvalidArgument { .. } => "invalid_argument",
            SchedulerError::PoolNotFound { .. } => "pool_not_found",
            SchedulerError::PoolBusy { .. } => "pool_busy",
            SchedulerError::DefaultPoolProtected => "default_pool_protected",
            SchedulerError::JobActive { .. } => "job_active",
            SchedulerError::MissingModules { .. } => "missing_modules",
            SchedulerError::ResizeTimedOut { .. } => "resize_timed_out",
            SchedulerError::Disposed => "disposed",
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        SchedulerError::InvalidArgument {
            reason: reason.into(),
        }
    }
}

fn format_missing(missing: &[ModuleCheck]) -> String {
    missing
        .iter()
        .map(|m| format!("{} ({})", m.name, m.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// # Errors produced by the script engine.
///
/// These cross the [`Engine`](crate::Engine)/[`Worker`](crate::Worker) seam.
/// The executor classifies them into terminal task states: a plain
/// [`ExecError::Script`] becomes `Failed` unless a cancel or deadline fired
/// first, in which case the firing signal wins.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ExecError {
    /// Script execution failed inside the engine.
    #[error("script execution failed: {reason}")]
    Script {
        /// Engine-reported failure text.
        reason: String,
    },

    /// The engine rejected the submission before running anything
    /// (parse error, unusable worker context).
    #[error("submission rejected: {reason}")]
    Submit {
        /// Why the submission was rejected.
        reason: String,
    },

    /// The worker observed its stop signal and exited cooperatively.
    ///
    /// This is **not an error** in the traditional sense; it signals
    /// intentional termination.
    #[error("execution canceled")]
    Canceled,
}

impl ExecError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecError::Script { .. } => "exec_script",
            ExecError::Submit { .. } => "exec_submit",
            ExecError::Canceled => "exec_canceled",
        }
    }

    /// True when the error represents cooperative cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, ExecError::Canceled)
    }
}
