//! # The task record.
//!
//! [`Job`] freezes everything the caller submitted (script body, positional
//! arguments, optional deadline) and owns everything that happens afterwards:
//! guarded status transitions, captured streams, the one-shot cancel signal,
//! and an awaitable completion.
//!
//! ## Rules
//! - Submission data never changes after construction.
//! - `started_at` is set at most once and never precedes `created_at`.
//! - `completed_at` is set exactly when a terminal state is entered; a task
//!   reaches a terminal state at most once (the transition that wins reports
//!   `true`, every later attempt reports `false`).
//! - The cancel signal is fired through [`Job::request_stop`], which records
//!   the firing instant; the executor compares that instant against the
//!   deadline to classify the terminal state by actual firing order.

use std::fmt;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{JobStatus, ProgressRecord, StreamBuffer};

/// Mutable half of the record, guarded by one lock.
struct JobState {
    status: JobStatus,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    failure: Option<String>,
    last_progress: Option<ProgressRecord>,
}

/// A submitted unit of work and everything captured while it runs.
///
/// Handed out as `Arc<Job>`; every accessor is safe to call from any thread
/// at any point in the lifecycle.
pub struct Job {
    id: Uuid,
    name: Option<String>,
    pool: String,
    script: String,
    args: Vec<Value>,
    deadline: Option<Duration>,
    created_at: DateTime<Utc>,

    state: Mutex<JobState>,

    output: StreamBuffer<Value>,
    errors: StreamBuffer<String>,
    progress: StreamBuffer<ProgressRecord>,

    cancel: CancellationToken,
    cancel_requested_at: OnceLock<Instant>,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl Job {
    /// Creates a record in the `Created` state.
    ///
    /// `name` is trimmed; an empty label becomes `None`. `pool` must already
    /// be normalized by the caller.
    pub(crate) fn new(
        pool: String,
        script: String,
        args: Vec<Value>,
        deadline: Option<Duration>,
        name: Option<String>,
    ) -> Self {
        let (done_tx, done_rx) = watch::channel(false);
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Self {
            id: Uuid::new_v4(),
            name,
            pool,
            script,
            args,
            deadline,
            created_at: Utc::now(),
            state: Mutex::new(JobState {
                status: JobStatus::Created,
                started_at: None,
                completed_at: None,
                failure: None,
                last_progress: None,
            }),
            output: StreamBuffer::new(),
            errors: StreamBuffer::new(),
            progress: StreamBuffer::new(),
            cancel: CancellationToken::new(),
            cancel_requested_at: OnceLock::new(),
            done_tx,
            done_rx,
        }
    }

    // ---------------------------
    // Frozen submission data
    // ---------------------------

    /// Process-unique identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Optional short label; never used for lookup.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The pool this task is bound to (lowercase, immutable).
    pub fn pool(&self) -> &str {
        &self.pool
    }

    /// The script body as submitted.
    pub fn script(&self) -> &str {
        &self.script
    }

    /// Positional arguments, in submission order.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Optional timeout, measured from the moment execution begins.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Submission timestamp (UTC).
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // ---------------------------
    // Observable state
    // ---------------------------

    /// Current lifecycle state.
    pub fn status(&self) -> JobStatus {
        self.state.lock().expect("job state poisoned").status
    }

    /// When execution began, if it has.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().expect("job state poisoned").started_at
    }

    /// When a terminal state was entered, if one has been.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().expect("job state poisoned").completed_at
    }

    /// Wall-clock execution time, once both endpoints exist.
    pub fn duration(&self) -> Option<Duration> {
        let guard = self.state.lock().expect("job state poisoned");
        match (guard.started_at, guard.completed_at) {
            (Some(s), Some(c)) => (c - s).to_std().ok(),
            _ => None,
        }
    }

    /// Failure text captured for `Failed` (and diagnostically for `TimedOut`).
    pub fn failure(&self) -> Option<String> {
        self.state.lock().expect("job state poisoned").failure.clone()
    }

    /// The most recent progress record, if any was observed.
    pub fn last_progress(&self) -> Option<ProgressRecord> {
        self.state
            .lock()
            .expect("job state poisoned")
            .last_progress
            .clone()
    }

    /// True while the task has not reached a terminal state.
    pub fn is_active(&self) -> bool {
        self.status().is_active()
    }

    // ---------------------------
    // Streams
    // ---------------------------

    /// Ordered snapshot of the output stream; drains when `keep` is false.
    pub fn receive_output(&self, keep: bool) -> Vec<Value> {
        self.output.receive(keep)
    }

    /// Ordered snapshot of the error stream; drains when `keep` is false.
    pub fn receive_errors(&self, keep: bool) -> Vec<String> {
        self.errors.receive(keep)
    }

    /// Ordered snapshot of the progress stream; drains when `keep` is false.
    pub fn receive_progress(&self, keep: bool) -> Vec<ProgressRecord> {
        self.progress.receive(keep)
    }

    pub(crate) fn push_output(&self, item: Value) {
        self.output.push(item);
    }

    pub(crate) fn push_error(&self, line: String) {
        self.errors.push(line);
    }

    /// Appends a progress record and retains it as `last_progress`.
    pub(crate) fn push_progress(&self, record: ProgressRecord) {
        self.progress.push(record.clone());
        self.state
            .lock()
            .expect("job state poisoned")
            .last_progress = Some(record);
    }

    // ---------------------------
    // Cancellation & completion
    // ---------------------------

    /// The one-shot trigger that requests cooperative engine stop.
    ///
    /// Fire it through [`Job::request_stop`] so the firing instant is
    /// recorded; the token itself is only for waiting on.
    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fires the cancel signal, recording when it was requested.
    ///
    /// The recorded instant is what the executor compares against the
    /// deadline: the cancel wins iff it fired before the deadline elapsed.
    /// Only the first call records; the signal is one-shot.
    pub(crate) fn request_stop(&self) {
        let _ = self.cancel_requested_at.set(Instant::now());
        self.cancel.cancel();
    }

    /// When the cancel signal was fired, if it has been.
    pub(crate) fn cancel_requested_at(&self) -> Option<Instant> {
        self.cancel_requested_at.get().copied()
    }

    /// Waits until the task reaches a terminal state.
    ///
    /// Returns `true` once terminal; `false` when the optional timeout elapses
    /// first (the task is left untouched either way).
    pub async fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut rx = self.done_rx.clone();
        let done = async move { rx.wait_for(|done| *done).await.is_ok() };
        match timeout {
            Some(limit) => tokio::time::timeout(limit, done).await.unwrap_or(false),
            None => done.await,
        }
    }

    // ---------------------------
    // Transitions (crate-internal)
    // ---------------------------

    /// `Created → Scheduled`. Returns whether the transition applied.
    pub(crate) fn mark_scheduled(&self) -> bool {
        let mut guard = self.state.lock().expect("job state poisoned");
        if !guard.status.allows(JobStatus::Scheduled) {
            return false;
        }
        guard.status = JobStatus::Scheduled;
        true
    }

    /// `Scheduled → Running`; stamps `started_at` exactly once.
    pub(crate) fn mark_running(&self) -> bool {
        let mut guard = self.state.lock().expect("job state poisoned");
        if !guard.status.allows(JobStatus::Running) {
            return false;
        }
        guard.status = JobStatus::Running;
        let now = Utc::now();
        guard.started_at = Some(now.max(self.created_at));
        true
    }

    /// Moves into a terminal state, stamping `completed_at` and waking waiters.
    ///
    /// Returns `true` only for the transition that actually lands, so the
    /// caller can publish exactly one terminal event per task.
    pub(crate) fn finish(&self, terminal: JobStatus, failure: Option<String>) -> bool {
        debug_assert!(terminal.is_terminal());
        let applied = {
            let mut guard = self.state.lock().expect("job state poisoned");
            if !guard.status.allows(terminal) {
                false
            } else {
                guard.status = terminal;
                guard.completed_at = Some(Utc::now());
                guard.failure = failure;
                true
            }
        };
        if applied {
            self.done_tx.send_replace(true);
        }
        applied
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("pool", &self.pool)
            .field("status", &self.status())
            .finish()
    }
}
