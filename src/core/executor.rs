//! # Per-task run loop.
//!
//! [`run_job`] drives one submitted task from `Scheduled` to a terminal
//! state, publishing the matching lifecycle event at every transition.
//!
//! ## Flow
//! ```text
//! mark Scheduled ─► await admission gate ──(cancel fired)──► Cancelled
//!        │
//!        ▼
//! mark Running ─► lend worker ─► [one-shot init, first lend only]
//!        │
//!        ▼
//! run script with composed stop signal
//!        │
//!        ▼
//! classify:
//!   no signal, Ok        → Completed
//!   no signal, Err       → Failed      (reason captured + error stream)
//!   cancel fired first   → Cancelled   (engine result absorbed)
//!   deadline fired first → TimedOut    (engine error kept as diagnostic)
//!        │
//!        ▼
//! release worker + admission permit on every exit path
//! ```
//!
//! ## Rules
//! - The deadline is measured from the `Running` transition, not submission.
//! - Whichever of {user cancel, deadline} fires **first** fixes the
//!   classification. "First" is decided by comparing the recorded cancel
//!   firing instant against the deadline instant, never by which select
//!   branch happened to wake first.
//! - The `Scheduled → Running` transition goes through the pool lock, so a
//!   session rebuild can never interleave between its idle check and its
//!   template swap.
//! - Cancellation is cooperative: the terminal state is entered only after
//!   the engine actually returns.
//! - The admission permit is an owned RAII guard; it is released on every
//!   exit path.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::engine::{StreamSink, Worker};
use crate::error::ExecError;
use crate::events::{Bus, EventKind, TaskEvent};
use crate::jobs::{Job, JobStatus};
use crate::pool::Pool;

/// Which signal fired first and therefore owns the classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopCause {
    Cancel,
    Deadline,
}

/// Sentinel wake-up for tasks without a deadline.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365);

/// Drives one task to completion. Spawned by [`Scheduler::start`](crate::Scheduler::start).
pub(crate) async fn run_job(job: Arc<Job>, pool: Arc<Pool>, bus: Bus) {
    if job.mark_scheduled() {
        bus.publish(TaskEvent::now(EventKind::Scheduled, Arc::clone(&job)));
    }

    // Admission. A stop request that fired at any point up to here wins
    // before any worker is touched; a closed gate means the pool is being
    // disposed, which cancels the task the same way.
    let permit = tokio::select! {
        res = pool.gate().acquire_owned() => match res {
            Ok(permit) => permit,
            Err(_closed) => {
                settle(&job, &bus, JobStatus::Cancelled, None);
                return;
            }
        },
        _ = job.cancel_token().cancelled() => {
            settle(&job, &bus, JobStatus::Cancelled, None);
            return;
        }
    };
    if job.cancel_token().is_cancelled() {
        settle(&job, &bus, JobStatus::Cancelled, None);
        return;
    }

    if !pool.admit(&job).await {
        return;
    }
    bus.publish(TaskEvent::now(EventKind::Started, Arc::clone(&job)));

    let deadline = job.deadline().map(|d| Instant::now() + d);

    let mut slot = match pool.lend().await {
        Ok(slot) => slot,
        Err(e) => {
            settle(&job, &bus, JobStatus::Failed, Some(e.to_string()));
            return;
        }
    };

    let sink = StreamSink::new(Arc::clone(&job), bus.clone());
    let stop = CancellationToken::new();
    let mut cause: Option<StopCause> = None;

    // One-shot init: runs at most once per worker, before the first task
    // script that worker executes. The flag lives on the bank slot and
    // survives across tasks dispatched to the same worker.
    if !slot.init_ran {
        if let Some(init) = slot.template.init_script().map(str::to_string) {
            let res = drive(&mut slot.worker, &init, &[], &sink, &job, deadline, &stop, &mut cause).await;
            let init_ok = res.is_ok();
            if init_ok {
                slot.init_ran = true;
            }
            if cause.is_some() || !init_ok {
                let (status, failure) = classify(cause, res);
                settle(&job, &bus, status, failure);
                if init_ok {
                    // The worker initialized fine; the task just lost to a
                    // signal. Keep the context for reuse.
                    pool.release(slot).await;
                }
                drop(permit);
                return;
            }
        } else {
            slot.init_ran = true;
        }
    }

    let res = drive(
        &mut slot.worker,
        job.script(),
        job.args(),
        &sink,
        &job,
        deadline,
        &stop,
        &mut cause,
    )
    .await;

    let (status, failure) = classify(cause, res);
    settle(&job, &bus, status, failure);

    pool.release(slot).await;
    drop(permit);
}

/// Runs one engine invocation while watching the task's cancel token and the
/// optional deadline. The first signal to fire records itself in `cause` and
/// cancels the worker's stop token; the invocation is then awaited to its
/// cooperative end.
///
/// Either signal branch may wake first under scheduler delay, so neither is
/// trusted to name the cause: both defer to [`decide`], which compares the
/// recorded firing instants.
#[allow(clippy::too_many_arguments)]
async fn drive(
    worker: &mut Box<dyn Worker>,
    script: &str,
    args: &[serde_json::Value],
    sink: &StreamSink,
    job: &Job,
    deadline: Option<Instant>,
    stop: &CancellationToken,
    cause: &mut Option<StopCause>,
) -> Result<(), ExecError> {
    let wake = deadline.unwrap_or_else(|| Instant::now() + FAR_FUTURE);
    let mut run = worker.run(script, args, sink, stop.child_token());

    loop {
        tokio::select! {
            res = &mut run => break res,
            _ = time::sleep_until(wake), if cause.is_none() && deadline.is_some() => {
                *cause = Some(decide(job, wake));
                stop.cancel();
            }
            _ = job.cancel_token().cancelled(), if cause.is_none() => {
                *cause = Some(decide(job, wake));
                stop.cancel();
            }
        }
    }
}

/// Names the signal that actually fired first.
///
/// The cancel wins iff its recorded firing instant precedes the deadline
/// instant; otherwise the deadline wins. Poll position carries no weight: a
/// late-polled loop that finds both signals ready still classifies by the
/// instants, and a cancel branch that wakes after the deadline elapsed loses
/// to it.
fn decide(job: &Job, wake: Instant) -> StopCause {
    match job.cancel_requested_at() {
        Some(fired) if fired < wake => StopCause::Cancel,
        _ => StopCause::Deadline,
    }
}

/// Maps the recorded signal (if any) and the engine result to the terminal
/// state and its captured failure text.
fn classify(cause: Option<StopCause>, res: Result<(), ExecError>) -> (JobStatus, Option<String>) {
    match cause {
        // Deadline takes precedence over an engine error it provoked; the
        // error text is kept as a diagnostic only.
        Some(StopCause::Deadline) => (JobStatus::TimedOut, res.err().map(|e| e.to_string())),
        Some(StopCause::Cancel) => (JobStatus::Cancelled, None),
        None => match res {
            Ok(()) => (JobStatus::Completed, None),
            Err(e) => (JobStatus::Failed, Some(e.to_string())),
        },
    }
}

/// Applies the terminal transition and publishes the terminal event exactly
/// once. A `Failed` reason is additionally surfaced on the error stream.
fn settle(job: &Arc<Job>, bus: &Bus, status: JobStatus, failure: Option<String>) {
    if status == JobStatus::Failed {
        if let Some(reason) = &failure {
            job.push_error(reason.clone());
        }
    }
    if job.finish(status, failure) {
        bus.publish(TaskEvent::now(EventKind::from_terminal(status), Arc::clone(job)));
    }
}
