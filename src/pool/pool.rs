//! # Pool: worker bank + admission gate + task index.
//!
//! One [`Pool`] owns:
//! - the **admission gate**, a counting semaphore sized `max_workers` that
//!   bounds concurrently Running tasks;
//! - the **worker bank**, idle reusable worker contexts materialized from the
//!   current [`WorkerTemplate`], each remembering whether its one-shot init
//!   already ran;
//! - the **task index**, every task submitted to this pool and not yet
//!   evicted by retention or removal.
//!
//! ## Rules
//! - Workers are checked out to exactly one task at a time; they are returned
//!   to the bank only if they still match the current template (a rebuild
//!   strands checked-out workers, which are dropped on release).
//! - Workers are provisioned lazily on first lend; the bank keeps at most
//!   `max_workers` idle contexts.
//! - The `Scheduled → Running` transition ([`Pool::admit`]) and the session
//!   rebuild share the pool lock, so an idle check can never go stale before
//!   the template swap commits.
//! - Gate resize happens **before** the recorded limits change; a shrink
//!   waits for running tasks with a bounded timeout.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, Semaphore};
use uuid::Uuid;

use crate::config::Config;
use crate::contracts::{PoolInfo, SchedulerSettings};
use crate::engine::{EngineRef, Worker};
use crate::error::{ExecError, SchedulerError};
use crate::jobs::Job;

use super::session::{SessionState, SessionUpdate};
use super::template::WorkerTemplate;

/// A checked-out worker context plus its reuse bookkeeping.
pub(crate) struct WorkerSlot {
    /// The engine context itself.
    pub(crate) worker: Box<dyn Worker>,
    /// Whether the template's one-shot init already ran on this worker.
    pub(crate) init_ran: bool,
    /// The template this worker was materialized from.
    pub(crate) template: Arc<WorkerTemplate>,
}

/// Creation-time overrides; absent fields fall back to [`Config`] defaults.
#[derive(Debug, Clone, Default)]
pub(crate) struct PoolOptions {
    pub(crate) min_workers: Option<usize>,
    pub(crate) max_workers: Option<usize>,
    pub(crate) retention: Option<Duration>,
    pub(crate) session: SessionUpdate,
}

/// Mutable pool state behind one lock.
struct PoolInner {
    min_workers: usize,
    max_workers: usize,
    retention: Duration,
    session: SessionState,
    template: Arc<WorkerTemplate>,
    bank: Vec<WorkerSlot>,
}

/// A named execution pool.
pub(crate) struct Pool {
    name: String,
    engine: EngineRef,
    gate: Arc<Semaphore>,
    inner: Mutex<PoolInner>,
    jobs: DashMap<Uuid, Arc<Job>>,
}

impl Pool {
    /// Creates a pool with the given overrides.
    ///
    /// Probes every configured module (no pool exists on failure). `name`
    /// must already be normalized to lowercase.
    pub(crate) fn create(
        name: String,
        engine: EngineRef,
        opts: PoolOptions,
        cfg: &Config,
    ) -> Result<Arc<Self>, SchedulerError> {
        let min = opts.min_workers.unwrap_or(cfg.default_min_workers);
        let max = opts
            .max_workers
            .unwrap_or_else(|| cfg.default_max_workers.max(min));
        validate_limits(min, max)?;

        let session = SessionState::default().apply(opts.session);
        let template = Arc::new(WorkerTemplate::build(engine.as_ref(), &session)?);

        Ok(Arc::new(Self {
            name,
            engine,
            gate: Arc::new(Semaphore::new(max)),
            inner: Mutex::new(PoolInner {
                min_workers: min,
                max_workers: max,
                retention: opts.retention.unwrap_or(cfg.default_retention),
                session,
                template,
                bank: Vec::new(),
            }),
            jobs: DashMap::new(),
        }))
    }

    /// Pool name (lowercase).
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// The admission gate bounding concurrently Running tasks.
    pub(crate) fn gate(&self) -> Arc<Semaphore> {
        Arc::clone(&self.gate)
    }

    // ---------------------------
    // Worker bank
    // ---------------------------

    /// Checks out a worker context: idle one from the bank, or a fresh one
    /// materialized from the current template.
    pub(crate) async fn lend(&self) -> Result<WorkerSlot, ExecError> {
        let template = {
            let mut inner = self.inner.lock().await;
            if let Some(slot) = inner.bank.pop() {
                return Ok(slot);
            }
            Arc::clone(&inner.template)
        };

        let worker = self.engine.create_worker(&template).await?;
        Ok(WorkerSlot {
            worker,
            init_ran: false,
            template,
        })
    }

    /// Returns a worker to the bank.
    ///
    /// Workers built from a superseded template, and surplus workers beyond
    /// `max_workers`, are dropped instead.
    pub(crate) async fn release(&self, slot: WorkerSlot) {
        let mut inner = self.inner.lock().await;
        let current = Arc::ptr_eq(&slot.template, &inner.template);
        if current && inner.bank.len() < inner.max_workers {
            inner.bank.push(slot);
        }
    }

    /// Moves a task into the `Running` state under the pool lock.
    ///
    /// `rebuild` holds the same lock across its idle check and template swap,
    /// so a task can never slip from `Scheduled` into `Running` between the
    /// two; it either runs before the check (and the rebuild is rejected) or
    /// after the swap (and lends a worker from the new bank).
    pub(crate) async fn admit(&self, job: &Job) -> bool {
        let _inner = self.inner.lock().await;
        job.mark_running()
    }

    // ---------------------------
    // Task index
    // ---------------------------

    pub(crate) fn register(&self, job: Arc<Job>) {
        self.jobs.insert(job.id(), job);
    }

    pub(crate) fn get(&self, id: Uuid) -> Option<Arc<Job>> {
        self.jobs.get(&id).map(|e| Arc::clone(e.value()))
    }

    /// Removes one task from the index, returning it if present.
    pub(crate) fn evict(&self, id: Uuid) -> Option<Arc<Job>> {
        self.jobs.remove(&id).map(|(_, job)| job)
    }

    /// Unordered snapshot of every indexed task.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Job>> {
        self.jobs.iter().map(|e| Arc::clone(e.value())).collect()
    }

    /// Number of indexed tasks in a non-terminal state.
    pub(crate) fn active_count(&self) -> usize {
        self.jobs.iter().filter(|e| e.value().is_active()).count()
    }

    /// Fires the cancel signal of every active task.
    pub(crate) fn cancel_active(&self) {
        for entry in self.jobs.iter() {
            let job = entry.value();
            if job.is_active() {
                job.request_stop();
            }
        }
    }

    /// Evicts terminal tasks whose completion age exceeds the retention.
    ///
    /// Active tasks are never evicted.
    pub(crate) async fn sweep(&self) -> usize {
        let retention = self.inner.lock().await.retention;
        let now = Utc::now();

        let expired: Vec<Uuid> = self
            .jobs
            .iter()
            .filter_map(|entry| {
                let job = entry.value();
                let completed = job.completed_at()?;
                let age = now.signed_duration_since(completed).to_std().ok()?;
                (age >= retention).then(|| job.id())
            })
            .collect();

        for id in &expired {
            self.jobs.remove(id);
        }
        expired.len()
    }

    // ---------------------------
    // Configuration
    // ---------------------------

    /// Applies min/max/retention overrides.
    ///
    /// The admission gate absorbs the size delta first: growth releases
    /// permits immediately, a shrink acquires-and-forgets the delta, waiting
    /// at most `resize_wait` for running tasks to release. Only then are the
    /// recorded limits updated and surplus idle workers dropped.
    pub(crate) async fn configure(
        &self,
        min: Option<usize>,
        max: Option<usize>,
        retention: Option<Duration>,
        resize_wait: Duration,
    ) -> Result<SchedulerSettings, SchedulerError> {
        let (new_min, new_max, new_retention, old_max) = {
            let inner = self.inner.lock().await;
            let new_min = min.unwrap_or(inner.min_workers);
            let new_max = max.unwrap_or(inner.max_workers);
            validate_limits(new_min, new_max)?;
            (
                new_min,
                new_max,
                retention.unwrap_or(inner.retention),
                inner.max_workers,
            )
        };

        // Resize the gate without holding the pool lock: running tasks must be
        // able to release workers (and permits) while a shrink waits.
        if new_max > old_max {
            self.gate.add_permits(new_max - old_max);
        } else if new_max < old_max {
            let delta = (old_max - new_max) as u32;
            match tokio::time::timeout(resize_wait, self.gate.acquire_many(delta)).await {
                Ok(Ok(permits)) => permits.forget(),
                Ok(Err(_closed)) => return Err(SchedulerError::Disposed),
                Err(_elapsed) => {
                    return Err(SchedulerError::ResizeTimedOut {
                        pool: self.name.clone(),
                        waited: resize_wait,
                    })
                }
            }
        }

        let mut inner = self.inner.lock().await;
        if inner.bank.len() > new_max {
            inner.bank.truncate(new_max);
        }
        inner.min_workers = new_min;
        inner.max_workers = new_max;
        inner.retention = new_retention;

        Ok(SchedulerSettings {
            min_workers: new_min,
            max_workers: new_max,
            retention: new_retention,
        })
    }

    /// Atomically replaces the session state, template, and worker bank.
    ///
    /// Requires an idle pool (no Created/Scheduled/Running task). A failed
    /// module probe leaves every visible field unchanged.
    ///
    /// The pool lock is held across the idle check and the swap. Tasks enter
    /// `Running` through [`Pool::admit`], which takes the same lock, so the
    /// check cannot go stale before the swap commits.
    pub(crate) async fn rebuild(
        &self,
        update: SessionUpdate,
    ) -> Result<crate::contracts::SessionSettings, SchedulerError> {
        let mut inner = self.inner.lock().await;

        let active = self.active_count();
        if active > 0 {
            return Err(SchedulerError::PoolBusy {
                name: self.name.clone(),
                active,
            });
        }

        let session = inner.session.apply(update);
        let template = WorkerTemplate::build(self.engine.as_ref(), &session)?;

        inner.session = session;
        inner.template = Arc::new(template);
        inner.bank.clear();

        Ok(inner.session.to_contract())
    }

    /// Closes the gate and optionally cancels every active task.
    ///
    /// Pending admission waits fail once the gate closes; their tasks
    /// transition to Cancelled. Nothing is awaited.
    pub(crate) async fn dispose(&self, cancel_active: bool) {
        self.gate.close();
        if cancel_active {
            self.cancel_active();
        }
        self.inner.lock().await.bank.clear();
    }

    // ---------------------------
    // Snapshots
    // ---------------------------

    pub(crate) async fn settings(&self) -> SchedulerSettings {
        let inner = self.inner.lock().await;
        SchedulerSettings {
            min_workers: inner.min_workers,
            max_workers: inner.max_workers,
            retention: inner.retention,
        }
    }

    pub(crate) async fn session(&self) -> crate::contracts::SessionSettings {
        self.inner.lock().await.session.to_contract()
    }

    pub(crate) async fn info(&self) -> PoolInfo {
        let (min, max, retention, modules, init_script) = {
            let inner = self.inner.lock().await;
            (
                inner.min_workers,
                inner.max_workers,
                inner.retention,
                inner.session.modules().to_vec(),
                inner.session.init_script().map(str::to_string),
            )
        };
        PoolInfo {
            name: self.name.clone(),
            min_workers: min,
            max_workers: max,
            retention,
            modules,
            init_script,
            task_count: self.jobs.len(),
            active_count: self.active_count(),
        }
    }
}

/// Shared limit validation for create and configure.
pub(crate) fn validate_limits(min: usize, max: usize) -> Result<(), SchedulerError> {
    if min < 1 {
        return Err(SchedulerError::invalid("min_workers must be at least 1"));
    }
    if max < min {
        return Err(SchedulerError::invalid(format!(
            "max_workers ({max}) must not be below min_workers ({min})"
        )));
    }
    Ok(())
}
