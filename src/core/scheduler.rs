//! # Scheduler: the public façade.
//!
//! The [`Scheduler`] owns the pool registry, indexes tasks across pools,
//! gates configuration changes, and publishes lifecycle events. It is
//! constructed once per process via [`SchedulerBuilder`](crate::SchedulerBuilder)
//! and passed (as `Arc<Scheduler>`) into whatever command surface sits on top.
//!
//! ## Rules
//! - A pool named `"default"` always exists; submissions without an explicit
//!   pool land there.
//! - Configuration mutations (`configure`, `configure_session`, `create_pool`,
//!   `remove_pool`) serialize through a single lock.
//! - Every operation after [`Scheduler::shutdown`] is rejected with
//!   [`SchedulerError::Disposed`].
//! - Task state lives in memory only; nothing survives the process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Config;
use crate::contracts::{ModuleCheck, PoolInfo, SchedulerSettings, SessionSettings};
use crate::engine::EngineRef;
use crate::error::SchedulerError;
use crate::events::{Bus, EventKind, TaskEvent};
use crate::jobs::Job;
use crate::pool::{Pool, PoolOptions, SessionUpdate};

use super::executor;

/// Name of the pool that always exists and cannot be removed.
pub(crate) const DEFAULT_POOL: &str = "default";

/// Submission parameters for one task.
#[derive(Debug, Clone)]
pub struct StartRequest {
    script: String,
    args: Vec<Value>,
    deadline: Option<Duration>,
    name: Option<String>,
    pool: Option<String>,
}

impl StartRequest {
    /// Creates a request for the given script body.
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            args: Vec::new(),
            deadline: None,
            name: None,
            pool: None,
        }
    }

    /// Sets the positional arguments.
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Sets the per-task deadline, measured from the moment execution begins.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a short display label (never used for lookup).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Targets a specific pool instead of `"default"`.
    pub fn in_pool(mut self, pool: impl Into<String>) -> Self {
        self.pool = Some(pool.into());
        self
    }
}

/// Partial throttling/retention change: `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ConfigureRequest {
    /// New minimum worker-context count.
    pub min_workers: Option<usize>,
    /// New maximum worker-context count (admission gate size).
    pub max_workers: Option<usize>,
    /// New retention window.
    pub retention: Option<Duration>,
}

impl ConfigureRequest {
    /// Request that changes nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Sets the minimum worker count.
    pub fn with_min_workers(mut self, min: usize) -> Self {
        self.min_workers = Some(min);
        self
    }

    /// Sets the maximum worker count.
    pub fn with_max_workers(mut self, max: usize) -> Self {
        self.max_workers = Some(max);
        self
    }

    /// Sets the retention window.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }
}

/// Pool creation parameters. Absent fields fall back to [`Config`] defaults.
#[derive(Debug, Clone)]
pub struct CreatePool {
    /// Pool name (case-insensitive; stored lowercase).
    pub name: String,
    /// Minimum worker-context count.
    pub min_workers: Option<usize>,
    /// Maximum worker-context count.
    pub max_workers: Option<usize>,
    /// Retention window for completed tasks.
    pub retention: Option<Duration>,
    /// Initial session settings.
    pub session: SessionUpdate,
}

impl CreatePool {
    /// Creates a request with defaults for everything but the name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_workers: None,
            max_workers: None,
            retention: None,
            session: SessionUpdate::none(),
        }
    }

    /// Sets the minimum worker count.
    pub fn with_min_workers(mut self, min: usize) -> Self {
        self.min_workers = Some(min);
        self
    }

    /// Sets the maximum worker count.
    pub fn with_max_workers(mut self, max: usize) -> Self {
        self.max_workers = Some(max);
        self
    }

    /// Sets the retention window.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    /// Sets the initial session settings.
    pub fn with_session(mut self, session: SessionUpdate) -> Self {
        self.session = session;
        self
    }
}

/// Multi-pool background task scheduler.
///
/// See the [crate docs](crate) for the full lifecycle walkthrough.
pub struct Scheduler {
    engine: EngineRef,
    cfg: Config,
    bus: Bus,
    pools: DashMap<String, Arc<Pool>>,
    /// Serializes configuration mutations across pools.
    config_gate: Mutex<()>,
    disposed: AtomicBool,
    /// Cancels the sweeper and the fan-out listener on shutdown.
    runtime_token: CancellationToken,
}

impl Scheduler {
    pub(crate) fn new_internal(
        engine: EngineRef,
        cfg: Config,
        bus: Bus,
        runtime_token: CancellationToken,
    ) -> Self {
        Self {
            engine,
            cfg,
            bus,
            pools: DashMap::new(),
            config_gate: Mutex::new(()),
            disposed: AtomicBool::new(false),
            runtime_token,
        }
    }

    // ---------------------------
    // Task operations
    // ---------------------------

    /// Submits a task and returns its handle.
    ///
    /// Publishes `Created` before the executor is spawned, so it precedes
    /// every other event for this task. Must be called within a tokio
    /// runtime.
    pub fn start(&self, req: StartRequest) -> Result<Arc<Job>, SchedulerError> {
        self.ensure_open()?;
        if req.script.trim().is_empty() {
            return Err(SchedulerError::invalid("script must not be empty"));
        }

        let pool_name = normalize(req.pool.as_deref().unwrap_or(DEFAULT_POOL));
        let pool = self.resolve(&pool_name)?;

        let job = Arc::new(Job::new(
            pool_name,
            req.script,
            req.args,
            req.deadline,
            req.name,
        ));
        pool.register(Arc::clone(&job));
        self.bus
            .publish(TaskEvent::now(EventKind::Created, Arc::clone(&job)));

        tokio::spawn(executor::run_job(
            Arc::clone(&job),
            pool,
            self.bus.clone(),
        ));
        Ok(job)
    }

    /// Returns tasks ordered by creation time, optionally filtered by pool
    /// and/or an id set.
    pub fn jobs(
        &self,
        pool: Option<&str>,
        ids: Option<&[Uuid]>,
    ) -> Result<Vec<Arc<Job>>, SchedulerError> {
        self.ensure_open()?;
        let mut out: Vec<Arc<Job>> = match pool {
            Some(name) => self.resolve(&normalize(name))?.snapshot(),
            None => self
                .pools
                .iter()
                .flat_map(|entry| entry.value().snapshot())
                .collect(),
        };
        if let Some(ids) = ids {
            out.retain(|job| ids.contains(&job.id()));
        }
        out.sort_by_key(|job| (job.created_at(), job.id()));
        Ok(out)
    }

    /// Looks one task up by id, across every pool.
    pub fn job(&self, id: Uuid) -> Option<Arc<Job>> {
        self.pools
            .iter()
            .find_map(|entry| entry.value().get(id))
    }

    /// Fires the task's cancel signal.
    ///
    /// Returns `true` when the task was still stoppable; a terminal task is a
    /// no-op returning `false`. The task transitions to `Cancelled` only
    /// after the engine actually returns.
    pub fn stop(&self, job: &Job) -> Result<bool, SchedulerError> {
        self.ensure_open()?;
        if !job.is_active() {
            return Ok(false);
        }
        job.request_stop();
        Ok(true)
    }

    /// Waits until the task reaches a terminal state.
    ///
    /// Returns `true` once terminal, `false` when the timeout elapses first;
    /// the task is left untouched either way.
    pub async fn wait(&self, job: &Job, timeout: Option<Duration>) -> Result<bool, SchedulerError> {
        self.ensure_open()?;
        Ok(job.wait(timeout).await)
    }

    /// Removes completed tasks from their pools' indexes.
    ///
    /// Refuses with [`SchedulerError::JobActive`] when any named task is
    /// still active; in that case nothing is removed. Unknown ids (already
    /// evicted) are skipped. Returns the ids that were actually removed.
    pub fn remove(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, SchedulerError> {
        self.ensure_open()?;

        let mut found: Vec<(Arc<Pool>, Uuid)> = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some((pool, job)) = self.find_with_pool(*id) {
                if job.is_active() {
                    return Err(SchedulerError::JobActive { id: *id });
                }
                found.push((pool, *id));
            }
        }

        let mut removed = Vec::with_capacity(found.len());
        for (pool, id) in found {
            if pool.evict(id).is_some() {
                removed.push(id);
            }
        }
        Ok(removed)
    }

    // ---------------------------
    // Pool configuration
    // ---------------------------

    /// Applies throttling/retention overrides to a pool.
    ///
    /// Shrinking the gate waits (bounded) for running tasks to release.
    pub async fn configure(
        &self,
        pool: Option<&str>,
        req: ConfigureRequest,
    ) -> Result<SchedulerSettings, SchedulerError> {
        self.ensure_open()?;
        let _serial = self.config_gate.lock().await;
        let pool = self.resolve(&normalize(pool.unwrap_or(DEFAULT_POOL)))?;
        pool.configure(
            req.min_workers,
            req.max_workers,
            req.retention,
            self.cfg.resize_wait,
        )
        .await
    }

    /// Current throttling/retention settings of a pool.
    pub async fn settings(&self, pool: Option<&str>) -> Result<SchedulerSettings, SchedulerError> {
        self.ensure_open()?;
        Ok(self
            .resolve(&normalize(pool.unwrap_or(DEFAULT_POOL)))?
            .settings()
            .await)
    }

    /// Replaces a pool's session settings and rebuilds its worker bank.
    ///
    /// Every module is probed first; the pool must be idle. A rejected call
    /// leaves every visible field unchanged.
    pub async fn configure_session(
        &self,
        pool: Option<&str>,
        update: SessionUpdate,
    ) -> Result<SessionSettings, SchedulerError> {
        self.ensure_open()?;
        let _serial = self.config_gate.lock().await;
        let pool = self.resolve(&normalize(pool.unwrap_or(DEFAULT_POOL)))?;
        pool.rebuild(update).await
    }

    /// Current session settings of a pool.
    pub async fn session(&self, pool: Option<&str>) -> Result<SessionSettings, SchedulerError> {
        self.ensure_open()?;
        Ok(self
            .resolve(&normalize(pool.unwrap_or(DEFAULT_POOL)))?
            .session()
            .await)
    }

    // ---------------------------
    // Pool lifecycle
    // ---------------------------

    /// Creates a pool, or updates an existing one with the same name.
    ///
    /// An existing pool receives the request's overrides through the regular
    /// update paths (limits first, then session), so the same validation and
    /// idle-pool rules apply.
    pub async fn create_pool(&self, req: CreatePool) -> Result<PoolInfo, SchedulerError> {
        self.ensure_open()?;
        let _serial = self.config_gate.lock().await;

        let name = normalize(&req.name);
        if name.is_empty() {
            return Err(SchedulerError::invalid("pool name must not be empty"));
        }

        if let Some(existing) = self.pools.get(&name).map(|e| Arc::clone(e.value())) {
            let limits_changed = req.min_workers.is_some()
                || req.max_workers.is_some()
                || req.retention.is_some();
            if limits_changed {
                existing
                    .configure(
                        req.min_workers,
                        req.max_workers,
                        req.retention,
                        self.cfg.resize_wait,
                    )
                    .await?;
            }
            if !req.session.is_empty() {
                existing.rebuild(req.session).await?;
            }
            return Ok(existing.info().await);
        }

        let pool = Pool::create(
            name.clone(),
            Arc::clone(&self.engine),
            PoolOptions {
                min_workers: req.min_workers,
                max_workers: req.max_workers,
                retention: req.retention,
                session: req.session,
            },
            &self.cfg,
        )?;
        self.pools.insert(name, Arc::clone(&pool));
        Ok(pool.info().await)
    }

    /// Destroys a non-default pool.
    ///
    /// With active tasks the call requires `force`, which fires every active
    /// task's cancel signal and disposes without waiting for anyone.
    pub async fn remove_pool(&self, name: &str, force: bool) -> Result<(), SchedulerError> {
        self.ensure_open()?;
        let _serial = self.config_gate.lock().await;

        let key = normalize(name);
        if key == DEFAULT_POOL {
            return Err(SchedulerError::DefaultPoolProtected);
        }
        let pool = self
            .pools
            .get(&key)
            .map(|e| Arc::clone(e.value()))
            .ok_or(SchedulerError::PoolNotFound { name: key.clone() })?;

        let active = pool.active_count();
        if active > 0 && !force {
            return Err(SchedulerError::PoolBusy { name: key, active });
        }

        pool.dispose(true).await;
        self.pools.remove(&key);
        Ok(())
    }

    /// Describes every pool (sorted by name), or just the named one.
    ///
    /// An unknown name yields an empty list rather than an error.
    pub async fn pools(&self, name: Option<&str>) -> Result<Vec<PoolInfo>, SchedulerError> {
        self.ensure_open()?;
        let selected: Vec<Arc<Pool>> = match name {
            Some(n) => self
                .pools
                .get(&normalize(n))
                .map(|e| vec![Arc::clone(e.value())])
                .unwrap_or_default(),
            None => {
                let mut all: Vec<Arc<Pool>> =
                    self.pools.iter().map(|e| Arc::clone(e.value())).collect();
                all.sort_by(|a, b| a.name().cmp(b.name()));
                all
            }
        };

        let mut out = Vec::with_capacity(selected.len());
        for pool in selected {
            out.push(pool.info().await);
        }
        Ok(out)
    }

    // ---------------------------
    // Probes, events, lifecycle
    // ---------------------------

    /// Probes each named library on the host's module-search path.
    pub fn check_modules(&self, names: &[&str]) -> Result<Vec<ModuleCheck>, SchedulerError> {
        self.ensure_open()?;
        Ok(names
            .iter()
            .map(|name| self.engine.check_module(name))
            .collect())
    }

    /// Subscribes to the process-wide lifecycle event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.bus.subscribe()
    }

    /// Stops the runtime: cancels the sweeper and the fan-out listener,
    /// fires every active task's cancel signal, and rejects all further
    /// operations. Idempotent.
    pub async fn shutdown(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.runtime_token.cancel();
        for pool in self.pools_snapshot() {
            pool.dispose(true).await;
        }
    }

    // ---------------------------
    // Internals
    // ---------------------------

    pub(crate) fn register_pool(&self, pool: Arc<Pool>) {
        self.pools.insert(pool.name().to_string(), pool);
    }

    pub(crate) fn pools_snapshot(&self) -> Vec<Arc<Pool>> {
        self.pools.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub(crate) fn config(&self) -> &Config {
        &self.cfg
    }

    fn ensure_open(&self) -> Result<(), SchedulerError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(SchedulerError::Disposed);
        }
        Ok(())
    }

    fn resolve(&self, normalized: &str) -> Result<Arc<Pool>, SchedulerError> {
        self.pools
            .get(normalized)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| SchedulerError::PoolNotFound {
                name: normalized.to_string(),
            })
    }

    fn find_with_pool(&self, id: Uuid) -> Option<(Arc<Pool>, Arc<Job>)> {
        self.pools.iter().find_map(|entry| {
            entry
                .value()
                .get(id)
                .map(|job| (Arc::clone(entry.value()), job))
        })
    }
}

/// Case-insensitive pool names, stored lowercase.
fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
