//! Builder for constructing a [`Scheduler`] with optional features.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::Config;
use crate::engine::EngineRef;
use crate::error::SchedulerError;
use crate::events::Bus;
use crate::pool::{Pool, PoolOptions};
use crate::subscribers::{Subscribe, SubscriberSet};

use super::scheduler::{Scheduler, DEFAULT_POOL};
use super::sweeper;

/// Builder for constructing a [`Scheduler`].
///
/// Must be built within a tokio runtime: building spawns the fan-out
/// listener, the subscriber workers, and the retention sweeper.
pub struct SchedulerBuilder {
    engine: EngineRef,
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SchedulerBuilder {
    /// Creates a new builder around the host engine.
    pub fn new(engine: EngineRef) -> Self {
        Self {
            engine,
            cfg: Config::default(),
            subscribers: Vec::new(),
        }
    }

    /// Replaces the runtime configuration.
    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events through dedicated workers with
    /// bounded queues; they are registered process-wide, once, here.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the scheduler and initializes all runtime components:
    /// the event bus, the default pool, the subscriber workers, the fan-out
    /// listener, and the retention sweeper.
    pub fn build(self) -> Result<Arc<Scheduler>, SchedulerError> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let runtime_token = CancellationToken::new();

        let scheduler = Arc::new(Scheduler::new_internal(
            Arc::clone(&self.engine),
            self.cfg,
            bus.clone(),
            runtime_token.clone(),
        ));

        // The default pool exists from the start and cannot be removed. Its
        // empty session probes nothing, so this cannot fail on modules; a
        // failure here means the defaults themselves are broken.
        let default_pool = Pool::create(
            DEFAULT_POOL.to_string(),
            self.engine,
            PoolOptions::default(),
            scheduler.config(),
        )?;
        scheduler.register_pool(default_pool);

        spawn_fanout(
            &bus,
            SubscriberSet::new(self.subscribers),
            runtime_token.clone(),
        );
        sweeper::spawn(Arc::downgrade(&scheduler), runtime_token);

        Ok(scheduler)
    }
}

/// Spawns the single fan-out point: drains the bus into the subscriber set.
///
/// Runs until the runtime token fires or the bus closes. A lagging listener
/// skips old events (the bus is a bounded ring) and keeps going.
fn spawn_fanout(bus: &Bus, subs: SubscriberSet, token: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => subs.emit_arc(Arc::new(ev)),
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event fan-out lagged behind the bus");
                        continue;
                    }
                }
            }
        }
    });
}
