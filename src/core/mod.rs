//! Runtime core: the scheduler façade and its machinery.
//!
//! This module contains the embedded implementation of the runpool runtime.
//! The public API re-exported from here is the [`Scheduler`] and its request
//! types. Everything else is an internal building block the builder wires
//! together.
//!
//! ## Files & responsibilities
//! - **scheduler.rs**: public façade; owns the pool registry and the event
//!   bus, indexes tasks across pools, serializes configuration mutations,
//!   publishes `Created`, spawns one executor per submission.
//! - **executor.rs**: per-task run loop: admission wait, worker check-out,
//!   one-shot init, stop-signal composition (user cancel + deadline),
//!   terminal classification, guaranteed release.
//! - **builder.rs**: constructs the scheduler, creates the default pool,
//!   spawns the fan-out listener and the retention sweeper.
//! - **sweeper.rs**: timer loop evicting expired terminal tasks.
//!
//! ## Event data-plane (who publishes & who consumes)
//!
//! Producers (publish to Bus):
//! - **Scheduler::start** → `Created`
//! - **executor** → `Scheduled`, `Started`, and exactly one of
//!   `Completed` / `Failed` / `Cancelled` / `TimedOut`
//! - **StreamSink** → `Progress` (one per captured record)
//!
//! Consumers (subscribe to Bus):
//! - the fan-out listener (forwards to `SubscriberSet`, bounded per-subscriber
//!   queues, panic isolation)
//! - any caller holding a receiver from `Scheduler::subscribe`
//!
//! ## Wiring (module-level flow)
//! ```text
//! Application code
//!   └─ SchedulerBuilder::new(engine).build() ─► Arc<Scheduler>
//!
//! Scheduler::start(request)
//!   ├─ resolve pool, freeze Job, register in pool index
//!   ├─ publish Created
//!   └─ tokio::spawn(executor::run_job)
//!
//! executor::run_job (per task)
//!   ├─ mark Scheduled, publish
//!   ├─ acquire pool admission gate   (cancel fired? → Cancelled)
//!   ├─ mark Running, publish Started; deadline clock starts here
//!   ├─ pool.lend() worker            (one-shot init on first lend)
//!   ├─ drive engine with composed stop signal
//!   │     first of {cancel, deadline} fires → stop worker, remember cause
//!   ├─ classify: Completed / Failed / Cancelled / TimedOut
//!   └─ release worker + permit on every exit path
//!
//! sweeper (every sweep_interval)
//!   └─ pool.sweep(): evict terminal tasks older than retention
//! ```

mod builder;
mod executor;
mod scheduler;
mod sweeper;

pub use builder::SchedulerBuilder;
pub use scheduler::{ConfigureRequest, CreatePool, Scheduler, StartRequest};
