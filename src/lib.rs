//! # runpool
//!
//! **Runpool** is a multi-pool background task scheduler for embedded script
//! engines.
//!
//! Callers submit units of work (a script body plus positional arguments and
//! an optional per-task deadline) and receive a task handle that can be
//! polled, awaited, drained of output, cancelled, or removed. Each task is
//! dispatched to a named execution pool that owns a bounded bank of reusable
//! script-engine worker contexts pre-seeded with configurable session state
//! (imported libraries, preset variables, a one-shot per-worker init routine).
//!
//! ## Features
//!
//! | Area            | Description                                                        | Key types / traits                       |
//! |-----------------|--------------------------------------------------------------------|------------------------------------------|
//! | **Engine seam** | Plug in any host scripting engine.                                 | [`Engine`], [`Worker`], [`StreamSink`]   |
//! | **Pools**       | Per-pool throttling, retention, and session state.                 | [`CreatePool`], [`SessionUpdate`]        |
//! | **Tasks**       | Submit, await, drain, cancel, remove.                              | [`StartRequest`], [`Job`], [`JobStatus`] |
//! | **Events**      | Hook into task lifecycle events (logging, metrics, custom sinks).  | [`Subscribe`], [`TaskEvent`]             |
//! | **Errors**      | Typed errors for the boundary and the engine seam.                 | [`SchedulerError`], [`ExecError`]        |
//! | **Contracts**   | Immutable snapshots for external consumers.                        | [`PoolInfo`], [`SchedulerSettings`]      |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] subscriber _(demo/reference only)_.
//!
//! ```no_run
//! use std::time::Duration;
//! use serde_json::json;
//! use runpool::{EngineRef, SchedulerBuilder, StartRequest};
//!
//! # async fn demo(engine: EngineRef) -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = SchedulerBuilder::new(engine).build()?;
//!
//! let job = scheduler.start(
//!     StartRequest::new("sleep $0\nemit done-$0")
//!         .with_args(vec![json!(50)])
//!         .with_deadline(Duration::from_secs(5)),
//! )?;
//!
//! scheduler.wait(&job, Some(Duration::from_secs(5))).await?;
//! let output = job.receive_output(false);
//! println!("{output:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ---

mod config;
mod contracts;
mod core;
mod engine;
mod error;
mod events;
mod jobs;
mod pool;
mod subscribers;

// ---- Public re-exports ----

pub use crate::config::Config;
pub use crate::contracts::{ModuleCheck, PoolInfo, SchedulerSettings, SessionSettings};
pub use crate::core::{ConfigureRequest, CreatePool, Scheduler, SchedulerBuilder, StartRequest};
pub use crate::engine::{Engine, EngineRef, StreamSink, Worker};
pub use crate::error::{ExecError, SchedulerError};
pub use crate::events::{EventKind, TaskEvent};
pub use crate::jobs::{Job, JobStatus, ProgressRecord};
pub use crate::pool::{SessionUpdate, WorkerTemplate, BASE_MODULES};
pub use crate::subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logging subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use crate::subscribers::LogWriter;
