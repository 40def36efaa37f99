//! # Execution pools: worker banks, admission, session state.
//!
//! A pool owns everything one group of tasks shares:
//!
//! - [`SessionUpdate`] partial changes to the configured session settings
//! - [`WorkerTemplate`] the canonical seeded initial state workers are
//!   materialized from (base libraries + modules + variables + init)
//! - [`Pool`] the runtime object: admission gate, reusable worker bank with
//!   per-slot one-shot-init tracking, task index, limits and retention
//!
//! ## Rules
//! - Pool names are case-insensitive, stored lowercase; `"default"` always
//!   exists and cannot be removed.
//! - At most `max_workers` tasks of one pool run concurrently (the gate).
//! - Session mutation and template rebuild require an idle pool and fail fast
//!   otherwise, leaving state unchanged.

mod pool;
mod session;
mod template;

pub(crate) use pool::{Pool, PoolOptions};
pub use session::SessionUpdate;
pub use template::{WorkerTemplate, BASE_MODULES};
