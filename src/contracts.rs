//! # Public value objects seen by external consumers.
//!
//! Immutable snapshots the scheduler hands to callers (programmatic consumers,
//! command layers, table renderers). They carry no live handles: mutate
//! through [`Scheduler`](crate::Scheduler) operations, not through these.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

/// Throttling and retention settings of one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerSettings {
    /// Lower bound of the pool's worker-context budget.
    pub min_workers: usize,
    /// Maximum number of concurrently running tasks (admission gate size).
    pub max_workers: usize,
    /// How long completed tasks remain queryable.
    pub retention: Duration,
}

/// Session state a pool seeds into every worker context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSettings {
    /// Libraries imported into each worker, in declaration order.
    pub modules: Vec<String>,
    /// Variables installed into the worker scope (names lowercased).
    pub variables: BTreeMap<String, Value>,
    /// Optional prelude that runs once per worker.
    pub init_script: Option<String>,
}

/// Point-in-time description of a pool.
#[derive(Debug, Clone, Serialize)]
pub struct PoolInfo {
    /// Unique pool name (lowercase).
    pub name: String,
    /// Minimum worker-context count.
    pub min_workers: usize,
    /// Maximum worker-context count.
    pub max_workers: usize,
    /// Retention window for completed tasks.
    pub retention: Duration,
    /// Configured session modules.
    pub modules: Vec<String>,
    /// The one-shot init script body, if configured.
    pub init_script: Option<String>,
    /// Tasks currently indexed by the pool (any state, not yet evicted).
    pub task_count: usize,
    /// Tasks in a non-terminal state.
    pub active_count: usize,
}

/// Result of probing one library on the host's module-search path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleCheck {
    /// Library name as probed.
    pub name: String,
    /// Whether a matching library was found.
    pub available: bool,
    /// Location of the first match, when found.
    pub location: Option<String>,
    /// Human-readable diagnostic; on a miss it includes the search path.
    pub message: String,
}
