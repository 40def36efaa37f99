//! # The script-engine seam.
//!
//! The scheduler never embeds a guest language; it drives a host engine
//! through two object-safe traits:
//!
//! - **[`Engine`]** — factory and module oracle: materializes worker contexts
//!   from a pool's [`WorkerTemplate`](crate::pool::WorkerTemplate) and answers
//!   availability probes against the host's module-search path.
//! - **[`Worker`]** — one reusable execution context: runs a script body with
//!   positional arguments, streaming captured items into a [`StreamSink`],
//!   stopping cooperatively when its stop token fires.
//!
//! ## Rules
//! - A worker is used by **one task at a time**; the pool enforces check-out.
//! - Workers persist engine state across tasks (that is the point of reuse);
//!   a pool rebuild discards the whole bank instead of patching live workers.
//! - `run` **must** return promptly once `stop` fires. The scheduler never
//!   aborts the future from outside; classification waits for the engine to
//!   actually come back.
//!
//! ## Example
//! ```no_run
//! use async_trait::async_trait;
//! use serde_json::Value;
//! use tokio_util::sync::CancellationToken;
//! use runpool::{Engine, ExecError, ModuleCheck, StreamSink, Worker, WorkerTemplate};
//!
//! struct NullEngine;
//! struct NullWorker;
//!
//! #[async_trait]
//! impl Engine for NullEngine {
//!     async fn create_worker(
//!         &self,
//!         _template: &WorkerTemplate,
//!     ) -> Result<Box<dyn Worker>, ExecError> {
//!         Ok(Box::new(NullWorker))
//!     }
//!
//!     fn check_module(&self, name: &str) -> ModuleCheck {
//!         ModuleCheck {
//!             name: name.to_string(),
//!             available: false,
//!             location: None,
//!             message: format!("no match on {}", self.search_path()),
//!         }
//!     }
//!
//!     fn search_path(&self) -> String {
//!         "/opt/host/modules".to_string()
//!     }
//! }
//!
//! #[async_trait]
//! impl Worker for NullWorker {
//!     async fn run(
//!         &mut self,
//!         _script: &str,
//!         _args: &[Value],
//!         _sink: &StreamSink,
//!         _stop: CancellationToken,
//!     ) -> Result<(), ExecError> {
//!         Ok(())
//!     }
//! }
//! ```

mod sink;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::contracts::ModuleCheck;
use crate::error::ExecError;
use crate::pool::WorkerTemplate;

pub use sink::StreamSink;

/// Shared handle to the host engine.
///
/// One engine instance serves every pool; pools differ only in the template
/// they hand to [`Engine::create_worker`].
pub type EngineRef = Arc<dyn Engine>;

/// Factory for worker contexts and oracle for module availability.
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    /// Materializes a fresh worker context seeded with `template`:
    /// base libraries plus the template's modules imported in declaration
    /// order, variables installed into a scope visible to nested executions.
    ///
    /// The template's init script is **not** run here; the pool runs it as a
    /// separate invocation the first time the worker is lent out.
    async fn create_worker(&self, template: &WorkerTemplate)
        -> Result<Box<dyn Worker>, ExecError>;

    /// Pure availability probe: first match on the host module-search path.
    ///
    /// On a miss, `message` must carry a diagnostic that includes the verbatim
    /// value of [`Engine::search_path`]. No side effects, no shared state.
    fn check_module(&self, name: &str) -> ModuleCheck;

    /// Current verbatim value of the host's module-search-path variable.
    fn search_path(&self) -> String;
}

/// One reusable script-engine execution context.
#[async_trait]
pub trait Worker: Send + 'static {
    /// Runs a script body with positional arguments.
    ///
    /// ### Cancellation requirements
    /// - The implementation **must** observe `stop` and exit promptly once it
    ///   fires, returning [`ExecError::Canceled`] (or whatever partial result
    ///   semantics the engine defines — the scheduler classifies by signal
    ///   order, not by this return value).
    ///
    /// ### Streams
    /// Output, error, and progress items go through `sink` in emission order.
    /// There is no cross-stream ordering guarantee.
    async fn run(
        &mut self,
        script: &str,
        args: &[Value],
        sink: &StreamSink,
        stop: CancellationToken,
    ) -> Result<(), ExecError>;
}
