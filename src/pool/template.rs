//! # Worker template: the canonical seeded initial state.
//!
//! A [`WorkerTemplate`] is what the engine materializes workers from: the two
//! fixed base libraries, the pool's configured modules in declaration order,
//! the variable scope, and the optional one-shot init script.
//!
//! ## Rules
//! - Built only after **every** configured module passes the availability
//!   probe; a build that fails mutates nothing and reports each miss with its
//!   probe diagnostic and the search path.
//! - The base libraries are always imported first and are not probed.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::engine::Engine;
use crate::error::SchedulerError;

use super::session::SessionState;

/// The two built-in libraries every worker imports before anything else
/// (path and utility verbs).
pub const BASE_MODULES: [&str; 2] = ["path", "util"];

/// Canonical initial state workers are materialized from.
#[derive(Debug, Clone)]
pub struct WorkerTemplate {
    modules: Vec<String>,
    variables: BTreeMap<String, Value>,
    init_script: Option<String>,
}

impl WorkerTemplate {
    /// Probes every configured module, then assembles the template.
    ///
    /// Fails with [`SchedulerError::MissingModules`] listing each unavailable
    /// module; in that case no template exists and callers must leave their
    /// previous state in place.
    pub(crate) fn build(
        engine: &dyn Engine,
        session: &SessionState,
    ) -> Result<Self, SchedulerError> {
        let missing: Vec<_> = session
            .modules()
            .iter()
            .map(|name| engine.check_module(name))
            .filter(|check| !check.available)
            .collect();
        if !missing.is_empty() {
            return Err(SchedulerError::MissingModules {
                missing,
                search_path: engine.search_path(),
            });
        }

        let mut modules: Vec<String> = BASE_MODULES.iter().map(|m| m.to_string()).collect();
        for name in session.modules() {
            if !modules.iter().any(|seen| seen.eq_ignore_ascii_case(name)) {
                modules.push(name.clone());
            }
        }

        Ok(Self {
            modules,
            variables: session.variables().clone(),
            init_script: session.init_script().map(str::to_string),
        })
    }

    /// Libraries to import, base libraries first, in declaration order.
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    /// Variables to install into the worker scope (names lowercased).
    pub fn variables(&self) -> &BTreeMap<String, Value> {
        &self.variables
    }

    /// One-shot per-worker prelude, if configured.
    pub fn init_script(&self) -> Option<&str> {
        self.init_script.as_deref()
    }
}
