//! # Session settings: what every worker in a pool starts with.
//!
//! [`SessionState`] is the normalized, validated form the pool stores;
//! [`SessionUpdate`] is the partial form callers submit. Normalization
//! happens once, on the way in:
//!
//! - module names are trimmed and de-duplicated case-insensitively,
//!   preserving declaration order and the first-seen casing;
//! - variable names are trimmed and lowercased (case-insensitive mapping),
//!   last assignment wins;
//! - an init script that trims to empty means "no init script".

use std::collections::BTreeMap;

use serde_json::Value;

use crate::contracts::SessionSettings;

/// Normalized session settings stored by a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SessionState {
    modules: Vec<String>,
    variables: BTreeMap<String, Value>,
    init_script: Option<String>,
}

impl SessionState {
    /// Configured modules, in declaration order (deduped).
    pub(crate) fn modules(&self) -> &[String] {
        &self.modules
    }

    /// Variables with lowercased names.
    pub(crate) fn variables(&self) -> &BTreeMap<String, Value> {
        &self.variables
    }

    /// One-shot per-worker prelude, if configured.
    pub(crate) fn init_script(&self) -> Option<&str> {
        self.init_script.as_deref()
    }

    /// Returns a copy with the update's present fields replacing this state's.
    pub(crate) fn apply(&self, update: SessionUpdate) -> SessionState {
        SessionState {
            modules: match update.modules {
                Some(m) => normalize_modules(m),
                None => self.modules.clone(),
            },
            variables: match update.variables {
                Some(v) => normalize_variables(v),
                None => self.variables.clone(),
            },
            init_script: match update.init_script {
                Some(s) => normalize_init(s),
                None => self.init_script.clone(),
            },
        }
    }

    /// Snapshot for external consumers.
    pub(crate) fn to_contract(&self) -> SessionSettings {
        SessionSettings {
            modules: self.modules.clone(),
            variables: self.variables.clone(),
            init_script: self.init_script.clone(),
        }
    }
}

/// Partial session change: `None` fields are left untouched.
///
/// Passing an init script that trims to empty clears the configured init.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    /// Replacement module list.
    pub modules: Option<Vec<String>>,
    /// Replacement variable set (names are lowercased).
    pub variables: Option<Vec<(String, Value)>>,
    /// Replacement init script; empty string clears it.
    pub init_script: Option<String>,
}

impl SessionUpdate {
    /// Update that changes nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Sets the replacement module list.
    pub fn with_modules(mut self, modules: Vec<String>) -> Self {
        self.modules = Some(modules);
        self
    }

    /// Sets the replacement variables.
    pub fn with_variables(mut self, variables: Vec<(String, Value)>) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Sets the replacement init script.
    pub fn with_init(mut self, init: impl Into<String>) -> Self {
        self.init_script = Some(init.into());
        self
    }

    /// True when no field is present.
    pub fn is_empty(&self) -> bool {
        self.modules.is_none() && self.variables.is_none() && self.init_script.is_none()
    }
}

fn normalize_modules(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for name in raw {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        if !out.iter().any(|seen| seen.eq_ignore_ascii_case(name)) {
            out.push(name.to_string());
        }
    }
    out
}

fn normalize_variables(raw: Vec<(String, Value)>) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    for (name, value) in raw {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            continue;
        }
        out.insert(name, value);
    }
    out
}

fn normalize_init(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn modules_dedup_case_insensitive_preserving_order() {
        let state = SessionState::default().apply(
            SessionUpdate::none().with_modules(vec![
                "Json".into(),
                "http".into(),
                "JSON".into(),
                "  ".into(),
                "Http".into(),
            ]),
        );
        assert_eq!(state.modules(), ["Json", "http"]);
    }

    #[test]
    fn variable_names_are_lowercased_last_wins() {
        let state = SessionState::default().apply(SessionUpdate::none().with_variables(vec![
            ("Marker".into(), json!("a")),
            ("MARKER".into(), json!("b")),
        ]));
        assert_eq!(state.variables().get("marker"), Some(&json!("b")));
        assert_eq!(state.variables().len(), 1);
    }

    #[test]
    fn empty_init_clears() {
        let with_init = SessionState::default().apply(SessionUpdate::none().with_init("incr boot"));
        assert_eq!(with_init.init_script(), Some("incr boot"));

        let cleared = with_init.apply(SessionUpdate::none().with_init("   "));
        assert_eq!(cleared.init_script(), None);
    }

    #[test]
    fn absent_fields_are_untouched() {
        let base = SessionState::default().apply(
            SessionUpdate::none()
                .with_modules(vec!["json".into()])
                .with_init("incr boot"),
        );
        let updated = base.apply(SessionUpdate::none().with_variables(vec![(
            "x".into(),
            json!(1),
        )]));
        assert_eq!(updated.modules(), ["json"]);
        assert_eq!(updated.init_script(), Some("incr boot"));
        assert_eq!(updated.variables().get("x"), Some(&json!(1)));
    }
}
