//! Scripted in-memory engine used by the integration tests.
//!
//! Interprets a tiny line language, one command per line:
//!
//! ```text
//! sleep <ms>            pause (cooperatively cancellable)
//! emit <text>           append to the output stream
//! error <text>          append to the error stream
//! progress <pct> <msg>  append a progress record
//! fail <reason>         abort with a script error
//! incr <name>           increment a worker-global counter
//! ```
//!
//! `$0`..`$9` interpolate positional arguments; `$name` interpolates a
//! worker-scope variable (template variables and `incr` counters share that
//! scope, so state survives across tasks on the same worker).

// Each integration-test binary compiles its own copy of this module and uses
// a different subset of it.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use runpool::{
    Engine, EngineRef, ExecError, ModuleCheck, ProgressRecord, Scheduler, SchedulerBuilder,
    StreamSink, Worker, WorkerTemplate,
};

/// Shared instrumentation across an engine and its workers.
#[derive(Default)]
struct Stats {
    active: AtomicUsize,
    peak: AtomicUsize,
    workers_created: AtomicUsize,
}

/// Test double for the host scripting engine.
pub struct ScriptedEngine {
    modules: HashSet<String>,
    search_path: String,
    stats: Arc<Stats>,
}

impl ScriptedEngine {
    /// Engine with only the base libraries and `json` available.
    pub fn new() -> Arc<Self> {
        Self::with_modules(&[])
    }

    /// Engine with extra available modules on top of the defaults.
    pub fn with_modules(extra: &[&str]) -> Arc<Self> {
        let mut modules: HashSet<String> =
            ["path", "util", "json"].iter().map(|m| m.to_string()).collect();
        for m in extra {
            modules.insert(m.to_lowercase());
        }
        Arc::new(Self {
            modules,
            search_path: "/opt/scripted/modules".to_string(),
            stats: Arc::new(Stats::default()),
        })
    }

    /// Highest number of simultaneously running engine invocations observed.
    pub fn peak_concurrency(&self) -> usize {
        self.stats.peak.load(Ordering::SeqCst)
    }

    /// Total worker contexts materialized so far.
    pub fn workers_created(&self) -> usize {
        self.stats.workers_created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    async fn create_worker(
        &self,
        template: &WorkerTemplate,
    ) -> Result<Box<dyn Worker>, ExecError> {
        for module in template.modules() {
            if !self.modules.contains(&module.to_lowercase()) {
                return Err(ExecError::Submit {
                    reason: format!("cannot import module '{module}'"),
                });
            }
        }
        self.stats.workers_created.fetch_add(1, Ordering::SeqCst);

        let globals: HashMap<String, Value> = template
            .variables()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Box::new(ScriptedWorker {
            globals,
            stats: Arc::clone(&self.stats),
        }))
    }

    fn check_module(&self, name: &str) -> ModuleCheck {
        let key = name.trim().to_lowercase();
        if self.modules.contains(&key) {
            ModuleCheck {
                name: name.to_string(),
                available: true,
                location: Some(format!("{}/{key}", self.search_path)),
                message: format!("found under {}", self.search_path),
            }
        } else {
            ModuleCheck {
                name: name.to_string(),
                available: false,
                location: None,
                message: format!("no match for '{name}' on {}", self.search_path),
            }
        }
    }

    fn search_path(&self) -> String {
        self.search_path.clone()
    }
}

/// One worker context: a variable scope that persists across tasks.
struct ScriptedWorker {
    globals: HashMap<String, Value>,
    stats: Arc<Stats>,
}

/// Tracks concurrent invocations while a run is in flight.
struct RunGuard {
    stats: Arc<Stats>,
}

impl RunGuard {
    fn enter(stats: &Arc<Stats>) -> Self {
        let now = stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        stats.peak.fetch_max(now, Ordering::SeqCst);
        Self {
            stats: Arc::clone(stats),
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Worker for ScriptedWorker {
    async fn run(
        &mut self,
        script: &str,
        args: &[Value],
        sink: &StreamSink,
        stop: CancellationToken,
    ) -> Result<(), ExecError> {
        let _guard = RunGuard::enter(&self.stats);

        for line in script.lines() {
            if stop.is_cancelled() {
                return Err(ExecError::Canceled);
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (cmd, rest) = match line.split_once(' ') {
                Some((cmd, rest)) => (cmd, rest.trim()),
                None => (line, ""),
            };

            match cmd {
                "sleep" => {
                    let ms: u64 = interpolate(rest, args, &self.globals)
                        .parse()
                        .map_err(|_| ExecError::Submit {
                            reason: format!("sleep wants milliseconds, got '{rest}'"),
                        })?;
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
                        _ = stop.cancelled() => return Err(ExecError::Canceled),
                    }
                }
                "emit" => {
                    sink.output(Value::String(interpolate(rest, args, &self.globals)));
                }
                "error" => {
                    sink.error(interpolate(rest, args, &self.globals));
                }
                "progress" => {
                    let (pct, msg) = match rest.split_once(' ') {
                        Some((p, m)) => (p, m.trim()),
                        None => (rest, ""),
                    };
                    let pct: u8 = pct.parse().map_err(|_| ExecError::Submit {
                        reason: format!("progress wants a percentage, got '{pct}'"),
                    })?;
                    let mut record = ProgressRecord::new("task").with_percent(pct);
                    if !msg.is_empty() {
                        record = record.with_message(msg);
                    }
                    sink.progress(record);
                }
                "fail" => {
                    return Err(ExecError::Script {
                        reason: interpolate(rest, args, &self.globals),
                    });
                }
                "incr" => {
                    let key = rest.to_lowercase();
                    let next = self
                        .globals
                        .get(&key)
                        .and_then(Value::as_i64)
                        .unwrap_or(0)
                        + 1;
                    self.globals.insert(key, Value::from(next));
                }
                other => {
                    return Err(ExecError::Submit {
                        reason: format!("unknown command '{other}'"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Replaces `$0`..`$9` with positional arguments and `$name` with
/// worker-scope variables.
fn interpolate(text: &str, args: &[Value], globals: &HashMap<String, Value>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let mut ident = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                ident.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if ident.is_empty() {
            out.push('$');
        } else if let Ok(index) = ident.parse::<usize>() {
            if let Some(value) = args.get(index) {
                out.push_str(&render(value));
            }
        } else if let Some(value) = globals.get(&ident.to_lowercase()) {
            out.push_str(&render(value));
        }
    }
    out
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Builds a scheduler around the given engine with default config.
pub fn build(engine: Arc<ScriptedEngine>) -> Arc<Scheduler> {
    SchedulerBuilder::new(engine as EngineRef)
        .build()
        .expect("scheduler build")
}

/// Builds a scheduler with a custom config.
pub fn build_with(engine: Arc<ScriptedEngine>, cfg: runpool::Config) -> Arc<Scheduler> {
    SchedulerBuilder::new(engine as EngineRef)
        .with_config(cfg)
        .build()
        .expect("scheduler build")
}
