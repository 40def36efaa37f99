//! # LogWriter — simple event printer
//!
//! A minimal subscriber that prints incoming [`TaskEvent`]s to stdout.
//! Use it for test or demo.
//!
//! ## Example output
//! ```text
//! [created] task=3f0c… pool="default"
//! [started] task=3f0c…
//! [progress] task=3f0c… pct=Some(50)
//! [completed] task=3f0c…
//! [failed] task=91ab… err=Some("script execution failed: boom")
//! ```

use async_trait::async_trait;

use crate::events::{EventKind, TaskEvent};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &TaskEvent) {
        let id = e.job.id();
        match e.kind {
            EventKind::Created => {
                println!("[created] task={id} pool={:?}", e.job.pool());
            }
            EventKind::Scheduled => {
                println!("[scheduled] task={id}");
            }
            EventKind::Started => {
                println!("[started] task={id}");
            }
            EventKind::Progress => {
                let pct = e.progress.as_ref().and_then(|p| p.percent);
                println!("[progress] task={id} pct={pct:?}");
            }
            EventKind::Completed => {
                println!("[completed] task={id}");
            }
            EventKind::Failed => {
                println!("[failed] task={id} err={:?}", e.job.failure());
            }
            EventKind::Cancelled => {
                println!("[cancelled] task={id}");
            }
            EventKind::TimedOut => {
                println!("[timed-out] task={id} err={:?}", e.job.failure());
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
