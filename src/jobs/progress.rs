//! Structured progress items emitted by running scripts.

use serde::Serialize;

/// One progress record captured from the engine's progress stream.
///
/// The most recent record is additionally retained on the task as
/// `last_progress` (overwrite semantics); every record also lands in the
/// drainable progress buffer in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressRecord {
    /// What the script is doing ("Copying files", "Indexing", ...).
    pub activity: String,
    /// Percent complete in `0..=100`, when the script reports one.
    pub percent: Option<u8>,
    /// Optional free-form status line.
    pub message: Option<String>,
}

impl ProgressRecord {
    /// Creates a record with only an activity set.
    pub fn new(activity: impl Into<String>) -> Self {
        Self {
            activity: activity.into(),
            percent: None,
            message: None,
        }
    }

    /// Attaches a completion percentage (clamped to 100).
    pub fn with_percent(mut self, percent: u8) -> Self {
        self.percent = Some(percent.min(100));
        self
    }

    /// Attaches a status message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
