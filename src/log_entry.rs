//! Public result records returned by `read` and `stat`.

use chrono::{DateTime, Local};

/// One entry read back from the log.
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    /// When the entry was recorded, in the local timezone.
    pub timestamp: DateTime<Local>,
    /// Severity within `0..=255`.
    pub severity: i32,
    /// The logging source.
    pub source: String,
    /// The message.
    pub message: String,
}

/// Information on one log kept by the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogInfo {
    /// Address of the log.
    pub address: String,
    /// Current size of the log in bytes.
    pub size: i64,
    /// Soft size limit of the log in bytes.
    pub limit: i64,
}
