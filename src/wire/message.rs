//! Records exchanged with the LogHub service.
//!
//! Field names are part of the wire contract and serialise in PascalCase.

use serde::{Deserialize, Serialize};

/// Request kind announced by a [`MessageHeader`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Action {
    Write,
    Read,
    Truncate,
    Stat,
}

/// First frame of every request: the action plus credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct MessageHeader {
    pub action: Action,
    pub usr: String,
    pub pass: String,
}

/// One entry of a write batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WriteEntry {
    pub sev: i32,
    pub src: String,
    pub msg: String,
}

/// Filter sent with a read request. An empty `Src` matches all sources.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ReadQuery {
    pub from: i64,
    pub to: i64,
    pub min_sev: i32,
    pub max_sev: i32,
    pub src: String,
}

/// One entry streamed back by a read request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LogEntryOut {
    pub ts: i64,
    pub sev: i32,
    pub src: String,
    pub msg: String,
}

/// Truncation request: drop entries older than `Lim` for matching sources.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct TruncateDirective {
    pub lim: i64,
    pub src: String,
}

/// One record streamed back by a stat request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct StatRecord {
    pub addr: String,
    pub sz: i64,
    pub lim: i64,
}
