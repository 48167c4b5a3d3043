//! Trace log lines: `{"timestamp","direction","data"}`, one JSON object per line.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::TraceError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Client → gateway.
    #[serde(rename = "recv", alias = "received")]
    Received,
    /// Gateway → client.
    #[serde(rename = "sent")]
    Sent,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Received => write!(f, "recv"),
            Self::Sent => write!(f, "sent"),
        }
    }
}

/// One recorded payload. `data` is the raw wire text, kept verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub timestamp: String,
    pub direction: Direction,
    pub data: String,
}

impl TraceEntry {
    pub fn new(direction: Direction, data: impl Into<String>) -> Self {
        Self::at(direction, data, Utc::now())
    }

    pub fn at(direction: Direction, data: impl Into<String>, stamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: stamp.to_rfc3339(),
            direction,
            data: data.into(),
        }
    }

    pub fn is_received(&self) -> bool {
        self.direction == Direction::Received
    }
}

/// Parse a whole trace. Blank lines are ignored; any other bad line fails
/// with its 1-based line number.
pub fn parse_trace(text: &str) -> Result<Vec<TraceEntry>, TraceError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| TraceError::Malformed { line: i + 1, source })
        })
        .collect()
}

pub fn read_trace(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    parse_trace(&std::fs::read_to_string(path)?)
}

/// Like [`read_trace`] but skips bad lines with a warning.
pub fn read_trace_lenient(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let text = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(?path, line = i + 1, error = %e, "skipping malformed trace line"),
        }
    }
    Ok(entries)
}
