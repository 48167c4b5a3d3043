//! Deterministic replay of a recorded session.
//!
//! Inbound entries are fed to the responder in trace order; each recorded
//! outbound entry is compared, as parsed JSON, with the next produced output.

use std::collections::VecDeque;
use std::path::Path;

use relay_core::Responder;
use serde_json::Value;
use tracing::{debug, info};

use crate::entry::{read_trace, TraceEntry};
use crate::error::{ReplayError, TraceError};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Inbound entries fed to the responder.
    pub inputs: usize,
    /// Outbound entries that matched.
    pub outputs: usize,
}

/// Replay `entries` against `responder`, stopping at the first divergence.
pub fn replay<R: Responder + ?Sized>(
    entries: &[TraceEntry],
    responder: &R,
) -> Result<ReplayReport, ReplayError> {
    let mut pending: VecDeque<(usize, String)> = VecDeque::new();
    let mut report = ReplayReport::default();
    let mut ordinal = 0;

    for (index, entry) in entries.iter().enumerate() {
        if entry.is_received() {
            report.inputs += 1;
            if let Some(out) = responder.respond_raw(&entry.data) {
                pending.push_back((index, out));
            }
            continue;
        }

        let Some((_, actual)) = pending.pop_front() else {
            return Err(ReplayError::Missing { index, ordinal });
        };
        if !same_payload(&entry.data, &actual) {
            return Err(ReplayError::Mismatch {
                index,
                ordinal,
                expected: entry.data.clone(),
                actual,
            });
        }
        debug!(index, ordinal, "output matched");
        report.outputs += 1;
        ordinal += 1;
    }

    if let Some((index, actual)) = pending.pop_front() {
        return Err(ReplayError::Unexpected {
            index,
            ordinal,
            actual,
        });
    }

    info!(inputs = report.inputs, outputs = report.outputs, "replay matched");
    Ok(report)
}

/// Load a trace file and replay it.
pub fn replay_file<R: Responder + ?Sized>(
    path: &Path,
    responder: &R,
) -> Result<Result<ReplayReport, ReplayError>, TraceError> {
    let entries = read_trace(path)?;
    Ok(replay(&entries, responder))
}

/// Semantic equality: both parse to the same JSON value, or, when either is
/// not JSON, the raw text is identical.
pub fn same_payload(expected: &str, actual: &str) -> bool {
    match (
        serde_json::from_str::<Value>(expected),
        serde_json::from_str::<Value>(actual),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => expected == actual,
    }
}
