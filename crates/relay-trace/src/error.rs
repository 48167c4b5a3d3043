use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("malformed trace entry at line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("no free session id in {dir} after {attempts} attempts")]
    SessionIdExhausted { dir: PathBuf, attempts: u32 },
}

/// First point at which a replay diverged from its recording.
///
/// `index` is the position in the trace; `ordinal` counts outbound entries
/// (and produced outputs) from zero.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReplayError {
    #[error("output #{ordinal} (trace entry {index}) differs: expected {expected}, got {actual}")]
    Mismatch {
        index: usize,
        ordinal: usize,
        expected: String,
        actual: String,
    },

    #[error("output #{ordinal} (trace entry {index}) was recorded but nothing was produced")]
    Missing { index: usize, ordinal: usize },

    #[error("output #{ordinal} (after trace entry {index}) was produced but never recorded: {actual}")]
    Unexpected {
        index: usize,
        ordinal: usize,
        actual: String,
    },
}

impl ReplayError {
    pub fn index(&self) -> usize {
        match self {
            Self::Mismatch { index, .. } | Self::Missing { index, .. } | Self::Unexpected { index, .. } => {
                *index
            }
        }
    }

    pub fn ordinal(&self) -> usize {
        match self {
            Self::Mismatch { ordinal, .. }
            | Self::Missing { ordinal, .. }
            | Self::Unexpected { ordinal, .. } => *ordinal,
        }
    }
}
