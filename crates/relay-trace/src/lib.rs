//! # relay-trace
//!
//! Per-session trace logs and their offline consumers.
//!
//! - [`recorder`]: appends every inbound and outbound payload to
//!   `<trace_dir>/<session_id>.jsonl` and writes the transcript on finalize
//! - [`transcript`]: derives `Patient:` / `Listener:` turns from a trace
//! - [`replay`]: re-drives a trace through a [`relay_core::Responder`] and
//!   reports the first divergence

pub mod entry;
pub mod error;
pub mod recorder;
pub mod replay;
pub mod transcript;

pub use entry::{parse_trace, read_trace, read_trace_lenient, Direction, TraceEntry};
pub use error::{ReplayError, TraceError};
pub use recorder::{SessionRecorder, SessionRecording};
pub use replay::{replay, replay_file, ReplayReport};
pub use transcript::{build_transcript, Speaker, Transcript, TranscriptLine};
