//! Speaker-turn summary of a finished session.
//!
//! ```text
//! Datetime: 2024-05-01T09:30:12+00:00
//! SessionId: abc
//! Patient: Hello
//! Listener: Hi there
//! ```

use std::fmt;
use std::path::Path;

use relay_core::{message::names, Envelope};
use tracing::debug;

use crate::entry::TraceEntry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Speaker {
    /// The person talking to the avatar (finalized speech recognition).
    Patient,
    /// The avatar side (`conversationResult` input text).
    Listener,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Patient => write!(f, "Patient"),
            Self::Listener => write!(f, "Listener"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TranscriptLine {
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transcript {
    /// Timestamp of the first trace entry.
    pub started_at: String,
    /// `dataCollector` of the first entry; empty when it has none.
    pub collector: String,
    pub lines: Vec<TranscriptLine>,
}

impl Transcript {
    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.render())
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Datetime: {}", self.started_at)?;
        writeln!(f, "SessionId: {}", self.collector)?;
        for line in &self.lines {
            writeln!(f, "{}: {}", line.speaker, line.text)?;
        }
        Ok(())
    }
}

/// Build the transcript for a trace. `None` for an empty trace.
///
/// Entries whose payload does not parse are skipped, as are entries with
/// nothing to say.
pub fn build_transcript(entries: &[TraceEntry]) -> Option<Transcript> {
    let first = entries.first()?;
    let collector = Envelope::parse(&first.data)
        .ok()
        .and_then(|e| e.data_collector().map(str::to_owned))
        .unwrap_or_default();

    let lines = entries
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| match Envelope::parse(&entry.data) {
            Ok(envelope) => turn(&envelope),
            Err(e) => {
                debug!(index = i, error = %e, "skipping unparsable trace entry");
                None
            }
        })
        .collect();

    Some(Transcript {
        started_at: first.timestamp.clone(),
        collector,
        lines,
    })
}

fn turn(envelope: &Envelope) -> Option<TranscriptLine> {
    let (speaker, text) = if envelope.name == names::CONVERSATION_RESULT {
        (Speaker::Listener, envelope.input_text()?)
    } else {
        (Speaker::Patient, envelope.user_text()?)
    };
    (!text.is_empty()).then(|| TranscriptLine {
        speaker,
        text: text.to_owned(),
    })
}
