//! Per-session trace recording.
//!
//! [`SessionRecorder`] is the shared factory; each connection gets its own
//! [`SessionRecording`], which runs `start → record* → stop` exactly once.
//! Dropping a recording that was never stopped finalizes it anyway.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use relay_core::SessionId;
use relay_settings::RecorderSettings;
use tracing::{debug, error, info, instrument};

use crate::entry::{Direction, TraceEntry};
use crate::error::TraceError;
use crate::transcript::build_transcript;

const MAX_SUFFIX: u32 = 1000;

#[derive(Clone, Debug)]
pub struct SessionRecorder {
    trace_dir: PathBuf,
    report_dir: PathBuf,
    enabled: bool,
}

impl SessionRecorder {
    pub fn new(trace_dir: impl Into<PathBuf>, report_dir: impl Into<PathBuf>) -> Self {
        Self {
            trace_dir: trace_dir.into(),
            report_dir: report_dir.into(),
            enabled: true,
        }
    }

    /// A recorder whose recordings write nothing.
    pub fn disabled() -> Self {
        Self {
            trace_dir: PathBuf::new(),
            report_dir: PathBuf::new(),
            enabled: false,
        }
    }

    pub fn from_settings(settings: &RecorderSettings) -> Self {
        if settings.enabled {
            Self::new(&settings.trace_dir, &settings.report_dir)
        } else {
            Self::disabled()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn trace_dir(&self) -> &Path {
        &self.trace_dir
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    pub fn start(&self) -> Result<SessionRecording, TraceError> {
        self.start_at(Utc::now())
    }

    /// Start a recording whose id derives from `at`. When the trace file for
    /// that id already exists, `_2`, `_3`, … are tried in turn; the file is
    /// created exclusively so concurrent starts never share one.
    #[instrument(skip(self), fields(trace_dir = ?self.trace_dir))]
    pub fn start_at(&self, at: DateTime<Utc>) -> Result<SessionRecording, TraceError> {
        let base = SessionId::from_clock(at);
        if !self.enabled {
            return Ok(SessionRecording {
                session_id: base,
                sink: None,
                finished: false,
            });
        }

        fs::create_dir_all(&self.trace_dir)?;
        for n in 1..=MAX_SUFFIX {
            let session_id = if n == 1 { base.clone() } else { base.with_suffix(n) };
            let trace_path = self.trace_dir.join(format!("{session_id}.jsonl"));
            match OpenOptions::new().append(true).create_new(true).open(&trace_path) {
                Ok(file) => {
                    info!(session_id = %session_id, path = ?trace_path, "recording started");
                    let report_path = self.report_dir.join(format!("{session_id}.rpt"));
                    return Ok(SessionRecording {
                        session_id,
                        sink: Some(Sink {
                            file,
                            trace_path,
                            report_path,
                            entries: Vec::new(),
                            last_stamp: None,
                        }),
                        finished: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(session_id = %session_id, "trace file exists, trying next suffix");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(TraceError::SessionIdExhausted {
            dir: self.trace_dir.clone(),
            attempts: MAX_SUFFIX,
        })
    }
}

#[derive(Debug)]
struct Sink {
    file: File,
    trace_path: PathBuf,
    report_path: PathBuf,
    entries: Vec<TraceEntry>,
    last_stamp: Option<DateTime<Utc>>,
}

/// One live session log.
#[derive(Debug)]
pub struct SessionRecording {
    session_id: SessionId,
    sink: Option<Sink>,
    finished: bool,
}

impl SessionRecording {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn trace_path(&self) -> Option<&Path> {
        self.sink.as_ref().map(|s| s.trace_path.as_path())
    }

    pub fn report_path(&self) -> Option<&Path> {
        self.sink.as_ref().map(|s| s.report_path.as_path())
    }

    /// Entries recorded so far (always empty for a disabled recording).
    pub fn entries(&self) -> &[TraceEntry] {
        self.sink
            .as_ref()
            .map(|s| s.entries.as_slice())
            .unwrap_or_default()
    }

    /// Append one payload. The line is on disk when this returns.
    pub fn record(&mut self, direction: Direction, raw: &str) -> Result<(), TraceError> {
        self.record_at(direction, raw, Utc::now())
    }

    /// Stamps never go backwards within a session: a wall clock that steps
    /// back reuses the previous stamp.
    pub(crate) fn record_at(
        &mut self,
        direction: Direction,
        raw: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TraceError> {
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        let stamp = sink.last_stamp.map_or(now, |last| last.max(now));
        let entry = TraceEntry::at(direction, raw, stamp);
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        sink.file.write_all(line.as_bytes())?;
        sink.file.flush()?;
        sink.file.sync_data()?;
        sink.entries.push(entry);
        sink.last_stamp = Some(stamp);
        Ok(())
    }

    /// Write the transcript and clear the buffer. Returns the report path
    /// when a transcript was written.
    pub fn stop(mut self) -> Result<Option<PathBuf>, TraceError> {
        self.finalize()
    }

    fn finalize(&mut self) -> Result<Option<PathBuf>, TraceError> {
        if self.finished {
            return Ok(None);
        }
        self.finished = true;

        let Some(sink) = self.sink.as_mut() else {
            return Ok(None);
        };
        let entries = std::mem::take(&mut sink.entries);
        let Some(transcript) = build_transcript(&entries) else {
            info!(session_id = %self.session_id, "empty session, no transcript");
            return Ok(None);
        };

        if let Some(dir) = sink.report_path.parent() {
            fs::create_dir_all(dir)?;
        }
        transcript.write_to(&sink.report_path)?;
        info!(
            session_id = %self.session_id,
            path = ?sink.report_path,
            turns = transcript.lines.len(),
            "transcript saved"
        );
        Ok(Some(sink.report_path.clone()))
    }
}

impl Drop for SessionRecording {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        debug!(session_id = %self.session_id, "finalizing recording on drop");
        if let Err(e) = self.finalize() {
            error!(session_id = %self.session_id, error = %e, "failed to finalize recording");
        }
    }
}
