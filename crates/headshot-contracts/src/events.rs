use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::backdrop::Backdrop;

/// Everything a session records in its journal. Serialized with the variant
/// name in `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    ImageSelected {
        mime_type: String,
        bytes: usize,
    },
    PromptRejected {
        style: String,
    },
    GenerationStarted {
        token: u64,
        style: String,
        prompt_chars: usize,
    },
    GenerationSucceeded {
        token: u64,
        mime_type: String,
        bytes: usize,
    },
    GenerationFailed {
        token: u64,
        kind: String,
        message: String,
    },
    GenerationDiscarded {
        token: u64,
    },
    TryAgain {
        style: String,
    },
    SessionReset {
        token: u64,
    },
    BackgroundEditOpened {
        entry: u64,
    },
    BackgroundEditStarted {
        entry: u64,
        attempt: u64,
    },
    BackgroundEditFinished {
        entry: u64,
        attempt: u64,
        state: String,
        message: Option<String>,
    },
    BackgroundEditDiscarded {
        entry: u64,
        attempt: u64,
    },
    BackgroundEditCancelled,
    BackgroundEditClosed,
    BackgroundEditDownloaded {
        file_name: String,
        backdrop: Backdrop,
    },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::ImageSelected { .. } => "image_selected",
            SessionEvent::PromptRejected { .. } => "prompt_rejected",
            SessionEvent::GenerationStarted { .. } => "generation_started",
            SessionEvent::GenerationSucceeded { .. } => "generation_succeeded",
            SessionEvent::GenerationFailed { .. } => "generation_failed",
            SessionEvent::GenerationDiscarded { .. } => "generation_discarded",
            SessionEvent::TryAgain { .. } => "try_again",
            SessionEvent::SessionReset { .. } => "session_reset",
            SessionEvent::BackgroundEditOpened { .. } => "background_edit_opened",
            SessionEvent::BackgroundEditStarted { .. } => "background_edit_started",
            SessionEvent::BackgroundEditFinished { .. } => "background_edit_finished",
            SessionEvent::BackgroundEditDiscarded { .. } => "background_edit_discarded",
            SessionEvent::BackgroundEditCancelled => "background_edit_cancelled",
            SessionEvent::BackgroundEditClosed => "background_edit_closed",
            SessionEvent::BackgroundEditDownloaded { .. } => "background_edit_downloaded",
        }
    }

    /// Token of the generation this event belongs to, if any.
    pub fn generation_token(&self) -> Option<u64> {
        match self {
            SessionEvent::GenerationStarted { token, .. }
            | SessionEvent::GenerationSucceeded { token, .. }
            | SessionEvent::GenerationFailed { token, .. }
            | SessionEvent::GenerationDiscarded { token } => Some(*token),
            _ => None,
        }
    }
}

/// One journal line: the event flattened next to the session id and an
/// RFC 3339 timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub session_id: String,
    pub ts: String,
    #[serde(flatten)]
    pub event: SessionEvent,
}

/// Append-only session journal (`events.jsonl`), one compact record per line.
/// Clones share the same file lock.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    session_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn emit(&self, event: SessionEvent) -> anyhow::Result<JournalRecord> {
        let record = JournalRecord {
            session_id: self.inner.session_id.clone(),
            ts: now_utc_iso(),
            event,
        };
        let line = serde_json::to_string(&record)
            .with_context(|| format!("failed to encode {} event", record.event.name()))?;

        if let Some(parent) = self.inner.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(record)
    }
}

/// Reads a journal back. Blank lines are skipped; a malformed line fails with
/// its line number.
pub fn read_journal(path: &Path) -> anyhow::Result<Vec<JournalRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read journal {}", path.display()))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: malformed journal line", path.display(), index + 1))
        })
        .collect()
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::Value;

    use super::*;

    #[test]
    fn emit_writes_tagged_record() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123");

        let emitted = writer.emit(SessionEvent::GenerationStarted {
            token: 3,
            style: "corporate-grey".to_string(),
            prompt_chars: 120,
        })?;

        let content = fs::read_to_string(&path)?;
        let parsed: Value = serde_json::from_str(content.lines().next().unwrap_or(""))?;
        assert_eq!(parsed["type"], "generation_started");
        assert_eq!(parsed["session_id"], "session-123");
        assert_eq!(parsed["style"], "corporate-grey");
        assert_eq!(parsed["token"], 3);
        DateTime::parse_from_rfc3339(parsed["ts"].as_str().unwrap_or(""))?;
        assert_eq!(emitted.event.generation_token(), Some(3));
        Ok(())
    }

    #[test]
    fn unit_events_carry_only_the_type() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        EventWriter::new(&path, "s").emit(SessionEvent::BackgroundEditClosed)?;

        let parsed: Value = serde_json::from_str(fs::read_to_string(&path)?.trim())?;
        let mut keys: Vec<&str> = parsed
            .as_object()
            .map(|object| object.keys().map(String::as_str).collect())
            .unwrap_or_default();
        keys.sort_unstable();
        assert_eq!(keys, vec!["session_id", "ts", "type"]);
        Ok(())
    }

    #[test]
    fn serialized_type_matches_name() -> anyhow::Result<()> {
        let events = [
            SessionEvent::TryAgain {
                style: "custom".to_string(),
            },
            SessionEvent::BackgroundEditCancelled,
            SessionEvent::BackgroundEditDownloaded {
                file_name: "headshot-white-1.jpg".to_string(),
                backdrop: Backdrop::White,
            },
        ];
        for event in events {
            let value = serde_json::to_value(&event)?;
            assert_eq!(value["type"], event.name());
        }
        Ok(())
    }

    #[test]
    fn journal_round_trips_through_reader() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("events.jsonl");
        let writer = EventWriter::new(&path, "session-9");

        writer.emit(SessionEvent::ImageSelected {
            mime_type: "image/jpeg".to_string(),
            bytes: 2048,
        })?;
        writer.emit(SessionEvent::BackgroundEditFinished {
            entry: 1,
            attempt: 2,
            state: "failed".to_string(),
            message: Some("blocked".to_string()),
        })?;

        let records = read_journal(&path)?;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|record| record.session_id == "session-9"));
        assert_eq!(records[0].event.name(), "image_selected");
        assert_eq!(
            records[1].event,
            SessionEvent::BackgroundEditFinished {
                entry: 1,
                attempt: 2,
                state: "failed".to_string(),
                message: Some("blocked".to_string()),
            }
        );
        Ok(())
    }

    #[test]
    fn malformed_line_reports_position() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        fs::write(&path, "\n{\"type\":\"teleported\"}\n")?;
        let err = read_journal(&path).err().map(|err| format!("{err:#}"));
        assert!(err.unwrap_or_default().contains(":2:"));
        Ok(())
    }
}
