use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

const DATA_URL_SCHEME: &str = "data:";
const BASE64_DATA_MARKER: &str = ";base64,";

/// Every event a memesmith session records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SessionStarted,
    ModelSelected,
    ImageAcquired,
    AcquisitionFailed,
    CaptionsRequested,
    CaptionsGenerated,
    CaptionsFailed,
    EditRequested,
    EditApplied,
    EditFailed,
    RequestSkipped,
    CompletionDiscarded,
    SessionReset,
    CaptionSelected,
    ModeChanged,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionStarted => "session_started",
            Self::ModelSelected => "model_selected",
            Self::ImageAcquired => "image_acquired",
            Self::AcquisitionFailed => "acquisition_failed",
            Self::CaptionsRequested => "captions_requested",
            Self::CaptionsGenerated => "captions_generated",
            Self::CaptionsFailed => "captions_failed",
            Self::EditRequested => "edit_requested",
            Self::EditApplied => "edit_applied",
            Self::EditFailed => "edit_failed",
            Self::RequestSkipped => "request_skipped",
            Self::CompletionDiscarded => "completion_discarded",
            Self::SessionReset => "session_reset",
            Self::CaptionSelected => "caption_selected",
            Self::ModeChanged => "mode_changed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only writer for a session's `events.jsonl`.
///
/// Each line is one compact JSON object: the caller's payload plus the
/// envelope fields `type`, `session_id` and `ts`, which always win over
/// payload keys of the same name. Base64 data URLs anywhere in the payload
/// are cut down to their MIME prefix, so image content never reaches the log.
///
/// Clones share one file lock, so worker threads can emit concurrently.
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

    pub fn emit(&self, kind: EventKind, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Value::Object(payload);
        redact_data_urls(&mut event);
        if let Value::Object(fields) = &mut event {
            fields.insert("type".to_string(), Value::String(kind.as_str().to_string()));
            fields.insert(
                "session_id".to_string(),
                Value::String(self.inner.session_id.clone()),
            );
            fields.insert("ts".to_string(), Value::String(now_utc_iso()));
        }
        self.append(&event)?;
        Ok(event)
    }

    fn append(&self, event: &Value) -> anyhow::Result<()> {
        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?
            .write_all(line.as_bytes())?;
        Ok(())
    }
}

fn redact_data_urls(value: &mut Value) {
    match value {
        Value::String(text) => {
            if let Some(redacted) = redact_text(text) {
                *text = redacted;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_data_urls),
        Value::Object(fields) => fields.values_mut().for_each(redact_data_urls),
        _ => {}
    }
}

/// Replaces the payload of every `data:<mime>;base64,<payload>` run in
/// `text` with a length note. `None` when nothing was replaced.
fn redact_text(text: &str) -> Option<String> {
    if !text.contains(DATA_URL_SCHEME) {
        return None;
    }
    let mut redacted = String::with_capacity(text.len());
    let mut rest = text;
    let mut changed = false;
    while let Some(start) = rest.find(DATA_URL_SCHEME) {
        let (before, candidate) = rest.split_at(start);
        redacted.push_str(before);

        let marker = candidate.find(BASE64_DATA_MARKER).filter(|&end| {
            !candidate[..end].contains(|c: char| c == ',' || c.is_whitespace())
        });
        let Some(marker) = marker else {
            redacted.push_str(DATA_URL_SCHEME);
            rest = &candidate[DATA_URL_SCHEME.len()..];
            continue;
        };

        let payload_start = marker + BASE64_DATA_MARKER.len();
        let payload = &candidate[payload_start..];
        let payload_len = payload
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')))
            .unwrap_or(payload.len());
        redacted.push_str(&candidate[..payload_start]);
        redacted.push_str(&format!("<{payload_len} base64 chars omitted>"));
        rest = &payload[payload_len..];
        changed = true;
    }
    redacted.push_str(rest);
    changed.then_some(redacted)
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
