//! Sequences user intents into acquisition, caption, and edit operations.
//!
//! The [`Session`] lives behind one mutex. Each operation takes the lock to
//! begin, releases it for the slow call, and takes it again to apply the
//! result, so caption generation and editing can be outstanding together
//! while observers only ever see whole transitions.

use std::sync::{Mutex, MutexGuard, PoisonError};

use memesmith_contracts::events::{EventKind, EventPayload, EventWriter};
use memesmith_contracts::image::EncodedImage;
use memesmith_contracts::session::{Completion, EditorMode, Session, SkipReason};
use serde_json::Value;

use crate::acquisition::{ImageAcquirer, ImageSource};
use crate::error::{error_chain_text, ErrorKind};
use crate::providers::GenerativeClient;

pub const UPLOAD_FAILED: &str = "Failed to upload image.";
pub const TEMPLATE_FAILED: &str = "Failed to load template.";
pub const URL_FAILED: &str = "Failed to load image from URL.";
pub const CAPTIONS_FAILED: &str = "Failed to generate captions. AI might be busy.";
pub const EDIT_FAILED: &str = "Failed to edit image. Ensure your prompt is clear.";

const ERROR_DETAIL_MAX_CHARS: usize = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Nothing was requested and the session is unchanged.
    Skipped(SkipReason),
    /// The session now carries a `last_error`.
    Failed(ErrorKind),
    /// The result arrived after a reset or re-acquisition and was dropped.
    Discarded,
}

pub struct Orchestrator {
    session: Mutex<Session>,
    client: Box<dyn GenerativeClient>,
    acquirer: ImageAcquirer,
    events: Option<EventWriter>,
}

impl Orchestrator {
    pub fn new(client: Box<dyn GenerativeClient>) -> Self {
        Self {
            session: Mutex::new(Session::new()),
            client,
            acquirer: ImageAcquirer::new(),
            events: None,
        }
    }

    pub fn with_acquirer(mut self, acquirer: ImageAcquirer) -> Self {
        self.acquirer = acquirer;
        self
    }

    /// Attaches the event log and records `session_started`.
    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        let mut payload = EventPayload::new();
        payload.insert(
            "client".to_string(),
            Value::String(self.client.name().to_string()),
        );
        self.emit(EventKind::SessionStarted, payload);
        self
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    pub fn snapshot(&self) -> Session {
        self.lock().clone()
    }

    pub fn acquire(&self, source: &ImageSource) -> Outcome {
        self.lock().begin_acquire();
        match self.acquirer.acquire(source) {
            Ok(image) => {
                self.lock().complete_acquire(image.clone());
                let mut payload = image_fields(&image);
                insert_source(&mut payload, source);
                self.emit(EventKind::ImageAcquired, payload);
                Outcome::Applied
            }
            Err(err) => {
                let message = match source {
                    ImageSource::File(_) => UPLOAD_FAILED,
                    ImageSource::Url(_) => URL_FAILED,
                    ImageSource::Template(_) => TEMPLATE_FAILED,
                };
                self.lock().fail_acquire(message);
                let mut payload = EventPayload::new();
                insert_source(&mut payload, source);
                insert_error(&mut payload, &error_chain_text(&err, ERROR_DETAIL_MAX_CHARS));
                self.emit(EventKind::AcquisitionFailed, payload);
                Outcome::Failed(ErrorKind::Acquisition)
            }
        }
    }

    pub fn generate_captions(&self) -> Outcome {
        let begun = self.lock().begin_captions();
        let ticket = match begun {
            Ok(ticket) => ticket,
            Err(reason) => return self.skipped("captions", reason),
        };
        let mut payload = image_fields(&ticket.image);
        payload.insert("epoch".to_string(), Value::from(ticket.epoch));
        self.emit(EventKind::CaptionsRequested, payload);

        match self.client.suggest_captions(&ticket.image) {
            Ok(captions) => {
                let completion = self
                    .lock()
                    .complete_captions(ticket.epoch, Ok(captions.clone()));
                if completion == Completion::Stale {
                    return self.discarded("captions", ticket.epoch);
                }
                let mut payload = EventPayload::new();
                payload.insert("count".to_string(), Value::from(captions.len()));
                payload.insert(
                    "captions".to_string(),
                    Value::Array(captions.into_iter().map(Value::String).collect()),
                );
                self.emit(EventKind::CaptionsGenerated, payload);
                Outcome::Applied
            }
            Err(err) => {
                let completion = self
                    .lock()
                    .complete_captions(ticket.epoch, Err(CAPTIONS_FAILED.to_string()));
                if completion == Completion::Stale {
                    return self.discarded("captions", ticket.epoch);
                }
                let mut payload = EventPayload::new();
                insert_error(&mut payload, &error_chain_text(&err, ERROR_DETAIL_MAX_CHARS));
                self.emit(EventKind::CaptionsFailed, payload);
                Outcome::Failed(ErrorKind::Generation)
            }
        }
    }

    /// Edits apply to the current image, so successive edits compound.
    pub fn edit_image(&self, instruction: &str) -> Outcome {
        let begun = self.lock().begin_edit(instruction);
        let ticket = match begun {
            Ok(ticket) => ticket,
            Err(reason) => return self.skipped("edit", reason),
        };
        let instruction = instruction.trim();
        let mut payload = image_fields(&ticket.image);
        payload.insert("epoch".to_string(), Value::from(ticket.epoch));
        payload.insert(
            "instruction".to_string(),
            Value::String(instruction.to_string()),
        );
        self.emit(EventKind::EditRequested, payload);

        match self.client.apply_edit(&ticket.image, instruction) {
            Ok(edited) => {
                let completion = self.lock().complete_edit(ticket.epoch, Ok(edited.clone()));
                if completion == Completion::Stale {
                    return self.discarded("edit", ticket.epoch);
                }
                self.emit(EventKind::EditApplied, image_fields(&edited));
                Outcome::Applied
            }
            Err(err) => {
                let completion = self
                    .lock()
                    .complete_edit(ticket.epoch, Err(EDIT_FAILED.to_string()));
                if completion == Completion::Stale {
                    return self.discarded("edit", ticket.epoch);
                }
                let mut payload = EventPayload::new();
                insert_error(&mut payload, &error_chain_text(&err, ERROR_DETAIL_MAX_CHARS));
                self.emit(EventKind::EditFailed, payload);
                Outcome::Failed(ErrorKind::Edit)
            }
        }
    }

    pub fn reset(&self) -> Outcome {
        let restored = self.lock().reset();
        if !restored {
            return self.skipped("reset", SkipReason::NoImage);
        }
        self.emit(EventKind::SessionReset, EventPayload::new());
        Outcome::Applied
    }

    pub fn select_caption(&self, text: &str) -> Outcome {
        self.lock().select_caption(text);
        let mut payload = EventPayload::new();
        payload.insert("caption".to_string(), Value::String(text.to_string()));
        self.emit(EventKind::CaptionSelected, payload);
        Outcome::Applied
    }

    pub fn set_mode(&self, mode: EditorMode) -> Outcome {
        self.lock().set_mode(mode);
        let mut payload = EventPayload::new();
        payload.insert("mode".to_string(), Value::String(mode.as_str().to_string()));
        self.emit(EventKind::ModeChanged, payload);
        Outcome::Applied
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        // Session transitions never panic midway, so a poisoned lock still holds a whole state.
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn skipped(&self, operation: &str, reason: SkipReason) -> Outcome {
        let mut payload = EventPayload::new();
        payload.insert(
            "operation".to_string(),
            Value::String(operation.to_string()),
        );
        payload.insert("reason".to_string(), Value::String(reason.as_str().to_string()));
        self.emit(EventKind::RequestSkipped, payload);
        Outcome::Skipped(reason)
    }

    fn discarded(&self, operation: &str, epoch: u64) -> Outcome {
        let mut payload = EventPayload::new();
        payload.insert(
            "operation".to_string(),
            Value::String(operation.to_string()),
        );
        payload.insert("epoch".to_string(), Value::from(epoch));
        self.emit(EventKind::CompletionDiscarded, payload);
        Outcome::Discarded
    }

    fn emit(&self, kind: EventKind, payload: EventPayload) {
        if let Some(events) = &self.events {
            // The event log is advisory; a failed write never changes an outcome.
            let _ = events.emit(kind, payload);
        }
    }
}

fn image_fields(image: &EncodedImage) -> EventPayload {
    let mut payload = EventPayload::new();
    payload.insert(
        "mime_type".to_string(),
        Value::String(image.mime_type().to_string()),
    );
    payload.insert("bytes".to_string(), Value::from(image.len()));
    payload.insert("digest".to_string(), Value::String(image.digest()));
    payload
}

fn insert_source(payload: &mut EventPayload, source: &ImageSource) {
    payload.insert(
        "source".to_string(),
        Value::String(source.kind().to_string()),
    );
    payload.insert("origin".to_string(), Value::String(source.to_string()));
}

fn insert_error(payload: &mut EventPayload, detail: &str) {
    payload.insert("error".to_string(), Value::String(detail.to_string()));
}
