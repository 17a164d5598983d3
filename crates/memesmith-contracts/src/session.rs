//! Editing-session state and its transitions.
//!
//! Every mutation is a synchronous method on [`Session`]; the orchestrator
//! applies them under a single lock so observers never see a half-applied
//! transition. Asynchronous work is split into a `begin_*` step that hands
//! out a ticket and a `complete_*` step that applies the result.

use std::fmt;
use std::str::FromStr;

use crate::image::EncodedImage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditorMode {
    #[default]
    Caption,
    Edit,
}

impl EditorMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EditorMode::Caption => "caption",
            EditorMode::Edit => "edit",
        }
    }
}

impl fmt::Display for EditorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditorMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "caption" | "captions" => Ok(EditorMode::Caption),
            "edit" | "editor" => Ok(EditorMode::Edit),
            other => Err(format!("unknown mode '{other}' (expected caption or edit)")),
        }
    }
}

/// Why a `begin_*` transition refused to start a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoImage,
    AlreadyInFlight,
    EmptyInstruction,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::NoImage => "no_image",
            SkipReason::AlreadyInFlight => "already_in_flight",
            SkipReason::EmptyInstruction => "empty_instruction",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of applying a completion to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Failed,
    /// The session was re-acquired or reset while the request was out.
    Stale,
}

/// Snapshot handed to an outstanding caption or edit request.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    pub image: EncodedImage,
    pub epoch: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    original_image: Option<EncodedImage>,
    current_image: Option<EncodedImage>,
    selected_caption: String,
    generated_captions: Vec<String>,
    generation_in_flight: bool,
    edit_in_flight: bool,
    last_error: Option<String>,
    mode: EditorMode,
    epoch: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn original_image(&self) -> Option<&EncodedImage> {
        self.original_image.as_ref()
    }

    pub fn current_image(&self) -> Option<&EncodedImage> {
        self.current_image.as_ref()
    }

    pub fn selected_caption(&self) -> &str {
        &self.selected_caption
    }

    pub fn generated_captions(&self) -> &[String] {
        &self.generated_captions
    }

    pub fn generation_in_flight(&self) -> bool {
        self.generation_in_flight
    }

    pub fn edit_in_flight(&self) -> bool {
        self.edit_in_flight
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn has_image(&self) -> bool {
        self.current_image.is_some()
    }

    /// Text drawn over the displayed image, if any.
    pub fn overlay_caption(&self) -> Option<&str> {
        if self.current_image.is_none() || self.selected_caption.is_empty() {
            return None;
        }
        Some(&self.selected_caption)
    }

    pub fn begin_acquire(&mut self) {
        self.last_error = None;
    }

    /// A new image replaces the whole session context.
    pub fn complete_acquire(&mut self, image: EncodedImage) {
        self.original_image = Some(image.clone());
        self.current_image = Some(image);
        self.generated_captions.clear();
        self.selected_caption.clear();
        self.last_error = None;
        self.epoch += 1;
    }

    /// Leaves any existing working image untouched.
    pub fn fail_acquire(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Why [`Session::begin_captions`] would refuse right now, if it would.
    pub fn caption_skip_reason(&self) -> Option<SkipReason> {
        if self.current_image.is_none() {
            return Some(SkipReason::NoImage);
        }
        self.generation_in_flight.then_some(SkipReason::AlreadyInFlight)
    }

    /// Why [`Session::begin_edit`] would refuse `instruction` right now, if it would.
    pub fn edit_skip_reason(&self, instruction: &str) -> Option<SkipReason> {
        if self.current_image.is_none() {
            return Some(SkipReason::NoImage);
        }
        if self.edit_in_flight {
            return Some(SkipReason::AlreadyInFlight);
        }
        instruction
            .trim()
            .is_empty()
            .then_some(SkipReason::EmptyInstruction)
    }

    pub fn begin_captions(&mut self) -> Result<RequestTicket, SkipReason> {
        if let Some(reason) = self.caption_skip_reason() {
            return Err(reason);
        }
        let Some(image) = self.current_image.clone() else {
            return Err(SkipReason::NoImage);
        };
        self.generation_in_flight = true;
        self.last_error = None;
        Ok(RequestTicket {
            image,
            epoch: self.epoch,
        })
    }

    pub fn complete_captions(
        &mut self,
        ticket_epoch: u64,
        result: Result<Vec<String>, String>,
    ) -> Completion {
        self.generation_in_flight = false;
        if ticket_epoch != self.epoch {
            return Completion::Stale;
        }
        match result {
            Ok(captions) => {
                self.generated_captions = captions;
                Completion::Applied
            }
            Err(message) => {
                self.last_error = Some(message);
                Completion::Failed
            }
        }
    }

    pub fn begin_edit(&mut self, instruction: &str) -> Result<RequestTicket, SkipReason> {
        if let Some(reason) = self.edit_skip_reason(instruction) {
            return Err(reason);
        }
        let Some(image) = self.current_image.clone() else {
            return Err(SkipReason::NoImage);
        };
        self.edit_in_flight = true;
        self.last_error = None;
        Ok(RequestTicket {
            image,
            epoch: self.epoch,
        })
    }

    /// Edits compound: a successful result becomes the new working image,
    /// and the selected caption survives.
    pub fn complete_edit(
        &mut self,
        ticket_epoch: u64,
        result: Result<EncodedImage, String>,
    ) -> Completion {
        self.edit_in_flight = false;
        if ticket_epoch != self.epoch {
            return Completion::Stale;
        }
        match result {
            Ok(image) => {
                self.current_image = Some(image);
                Completion::Applied
            }
            Err(message) => {
                self.last_error = Some(message);
                Completion::Failed
            }
        }
    }

    /// Returns `false` (and changes nothing) when no image was ever acquired.
    pub fn reset(&mut self) -> bool {
        let Some(original) = self.original_image.clone() else {
            return false;
        };
        self.current_image = Some(original);
        self.generated_captions.clear();
        self.selected_caption.clear();
        self.epoch += 1;
        true
    }

    pub fn select_caption(&mut self, text: impl Into<String>) {
        self.selected_caption = text.into();
    }

    pub fn set_mode(&mut self, mode: EditorMode) {
        self.mode = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg(tag: &[u8]) -> EncodedImage {
        EncodedImage::new("image/jpeg", tag.to_vec())
    }

    fn session_with_image() -> Session {
        let mut session = Session::new();
        session.complete_acquire(jpeg(b"original"));
        session
    }

    #[test]
    fn new_session_is_empty() {
        let session = Session::new();
        assert!(session.original_image().is_none());
        assert!(session.current_image().is_none());
        assert_eq!(session.selected_caption(), "");
        assert!(session.generated_captions().is_empty());
        assert!(!session.generation_in_flight());
        assert!(!session.edit_in_flight());
        assert!(session.last_error().is_none());
        assert_eq!(session.mode(), EditorMode::Caption);
    }

    #[test]
    fn acquisition_resets_derived_state() {
        let mut session = session_with_image();
        let ticket = session.begin_captions().unwrap();
        session.complete_captions(ticket.epoch, Ok(vec!["a".to_string(), "b".to_string()]));
        session.select_caption("a");
        session.fail_acquire("Failed to load template.");

        session.begin_acquire();
        session.complete_acquire(jpeg(b"next"));

        assert_eq!(session.original_image(), Some(&jpeg(b"next")));
        assert_eq!(session.current_image(), session.original_image());
        assert!(session.generated_captions().is_empty());
        assert_eq!(session.selected_caption(), "");
        assert!(session.last_error().is_none());
    }

    #[test]
    fn failed_acquisition_keeps_working_image() {
        let mut session = session_with_image();
        session.begin_acquire();
        session.fail_acquire("Failed to upload image.");
        assert_eq!(session.current_image(), Some(&jpeg(b"original")));
        assert_eq!(session.last_error(), Some("Failed to upload image."));
    }

    #[test]
    fn caption_request_requires_image() {
        let mut session = Session::new();
        let before = session.clone();
        assert_eq!(session.begin_captions().unwrap_err(), SkipReason::NoImage);
        assert_eq!(session, before);
    }

    #[test]
    fn second_caption_request_is_rejected_while_first_is_out() {
        let mut session = session_with_image();
        let first = session.begin_captions().unwrap();
        assert!(session.generation_in_flight());
        assert_eq!(
            session.begin_captions().unwrap_err(),
            SkipReason::AlreadyInFlight
        );

        let outcome = session.complete_captions(first.epoch, Ok(vec!["x".to_string()]));
        assert_eq!(outcome, Completion::Applied);
        assert!(!session.generation_in_flight());
        assert!(session.begin_captions().is_ok());
    }

    #[test]
    fn caption_failure_keeps_previous_captions() {
        let mut session = session_with_image();
        let ticket = session.begin_captions().unwrap();
        session.complete_captions(ticket.epoch, Ok(vec!["keep".to_string()]));

        let ticket = session.begin_captions().unwrap();
        let outcome = session.complete_captions(ticket.epoch, Err("busy".to_string()));
        assert_eq!(outcome, Completion::Failed);
        assert_eq!(session.generated_captions(), ["keep".to_string()]);
        assert_eq!(session.last_error(), Some("busy"));
        assert!(!session.generation_in_flight());
    }

    #[test]
    fn edit_guards_reject_without_mutation() {
        let mut empty = Session::new();
        assert_eq!(empty.begin_edit("add hat").unwrap_err(), SkipReason::NoImage);

        let mut session = session_with_image();
        let before = session.clone();
        assert_eq!(
            session.begin_edit("").unwrap_err(),
            SkipReason::EmptyInstruction
        );
        assert_eq!(
            session.begin_edit("   \t").unwrap_err(),
            SkipReason::EmptyInstruction
        );
        assert_eq!(session, before);

        session.begin_edit("add hat").unwrap();
        assert_eq!(
            session.begin_edit("add scarf").unwrap_err(),
            SkipReason::AlreadyInFlight
        );
    }

    #[test]
    fn skip_reasons_predict_begin_without_mutation() {
        let empty = Session::new();
        assert_eq!(empty.caption_skip_reason(), Some(SkipReason::NoImage));
        assert_eq!(empty.edit_skip_reason("hat"), Some(SkipReason::NoImage));

        let mut session = session_with_image();
        assert_eq!(session.caption_skip_reason(), None);
        assert_eq!(session.edit_skip_reason("hat"), None);
        assert_eq!(session.edit_skip_reason("  "), Some(SkipReason::EmptyInstruction));

        let before = session.clone();
        let _ = (session.caption_skip_reason(), session.edit_skip_reason("hat"));
        assert_eq!(session, before);

        assert!(session.begin_captions().is_ok());
        assert_eq!(session.caption_skip_reason(), Some(SkipReason::AlreadyInFlight));
        assert_eq!(session.edit_skip_reason("hat"), None);

        assert!(session.begin_edit("hat").is_ok());
        assert_eq!(session.edit_skip_reason("hat"), Some(SkipReason::AlreadyInFlight));
        assert_eq!(session.edit_skip_reason(""), Some(SkipReason::AlreadyInFlight));
    }

    #[test]
    fn successful_edit_replaces_current_and_keeps_caption() {
        let mut session = session_with_image();
        session.select_caption("when the code compiles");
        let ticket = session.begin_edit("add sunglasses").unwrap();
        assert_eq!(ticket.image, jpeg(b"original"));

        let outcome = session.complete_edit(ticket.epoch, Ok(jpeg(b"edited")));
        assert_eq!(outcome, Completion::Applied);
        assert_eq!(session.current_image(), Some(&jpeg(b"edited")));
        assert_eq!(session.original_image(), Some(&jpeg(b"original")));
        assert_eq!(session.selected_caption(), "when the code compiles");
        assert!(!session.edit_in_flight());
    }

    #[test]
    fn edits_compound_on_current_image() {
        let mut session = session_with_image();
        let ticket = session.begin_edit("step one").unwrap();
        session.complete_edit(ticket.epoch, Ok(jpeg(b"one")));
        let ticket = session.begin_edit("step two").unwrap();
        assert_eq!(ticket.image, jpeg(b"one"));
    }

    #[test]
    fn failed_edit_preserves_current_image() {
        let mut session = session_with_image();
        let ticket = session.begin_edit("add sunglasses").unwrap();
        session.complete_edit(ticket.epoch, Ok(jpeg(b"edited")));

        let ticket = session.begin_edit("remove background").unwrap();
        let outcome = session.complete_edit(ticket.epoch, Err("no image".to_string()));
        assert_eq!(outcome, Completion::Failed);
        assert_eq!(session.current_image(), Some(&jpeg(b"edited")));
        assert_eq!(session.last_error(), Some("no image"));
        assert!(!session.edit_in_flight());
    }

    #[test]
    fn reset_restores_original() {
        let mut session = session_with_image();
        let ticket = session.begin_edit("add sunglasses").unwrap();
        session.complete_edit(ticket.epoch, Ok(jpeg(b"edited")));
        let ticket = session.begin_captions().unwrap();
        session.complete_captions(ticket.epoch, Ok(vec!["a".to_string()]));
        session.select_caption("a");

        assert!(session.reset());
        assert_eq!(session.current_image(), session.original_image());
        assert!(session.generated_captions().is_empty());
        assert_eq!(session.selected_caption(), "");
    }

    #[test]
    fn reset_without_original_is_noop() {
        let mut session = Session::new();
        session.select_caption("orphan");
        let before = session.clone();
        assert!(!session.reset());
        assert_eq!(session, before);
    }

    #[test]
    fn completions_after_reset_are_discarded() {
        let mut session = session_with_image();
        let caption_ticket = session.begin_captions().unwrap();
        let edit_ticket = session.begin_edit("add hat").unwrap();
        session.reset();

        let caption = session.complete_captions(caption_ticket.epoch, Ok(vec!["late".to_string()]));
        let edit = session.complete_edit(edit_ticket.epoch, Err("late failure".to_string()));
        assert_eq!(caption, Completion::Stale);
        assert_eq!(edit, Completion::Stale);
        assert!(session.generated_captions().is_empty());
        assert!(session.last_error().is_none());
        assert!(!session.generation_in_flight());
        assert!(!session.edit_in_flight());
        assert_eq!(session.current_image(), Some(&jpeg(b"original")));
    }

    #[test]
    fn select_caption_accepts_any_text() {
        let mut session = session_with_image();
        session.select_caption("not one of the suggestions");
        assert_eq!(session.selected_caption(), "not one of the suggestions");
        assert_eq!(session.overlay_caption(), Some("not one of the suggestions"));

        session.select_caption("");
        assert_eq!(session.overlay_caption(), None);
    }

    #[test]
    fn mode_switch_leaves_requests_alone() {
        let mut session = session_with_image();
        session.begin_captions().unwrap();
        session.set_mode(EditorMode::Edit);
        assert_eq!(session.mode(), EditorMode::Edit);
        assert!(session.generation_in_flight());
    }

    #[test]
    fn editor_mode_parses_case_insensitively() {
        assert_eq!("CAPTION".parse::<EditorMode>(), Ok(EditorMode::Caption));
        assert_eq!(" Edit ".parse::<EditorMode>(), Ok(EditorMode::Edit));
        assert!("draw".parse::<EditorMode>().is_err());
    }
}
