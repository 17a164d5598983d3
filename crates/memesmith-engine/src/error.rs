use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use memesmith_contracts::image::DataUrlError;
use thiserror::Error;

/// Failures shared by every call to the remote generative service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("missing credential: set GEMINI_API_KEY or GOOGLE_API_KEY")]
    MissingCredential,
    #[error("request to {endpoint} failed")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("service returned HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("service returned an invalid JSON payload")]
    InvalidJson(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is empty", .path.display())]
    Empty { path: PathBuf },
    #[error("{} is not a recognised image format", .path.display())]
    Unsupported { path: PathBuf },
    #[error("image fetch failed ({url})")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("image fetch failed with HTTP {code} ({url})")]
    Status { url: String, code: u16 },
    #[error("image fetch returned no bytes ({url})")]
    EmptyResponse { url: String },
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("caption response was not a JSON array of strings")]
    Malformed(#[source] serde_json::Error),
    #[error("caption request refused: {0}")]
    Refused(String),
}

#[derive(Debug, Error)]
pub enum EditError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("edit response contained no image{}", detail_suffix(.detail))]
    NoImage { detail: Option<String> },
    #[error("edit response image could not be decoded")]
    Decode(#[source] DataUrlError),
    #[error("edit request refused: {0}")]
    Refused(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|value| format!(" ({value})"))
        .unwrap_or_default()
}

/// Which operation a failure came from, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Acquisition,
    Generation,
    Edit,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Acquisition => "acquisition",
            ErrorKind::Generation => "generation",
            ErrorKind::Edit => "edit",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flattens an error and its sources into one line for the event log.
pub fn error_chain_text(err: &(dyn StdError + 'static), max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut cursor: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(cause) = cursor {
        let text = cause.to_string();
        let trimmed = text.trim();
        if !trimmed.is_empty() && parts.last().map(String::as_str) != Some(trimmed) {
            parts.push(trimmed.to_string());
        }
        cursor = cause.source();
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
