use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use memesmith_contracts::image::{EncodedImage, DEFAULT_MIME_TYPE};
use memesmith_contracts::templates::find_template;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;

use crate::error::AcquisitionError;

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    File(PathBuf),
    Url(String),
    /// Catalog id (or name) resolved through the template catalog.
    Template(String),
}

impl ImageSource {
    pub fn kind(&self) -> &'static str {
        match self {
            ImageSource::File(_) => "file",
            ImageSource::Url(_) => "url",
            ImageSource::Template(_) => "template",
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::File(path) => write!(f, "{}", path.display()),
            ImageSource::Url(url) => f.write_str(url),
            ImageSource::Template(id) => write!(f, "template {id}"),
        }
    }
}

/// Turns local files and remote URLs into [`EncodedImage`]s.
pub struct ImageAcquirer {
    http: HttpClient,
    timeout: Duration,
}

impl Default for ImageAcquirer {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageAcquirer {
    pub fn new() -> Self {
        Self::with_client(HttpClient::new())
    }

    pub fn with_client(http: HttpClient) -> Self {
        Self {
            http,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn acquire(&self, source: &ImageSource) -> Result<EncodedImage, AcquisitionError> {
        match source {
            ImageSource::File(path) => acquire_from_file(path),
            ImageSource::Url(url) => self.acquire_from_url(url),
            ImageSource::Template(key) => {
                let template = find_template(key)
                    .ok_or_else(|| AcquisitionError::UnknownTemplate(key.trim().to_string()))?;
                self.acquire_from_url(template.url)
            }
        }
    }

    pub fn acquire_from_url(&self, url: &str) -> Result<EncodedImage, AcquisitionError> {
        let url = url.trim();
        let response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .map_err(|source| AcquisitionError::Fetch {
                url: url.to_string(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(AcquisitionError::Status {
                url: url.to_string(),
                code: response.status().as_u16(),
            });
        }
        let header_mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| value.starts_with("image/"));
        let bytes = response
            .bytes()
            .map_err(|source| AcquisitionError::Fetch {
                url: url.to_string(),
                source,
            })?
            .to_vec();
        if bytes.is_empty() {
            return Err(AcquisitionError::EmptyResponse {
                url: url.to_string(),
            });
        }
        let mime = header_mime
            .or_else(|| sniff_mime(&bytes).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
        Ok(EncodedImage::new(mime, bytes))
    }
}

pub fn acquire_from_file(path: &Path) -> Result<EncodedImage, AcquisitionError> {
    let bytes = fs::read(path).map_err(|source| AcquisitionError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(AcquisitionError::Empty {
            path: path.to_path_buf(),
        });
    }
    let mime = sniff_mime(&bytes)
        .or_else(|| mime_for_path(path))
        .ok_or_else(|| AcquisitionError::Unsupported {
            path: path.to_path_buf(),
        })?;
    Ok(EncodedImage::new(mime, bytes))
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" | "heif" => Some("image/heic"),
        _ => None,
    }
}
