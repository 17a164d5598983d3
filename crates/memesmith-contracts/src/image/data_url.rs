use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// MIME type assumed when a transport string does not declare one.
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

const DATA_SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64";

#[derive(Debug, Error)]
pub enum DataUrlError {
    #[error("image payload is empty")]
    EmptyPayload,
    #[error("image payload is not valid base64")]
    InvalidBase64(#[source] base64::DecodeError),
}

/// Self-describing image payload: a MIME type plus the raw bytes.
///
/// On the wire this travels as a data URL
/// (`data:<mime>;base64,<payload>`); in memory the bytes are kept decoded so
/// the MIME type and content can always be recovered.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    mime_type: String,
    bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mime_type = mime_type.into();
        let mime_type = if mime_type.trim().is_empty() {
            DEFAULT_MIME_TYPE.to_string()
        } else {
            mime_type.trim().to_string()
        };
        Self { mime_type, bytes }
    }

    /// Decodes a transport string.
    ///
    /// A string without a comma is treated as a bare base64 payload tagged
    /// with [`DEFAULT_MIME_TYPE`]; an empty bare string is rejected. A data
    /// URL with nothing after the comma decodes to an empty image.
    pub fn from_data_url(value: &str) -> Result<Self, DataUrlError> {
        if !value.contains(',') && value.trim().is_empty() {
            return Err(DataUrlError::EmptyPayload);
        }
        let payload = payload_of(value).trim();
        let bytes = BASE64
            .decode(payload.as_bytes())
            .map_err(DataUrlError::InvalidBase64)?;
        Ok(Self::new(mime_type_of(value), bytes))
    }

    /// Decodes a bare base64 payload as returned by generative services.
    pub fn from_base64(mime_type: &str, payload: &str) -> Result<Self, DataUrlError> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(DataUrlError::EmptyPayload);
        }
        let bytes = BASE64
            .decode(payload.as_bytes())
            .map_err(DataUrlError::InvalidBase64)?;
        Ok(Self::new(mime_type, bytes))
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn base64_payload(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!(
            "{DATA_SCHEME}{};base64,{}",
            self.mime_type,
            self.base64_payload()
        )
    }

    /// Short content identity used in event logs instead of the payload.
    pub fn digest(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        hex::encode(&digest[..6])
    }

    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .field("digest", &self.digest())
            .finish()
    }
}

/// MIME type declared between the scheme delimiter and the trailing
/// `;base64` marker, or [`DEFAULT_MIME_TYPE`] when absent. Parameters such as
/// `;charset=utf-8` stay part of the type.
pub fn mime_type_of(value: &str) -> &str {
    let Some((meta, _)) = value.split_once(',') else {
        return DEFAULT_MIME_TYPE;
    };
    let meta = meta.trim();
    let after_scheme = match meta.find(':') {
        Some(idx) => &meta[idx + 1..],
        None => meta,
    };
    let mime = strip_base64_marker(after_scheme).trim();
    if mime.is_empty() {
        DEFAULT_MIME_TYPE
    } else {
        mime
    }
}

/// Everything after the first comma, or the whole string when there is none.
pub fn payload_of(value: &str) -> &str {
    match value.split_once(',') {
        Some((_, payload)) => payload,
        None => value,
    }
}

fn strip_base64_marker(meta: &str) -> &str {
    let split = meta.len().saturating_sub(BASE64_MARKER.len());
    match (meta.get(..split), meta.get(split..)) {
        (Some(head), Some(tail)) if tail.eq_ignore_ascii_case(BASE64_MARKER) => head,
        _ => meta,
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    let lowered = mime.trim().to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    "png"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_round_trip_preserves_mime_and_bytes() -> anyhow::Result<()> {
        let mime_types = [
            "image/png",
            "image/jpeg",
            "image/webp",
            "image/svg+xml;charset=utf-8",
        ];
        let all_bytes: Vec<u8> = (0..=255).collect();
        let payloads: [&[u8]; 5] = [b"", all_bytes.as_slice(), b"a", b"ab", b"abc"];

        for mime in mime_types {
            for raw in payloads {
                let image = EncodedImage::new(mime, raw.to_vec());
                let encoded = image.to_data_url();
                assert!(encoded.starts_with(&format!("data:{mime};base64,")));
                assert_eq!(mime_type_of(&encoded), mime, "{encoded}");
                assert_eq!(BASE64.decode(payload_of(&encoded))?, raw);

                let decoded = EncodedImage::from_data_url(&encoded)?;
                assert_eq!(decoded, image, "{mime} with {} bytes", raw.len());
            }
        }
        Ok(())
    }

    #[test]
    fn base64_marker_is_matched_case_insensitively() {
        assert_eq!(mime_type_of("data:image/png;BASE64,AAAA"), "image/png");
        assert_eq!(
            mime_type_of("data:text/plain;charset=us-ascii,hello"),
            "text/plain;charset=us-ascii"
        );
    }

    #[test]
    fn bare_payload_defaults_to_jpeg() -> anyhow::Result<()> {
        let payload = BASE64.encode(b"jpeg-ish");
        assert_eq!(mime_type_of(&payload), DEFAULT_MIME_TYPE);
        assert_eq!(payload_of(&payload), payload);

        let image = EncodedImage::from_data_url(&payload)?;
        assert_eq!(image.mime_type(), "image/jpeg");
        assert_eq!(image.bytes(), b"jpeg-ish");
        Ok(())
    }

    #[test]
    fn missing_mime_declaration_falls_back_to_default() {
        assert_eq!(mime_type_of("data:;base64,AAAA"), DEFAULT_MIME_TYPE);
        assert_eq!(mime_type_of("data:image/webp,AAAA"), "image/webp");
    }

    #[test]
    fn payload_is_split_at_first_comma_only() {
        assert_eq!(payload_of("data:image/png;base64,AB,CD"), "AB,CD");
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let err = EncodedImage::from_data_url("data:image/png;base64,@@not-base64@@").unwrap_err();
        assert!(matches!(err, DataUrlError::InvalidBase64(_)));

        let err = EncodedImage::from_data_url("   ").unwrap_err();
        assert!(matches!(err, DataUrlError::EmptyPayload));

        let err = EncodedImage::from_base64("image/png", "").unwrap_err();
        assert!(matches!(err, DataUrlError::EmptyPayload));
    }

    #[test]
    fn empty_data_url_payload_decodes_to_empty_image() -> anyhow::Result<()> {
        let image = EncodedImage::from_data_url("data:image/png;base64,")?;
        assert_eq!(image.mime_type(), "image/png");
        assert!(image.is_empty());
        Ok(())
    }

    #[test]
    fn digest_and_extension_describe_payload() {
        let image = EncodedImage::new("image/jpeg", b"abc".to_vec());
        assert_eq!(image.digest().len(), 12);
        assert_eq!(image.digest(), EncodedImage::new("image/png", b"abc".to_vec()).digest());
        assert_eq!(image.extension(), "jpg");
        assert_eq!(EncodedImage::new("image/webp", Vec::new()).extension(), "webp");
        assert_eq!(EncodedImage::new("", Vec::new()).mime_type(), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn debug_output_omits_payload_bytes() {
        let image = EncodedImage::new("image/png", vec![7; 64]);
        let rendered = format!("{image:?}");
        assert!(rendered.contains("image/png"));
        assert!(rendered.contains("len: 64"));
    }
}
