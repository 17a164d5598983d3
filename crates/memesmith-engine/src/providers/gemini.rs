use memesmith_contracts::image::EncodedImage;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};

use super::{ClientConfig, GenerativeClient};
use crate::error::{truncate_text, EditError, GenerationError, ServiceError};

const EDIT_FALLBACK_MIME: &str = "image/png";
const REFUSAL_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "IMAGE_SAFETY",
];

pub struct GeminiClient {
    config: ClientConfig,
    api_key: String,
    http: HttpClient,
}

impl GeminiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ServiceError> {
        Self::with_http(config, HttpClient::new())
    }

    pub(crate) fn with_http(config: ClientConfig, http: HttpClient) -> Result<Self, ServiceError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|value| !value.trim().is_empty())
            .ok_or(ServiceError::MissingCredential)?;
        Ok(Self {
            config,
            api_key,
            http,
        })
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.config.api_base, model_path)
    }

    fn post_json(&self, model: &str, payload: &Value) -> Result<Value, ServiceError> {
        let endpoint = self.endpoint_for_model(model);
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .timeout(self.config.request_timeout)
            .json(payload)
            .send()
            .map_err(|source| ServiceError::Transport {
                endpoint: endpoint.clone(),
                // the URL carries the credential in its query string
                source: source.without_url(),
            })?;
        response_json_or_error(&endpoint, response)
    }
}

impl GenerativeClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn suggest_captions(&self, image: &EncodedImage) -> Result<Vec<String>, GenerationError> {
        let payload = caption_payload(image, self.config.caption_count);
        let response = self.post_json(&self.config.caption_model, &payload)?;
        parse_caption_response(&response)
    }

    fn apply_edit(
        &self,
        image: &EncodedImage,
        instruction: &str,
    ) -> Result<EncodedImage, EditError> {
        let payload = edit_payload(image, instruction);
        let response = self.post_json(&self.config.edit_model, &payload)?;
        extract_edit_image(&response)
    }
}

fn response_json_or_error(endpoint: &str, response: HttpResponse) -> Result<Value, ServiceError> {
    let status = response.status();
    let body = response.text().map_err(|source| ServiceError::Transport {
        endpoint: endpoint.to_string(),
        source: source.without_url(),
    })?;
    if !status.is_success() {
        return Err(ServiceError::Status {
            code: status.as_u16(),
            body: truncate_text(body.trim(), 512),
        });
    }
    serde_json::from_str(&body).map_err(ServiceError::InvalidJson)
}

pub(crate) fn caption_instruction(count: usize) -> String {
    format!(
        "Analyze this image and provide {count} funny, witty, or sarcastic meme captions \
         that fit the context perfectly. Return ONLY a JSON array of strings."
    )
}

fn image_part(image: &EncodedImage) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type(),
            "data": image.base64_payload(),
        }
    })
}

pub(crate) fn caption_payload(image: &EncodedImage, count: usize) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [image_part(image), { "text": caption_instruction(count) }],
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
            },
        },
    })
}

pub(crate) fn edit_payload(image: &EncodedImage, instruction: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [image_part(image), { "text": instruction.trim() }],
        }],
        "generationConfig": {
            "responseModalities": ["IMAGE"],
        },
    })
}

fn candidates(response: &Value) -> &[Value] {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn candidate_parts(candidate: &Value) -> &[Value] {
    candidate
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn candidate_text(candidate: &Value) -> String {
    candidate_parts(candidate)
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
}

fn block_reason(response: &Value) -> Option<String> {
    response
        .get("promptFeedback")
        .and_then(|feedback| feedback.get("blockReason"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn finish_reason(candidate: &Value) -> Option<&str> {
    candidate.get("finishReason").and_then(Value::as_str)
}

pub(crate) fn parse_caption_response(response: &Value) -> Result<Vec<String>, GenerationError> {
    if let Some(reason) = block_reason(response) {
        return Err(GenerationError::Refused(reason));
    }
    let Some(first) = candidates(response).first() else {
        return Ok(Vec::new());
    };
    let text = candidate_text(first);
    let text = text.trim();
    if text.is_empty() {
        if let Some(reason) = finish_reason(first)
            .filter(|reason| REFUSAL_FINISH_REASONS.contains(reason))
        {
            return Err(GenerationError::Refused(reason.to_string()));
        }
        return Ok(Vec::new());
    }
    let captions: Vec<String> =
        serde_json::from_str(text).map_err(GenerationError::Malformed)?;
    Ok(captions
        .into_iter()
        .map(|caption| caption.trim().to_string())
        .filter(|caption| !caption.is_empty())
        .collect())
}

pub(crate) fn extract_edit_image(response: &Value) -> Result<EncodedImage, EditError> {
    if let Some(reason) = block_reason(response) {
        return Err(EditError::Refused(reason));
    }
    for candidate in candidates(response) {
        for part in candidate_parts(candidate) {
            let Some(inline) = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object)
            else {
                continue;
            };
            let data = inline
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .unwrap_or(EDIT_FALLBACK_MIME);
            return EncodedImage::from_base64(mime_type, data).map_err(EditError::Decode);
        }
    }

    let first = candidates(response).first();
    let text = first.map(candidate_text).unwrap_or_default();
    let detail = Some(text.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| first.and_then(finish_reason).map(|reason| format!("finish reason {reason}")))
        .map(|value| truncate_text(&value, 200));
    Err(EditError::NoImage { detail })
}
