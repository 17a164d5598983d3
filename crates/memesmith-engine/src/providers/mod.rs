mod dryrun;
mod gemini;

use std::env;
use std::time::Duration;

use anyhow::{bail, Result};
use memesmith_contracts::image::EncodedImage;
use memesmith_contracts::models::ModelPair;

use crate::error::{EditError, GenerationError};

pub use dryrun::DryrunClient;
pub use gemini::GeminiClient;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_CAPTION_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_EDIT_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_CAPTION_COUNT: usize = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: f64 = 90.0;

/// The two remote operations the orchestrator depends on.
///
/// Implementations are single-shot: one call, one attempt.
pub trait GenerativeClient: Send + Sync {
    fn name(&self) -> &str;
    fn suggest_captions(&self, image: &EncodedImage) -> Result<Vec<String>, GenerationError>;
    fn apply_edit(&self, image: &EncodedImage, instruction: &str)
        -> Result<EncodedImage, EditError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub caption_model: String,
    pub edit_model: String,
    pub caption_count: usize,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            caption_model: DEFAULT_CAPTION_MODEL.to_string(),
            edit_model: DEFAULT_EDIT_MODEL.to_string(),
            caption_count: DEFAULT_CAPTION_COUNT,
            request_timeout: Duration::from_secs_f64(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Reads `GEMINI_API_BASE` and the `GEMINI_API_KEY` / `GOOGLE_API_KEY` credential.
    pub fn from_env() -> Self {
        let api_base = non_empty_env("GEMINI_API_BASE")
            .map(|value| value.trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self {
            api_base,
            api_key: non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY")),
            ..Self::default()
        }
    }

    pub fn with_models(mut self, caption_model: &str, edit_model: &str) -> Self {
        self.caption_model = caption_model.trim().to_string();
        self.edit_model = edit_model.trim().to_string();
        self
    }

    pub fn with_caption_count(mut self, count: usize) -> Self {
        self.caption_count = count.clamp(1, 10);
        self
    }

    pub fn with_request_timeout_secs(mut self, seconds: f64) -> Self {
        let seconds = if seconds.is_finite() {
            seconds.clamp(15.0, 300.0)
        } else {
            DEFAULT_REQUEST_TIMEOUT_SECS
        };
        self.request_timeout = Duration::from_secs_f64(seconds);
        self
    }
}

/// Builds the client serving both operations of a [`ModelPair`].
pub fn build_client(models: &ModelPair, config: ClientConfig) -> Result<Box<dyn GenerativeClient>> {
    let config = config.with_models(&models.caption().model.name, &models.edit().model.name);
    match models.provider() {
        "gemini" => Ok(Box::new(GeminiClient::new(config)?)),
        "dryrun" => Ok(Box::new(DryrunClient::new(config.caption_count))),
        other => bail!("unsupported provider '{other}'"),
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use memesmith_contracts::models::{
        ModelSelection, ModelSelector, ModelSpec, CAPTION_CAPABILITY, EDIT_CAPABILITY,
    };

    use super::*;

    fn pair(caption: Option<&str>, edit: Option<&str>) -> anyhow::Result<ModelPair> {
        ModelSelector::new(None)
            .select_pair(caption, edit)
            .map_err(anyhow::Error::msg)
    }

    #[test]
    fn config_clamps_count_and_timeout() {
        let config = ClientConfig::default()
            .with_caption_count(0)
            .with_request_timeout_secs(2.0);
        assert_eq!(config.caption_count, 1);
        assert_eq!(config.request_timeout, Duration::from_secs(15));

        let config = config
            .with_caption_count(40)
            .with_request_timeout_secs(900.0);
        assert_eq!(config.caption_count, 10);
        assert_eq!(config.request_timeout, Duration::from_secs(300));

        let config = config.with_request_timeout_secs(f64::NAN);
        assert_eq!(config.request_timeout, Duration::from_secs(90));
    }

    #[test]
    fn defaults_match_reference_behavior() {
        let config = ClientConfig::default();
        assert_eq!(config.caption_count, 5);
        assert_eq!(config.caption_model, "gemini-3-pro-preview");
        assert_eq!(config.edit_model, "gemini-2.5-flash-image");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn build_client_rejects_unknown_provider() -> anyhow::Result<()> {
        let local = ModelSelection {
            model: ModelSpec {
                name: "local-1".to_string(),
                provider: "local".to_string(),
                capabilities: vec![CAPTION_CAPABILITY.to_string(), EDIT_CAPABILITY.to_string()],
            },
            requested: None,
            fallback_reason: None,
        };
        let models = ModelPair::new(local.clone(), local).map_err(anyhow::Error::msg)?;
        let err = build_client(&models, ClientConfig::default())
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected unsupported provider"))?;
        assert_eq!(err.to_string(), "unsupported provider 'local'");
        Ok(())
    }

    #[test]
    fn build_client_requires_gemini_credential() -> anyhow::Result<()> {
        let err = build_client(&pair(None, None)?, ClientConfig::default())
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected missing credential"))?;
        assert!(err.to_string().contains("GEMINI_API_KEY"));
        Ok(())
    }

    #[test]
    fn dryrun_models_build_offline_client() -> anyhow::Result<()> {
        let models = pair(Some("dryrun-1"), None)?;
        assert_eq!(models.edit().model.name, "dryrun-1");
        let client = build_client(&models, ClientConfig::default())?;
        assert_eq!(client.name(), "dryrun");
        Ok(())
    }
}
