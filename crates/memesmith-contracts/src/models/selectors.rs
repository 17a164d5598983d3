use super::registry::{ModelRegistry, ModelSpec, CAPTION_CAPABILITY, EDIT_CAPABILITY};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

/// Caption and edit models for one session. Both come from the same
/// provider, so a session needs a single credential and a single client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPair {
    caption: ModelSelection,
    edit: ModelSelection,
}

impl ModelPair {
    pub fn new(caption: ModelSelection, edit: ModelSelection) -> Result<Self, String> {
        if caption.model.provider != edit.model.provider {
            return Err(format!(
                "Caption model '{}' ({}) and edit model '{}' ({}) use different providers.",
                caption.model.name,
                caption.model.provider,
                edit.model.name,
                edit.model.provider
            ));
        }
        Ok(Self { caption, edit })
    }

    pub fn caption(&self) -> &ModelSelection {
        &self.caption
    }

    pub fn edit(&self) -> &ModelSelection {
        &self.edit
    }

    pub fn provider(&self) -> &str {
        &self.caption.model.provider
    }

    /// Both selections keyed by the capability they serve.
    pub fn selections(&self) -> [(&'static str, &ModelSelection); 2] {
        [
            (CAPTION_CAPABILITY, &self.caption),
            (EDIT_CAPABILITY, &self.edit),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_else(|| ModelRegistry::new(None)),
        }
    }

    pub fn select(
        &self,
        requested: Option<&str>,
        capability: &str,
    ) -> Result<ModelSelection, String> {
        self.select_from(requested, capability, None)
    }

    /// Resolves the caption model first, then an edit model. When the edit
    /// request has to fall back, only models of the caption model's provider
    /// are candidates. An explicitly named edit model from another provider
    /// is an error.
    pub fn select_pair(
        &self,
        caption: Option<&str>,
        edit: Option<&str>,
    ) -> Result<ModelPair, String> {
        let caption = self.select(caption, CAPTION_CAPABILITY)?;
        let edit = self.select_from(edit, EDIT_CAPABILITY, Some(&caption.model.provider))?;
        ModelPair::new(caption, edit)
    }

    fn select_from(
        &self,
        requested: Option<&str>,
        capability: &str,
        provider: Option<&str>,
    ) -> Result<ModelSelection, String> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        if let Some(model) = requested.and_then(|name| self.registry.ensure(name, capability)) {
            return Ok(ModelSelection {
                model,
                requested: requested.map(str::to_string),
                fallback_reason: None,
            });
        }

        let fallback_reason = match requested {
            Some(name) => {
                format!("Requested model '{name}' unavailable for capability '{capability}'.")
            }
            None => "No model specified; using default.".to_string(),
        };
        let model = self
            .registry
            .list()
            .find(|model| {
                model.supports(capability) && provider.map_or(true, |p| model.provider == p)
            })
            .cloned()
            .ok_or_else(|| match provider {
                Some(p) => format!("No '{p}' models available for capability '{capability}'."),
                None => format!("No models available for capability '{capability}'."),
            })?;
        Ok(ModelSelection {
            model,
            requested: requested.map(str::to_string),
            fallback_reason: Some(fallback_reason),
        })
    }
}
