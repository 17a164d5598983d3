use indexmap::IndexMap;

pub const CAPTION_CAPABILITY: &str = "caption";
pub const EDIT_CAPABILITY: &str = "edit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn by_capability(&self, capability: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: &str) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, provider: &str, capabilities: &[&str]| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider: provider.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|item| (*item).to_string())
                    .collect(),
            },
        );
    };

    insert("gemini-3-pro-preview", "gemini", &[CAPTION_CAPABILITY]);
    insert("gemini-2.5-flash-image", "gemini", &[EDIT_CAPABILITY]);
    insert("gemini-2.5-flash", "gemini", &[CAPTION_CAPABILITY]);
    insert("gemini-3-pro-image-preview", "gemini", &[EDIT_CAPABILITY]);
    insert(
        "dryrun-1",
        "dryrun",
        &[CAPTION_CAPABILITY, EDIT_CAPABILITY],
    );

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_orders_gemini_first_per_capability() {
        let registry = ModelRegistry::new(None);
        let captions = registry.by_capability(CAPTION_CAPABILITY);
        let edits = registry.by_capability(EDIT_CAPABILITY);
        assert_eq!(captions[0].name, "gemini-3-pro-preview");
        assert_eq!(edits[0].name, "gemini-2.5-flash-image");
        assert!(captions.iter().any(|model| model.provider == "dryrun"));
        assert!(edits.iter().any(|model| model.provider == "dryrun"));
    }

    #[test]
    fn ensure_rejects_incapable_model() {
        let registry = ModelRegistry::new(None);
        assert!(registry
            .ensure("gemini-2.5-flash-image", CAPTION_CAPABILITY)
            .is_none());
        assert!(registry
            .ensure("gemini-2.5-flash-image", EDIT_CAPABILITY)
            .is_some());
        assert!(registry.ensure("missing", EDIT_CAPABILITY).is_none());
    }
}
