mod registry;
mod selectors;

pub use registry::{ModelRegistry, ModelSpec, CAPTION_CAPABILITY, EDIT_CAPABILITY};
pub use selectors::{ModelPair, ModelSelection, ModelSelector};
