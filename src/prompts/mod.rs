//! Prompt templates.

pub mod registry;
pub mod users;

pub use registry::{PromptDefinition, PromptHandler, PromptRegistry};
pub use users::GenerateFakeUserPrompt;

use crate::error::RegistryError;

/// Create and register all prompts.
pub fn create_registry() -> Result<PromptRegistry, RegistryError> {
    let registry = PromptRegistry::new();
    registry.register(GenerateFakeUserPrompt)?;
    Ok(registry)
}
