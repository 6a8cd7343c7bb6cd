//! Prompt registry.

use crate::error::{ProtocolError, ProtocolResult, RegistryError};
use crate::protocol::{GetPromptParams, GetPromptResult, Prompt, PromptMessage};
use crate::schema::{InputSchema, ValidatedArgs};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone)]
pub struct PromptDefinition {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub arguments: InputSchema,
}

impl PromptDefinition {
    pub fn to_prompt(&self) -> Prompt {
        let arguments = self.arguments.to_prompt_arguments();
        Prompt {
            name: self.name.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            arguments: (!arguments.is_empty()).then_some(arguments),
        }
    }
}

/// Pure template expansion. Rendering cannot fail once arguments validate.
pub trait PromptHandler: Send + Sync {
    fn definition(&self) -> PromptDefinition;
    fn render(&self, args: &ValidatedArgs) -> Vec<PromptMessage>;
}

struct Entry {
    definition: PromptDefinition,
    handler: Arc<dyn PromptHandler>,
}

#[derive(Default)]
pub struct PromptRegistry {
    prompts: RwLock<Vec<Entry>>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: PromptHandler + 'static>(&self, prompt: P) -> Result<(), RegistryError> {
        let definition = prompt.definition();
        let mut prompts = self.prompts.write();
        if prompts.iter().any(|e| e.definition.name == definition.name) {
            return Err(RegistryError::Duplicate {
                kind: "prompt",
                name: definition.name,
            });
        }

        debug!("Registering prompt: {}", definition.name);
        prompts.push(Entry {
            definition,
            handler: Arc::new(prompt),
        });
        Ok(())
    }

    pub fn list(&self) -> Vec<Prompt> {
        self.prompts
            .read()
            .iter()
            .map(|e| e.definition.to_prompt())
            .collect()
    }

    #[instrument(skip(self, params), fields(prompt = %params.name))]
    pub fn get(&self, params: &GetPromptParams) -> ProtocolResult<GetPromptResult> {
        let prompts = self.prompts.read();
        let entry = prompts
            .iter()
            .find(|e| e.definition.name == params.name)
            .ok_or_else(|| {
                warn!("Unknown prompt: {}", params.name);
                ProtocolError::PromptNotFound(params.name.clone())
            })?;

        let args = entry
            .definition
            .arguments
            .validate(&params.arguments)
            .map_err(|source| ProtocolError::Validation {
                target: params.name.clone(),
                source,
            })?;

        Ok(GetPromptResult {
            description: entry.definition.description.clone(),
            messages: entry.handler.render(&args),
        })
    }

    pub fn len(&self) -> usize {
        self.prompts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.read().is_empty()
    }
}
