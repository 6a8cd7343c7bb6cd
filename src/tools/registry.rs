//! Tool registry: schema validation and fault-contained execution.

use crate::error::{ProtocolError, ProtocolResult, RegistryError, Result};
use crate::protocol::{CallToolParams, CallToolResult, RequestContext, Tool, ToolAnnotations};
use crate::schema::{InputSchema, ValidatedArgs};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// Everything the registry needs to advertise and validate a tool.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub input_schema: InputSchema,
    pub annotations: Option<ToolAnnotations>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, input_schema: InputSchema) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            input_schema,
            annotations: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn annotations(mut self, annotations: ToolAnnotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// Descriptor sent in `tools/list`.
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.to_json_schema(),
            annotations: self.annotations.clone(),
        }
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Runs only with arguments that passed `definition().input_schema`.
    async fn execute(&self, args: ValidatedArgs, ctx: RequestContext) -> Result<CallToolResult>;
}

struct Entry {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

/// Registered tools, listed in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<Vec<Entry>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: ToolHandler + 'static>(
        &self,
        tool: T,
    ) -> std::result::Result<(), RegistryError> {
        let definition = tool.definition();
        let mut tools = self.tools.write();
        if tools.iter().any(|e| e.definition.name == definition.name) {
            return Err(RegistryError::Duplicate {
                kind: "tool",
                name: definition.name,
            });
        }

        debug!("Registering tool: {}", definition.name);
        tools.push(Entry {
            definition,
            handler: Arc::new(tool),
        });
        Ok(())
    }

    fn get(&self, name: &str) -> Option<(ToolDefinition, Arc<dyn ToolHandler>)> {
        self.tools
            .read()
            .iter()
            .find(|e| e.definition.name == name)
            .map(|e| (e.definition.clone(), Arc::clone(&e.handler)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.read().iter().any(|e| e.definition.name == name)
    }

    pub fn list(&self) -> Vec<Tool> {
        self.tools
            .read()
            .iter()
            .map(|e| e.definition.to_tool())
            .collect()
    }

    /// Resolve, validate, then execute.
    ///
    /// Unknown names and schema violations are protocol errors and the
    /// handler never runs. Anything the handler does wrong, including a
    /// panic, comes back as failure content.
    #[instrument(skip(self, params, ctx), fields(tool = %params.name))]
    pub async fn call(
        &self,
        params: CallToolParams,
        ctx: RequestContext,
    ) -> ProtocolResult<CallToolResult> {
        let (definition, handler) = self.get(&params.name).ok_or_else(|| {
            warn!("Unknown tool: {}", params.name);
            ProtocolError::ToolNotFound(params.name.clone())
        })?;

        let args = definition
            .input_schema
            .validate(&params.arguments)
            .map_err(|source| {
                warn!("Rejected arguments for {}: {}", definition.name, source);
                ProtocolError::Validation {
                    target: definition.name.clone(),
                    source,
                }
            })?;

        let task = tokio::spawn(async move { handler.execute(args, ctx).await });
        let result = match task.await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!("Tool {} failed: {}", definition.name, e);
                CallToolResult::error(e.to_string())
            }
            Err(e) => {
                error!("Tool {} aborted: {}", definition.name, e);
                CallToolResult::error(format!("Tool {} failed unexpectedly", definition.name))
            }
        };

        debug!("Tool {} finished (is_error={})", definition.name, result.is_error());
        Ok(result)
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }
}
