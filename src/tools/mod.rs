//! MCP tool definitions and registry.

pub mod registry;
pub mod users;

pub use registry::{ToolDefinition, ToolHandler, ToolRegistry};
pub use users::{CreateRandomUserTool, CreateUserTool};

use crate::config::ServerConfig;
use crate::error::RegistryError;
use crate::store::UserStore;
use std::sync::Arc;

/// Create and register all tools.
pub fn create_registry(
    store: Arc<dyn UserStore>,
    config: &ServerConfig,
) -> Result<ToolRegistry, RegistryError> {
    let registry = ToolRegistry::new();

    registry.register(CreateUserTool::new(Arc::clone(&store)))?;
    // Generated records need the host's sampling capability at call time.
    registry.register(CreateRandomUserTool::new(
        store,
        config.sampling.max_tokens,
    ))?;

    Ok(registry)
}
