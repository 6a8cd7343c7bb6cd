//! Server state management.

use crate::config::ServerConfig;
use crate::error::{McpError, Result};
use crate::prompts::PromptRegistry;
use crate::protocol::ClientInfo;
use crate::resources::ResourceRegistry;
use crate::store::{JsonFileStore, UserStore};
use crate::tools::ToolRegistry;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct ServerState {
    pub config: ServerConfig,
    pub store: Arc<dyn UserStore>,
    pub tools: ToolRegistry,
    pub resources: ResourceRegistry,
    pub prompts: PromptRegistry,
    client_info: RwLock<Option<ClientInfo>>,
    request_count: AtomicU64,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn UserStore>,
        tools: ToolRegistry,
        resources: ResourceRegistry,
        prompts: PromptRegistry,
    ) -> Self {
        Self {
            config,
            store,
            tools,
            resources,
            prompts,
            client_info: RwLock::new(None),
            request_count: AtomicU64::new(0),
        }
    }

    pub fn set_client_info(&self, client_info: ClientInfo) {
        *self.client_info.write() = Some(client_info);
    }

    pub fn client_info(&self) -> Option<ClientInfo> {
        self.client_info.read().clone()
    }

    /// Count a handled request, returning its sequence number.
    pub fn next_request_id(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }
}

pub struct ServerStateBuilder {
    config: Option<ServerConfig>,
    store: Option<Arc<dyn UserStore>>,
}

impl ServerStateBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            store: None,
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the record store. Defaults to a [`JsonFileStore`] at
    /// `config.data_file`.
    pub fn store(mut self, store: Arc<dyn UserStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<ServerState> {
        let config = self.config.ok_or_else(|| McpError::Internal {
            message: "Config is required".into(),
        })?;

        let store: Arc<dyn UserStore> = match self.store {
            Some(store) => store,
            None => Arc::new(JsonFileStore::new(config.data_file.clone())),
        };

        let tools = crate::tools::create_registry(Arc::clone(&store), &config)?;
        let resources = crate::resources::create_registry(Arc::clone(&store))?;
        let prompts = crate::prompts::create_registry()?;

        Ok(ServerState::new(config, store, tools, resources, prompts))
    }
}

impl Default for ServerStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_registers_capabilities() {
        let state = ServerStateBuilder::new()
            .config(ServerConfig::default())
            .build()
            .unwrap();

        assert_eq!(state.tools.len(), 2);
        assert_eq!(state.resources.len(), 2);
        assert_eq!(state.prompts.len(), 1);
        assert!(state.client_info().is_none());
    }

    #[test]
    fn test_builder_requires_config() {
        assert!(ServerStateBuilder::new().build().is_err());
    }

    #[test]
    fn test_request_counter() {
        let state = ServerStateBuilder::new()
            .config(ServerConfig::default())
            .build()
            .unwrap();
        assert_eq!(state.next_request_id(), 0);
        assert_eq!(state.next_request_id(), 1);
        assert_eq!(state.request_count(), 2);
    }
}
