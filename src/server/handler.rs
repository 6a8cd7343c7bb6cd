//! MCP request handler implementation.

use crate::error::ProtocolResult;
use crate::protocol::session::negotiate_version;
use crate::protocol::{
    CallToolParams, CallToolResult, GetPromptParams, GetPromptResult, Handler, InitializeParams,
    InitializeResult, ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult,
    ListToolsResult, PromptsCapability, ReadResourceParams, ReadResourceResult, RequestContext,
    ResourcesCapability, ServerCapabilities, ServerInfo, ToolsCapability,
};
use crate::server::state::ServerState;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// MCP request handler that processes protocol messages.
pub struct McpHandler {
    state: Arc<ServerState>,
}

impl McpHandler {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Declare only what is actually registered.
    fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            tools: (!self.state.tools.is_empty()).then(|| ToolsCapability {
                list_changed: Some(false),
            }),
            resources: (!self.state.resources.is_empty()).then(|| ResourcesCapability {
                subscribe: Some(false),
                list_changed: Some(false),
            }),
            prompts: (!self.state.prompts.is_empty()).then(|| PromptsCapability {
                list_changed: Some(false),
            }),
        }
    }
}

#[async_trait]
impl Handler for McpHandler {
    async fn initialize(&self, params: InitializeParams) -> ProtocolResult<InitializeResult> {
        info!(
            "Initialize request from {} v{}",
            params.client_info.name, params.client_info.version
        );
        debug!("Client capabilities: {:?}", params.capabilities);

        let protocol_version = negotiate_version(&params.protocol_version);
        self.state.set_client_info(params.client_info);

        Ok(InitializeResult {
            protocol_version: protocol_version.into(),
            capabilities: self.capabilities(),
            server_info: ServerInfo::new(
                self.state.config.name.to_string(),
                self.state.config.version.to_string(),
            ),
            instructions: self.state.config.instructions.clone(),
        })
    }

    async fn list_tools(&self) -> ProtocolResult<ListToolsResult> {
        self.state.next_request_id();
        let tools = self.state.tools.list();
        debug!("Listing {} tools", tools.len());

        Ok(ListToolsResult {
            tools,
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        params: CallToolParams,
        ctx: RequestContext,
    ) -> ProtocolResult<CallToolResult> {
        let seq = self.state.next_request_id();
        debug!("Tool call #{}: {}", seq, params.name);
        self.state.tools.call(params, ctx).await
    }

    async fn list_resources(&self) -> ProtocolResult<ListResourcesResult> {
        self.state.next_request_id();
        Ok(ListResourcesResult {
            resources: self.state.resources.list(),
            next_cursor: None,
        })
    }

    async fn list_resource_templates(&self) -> ProtocolResult<ListResourceTemplatesResult> {
        self.state.next_request_id();
        Ok(ListResourceTemplatesResult {
            resource_templates: self.state.resources.list_templates(),
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        params: ReadResourceParams,
    ) -> ProtocolResult<ReadResourceResult> {
        let seq = self.state.next_request_id();
        debug!("Resource read #{}: {}", seq, params.uri);
        self.state.resources.read(&params.uri).await
    }

    async fn list_prompts(&self) -> ProtocolResult<ListPromptsResult> {
        self.state.next_request_id();
        Ok(ListPromptsResult {
            prompts: self.state.prompts.list(),
            next_cursor: None,
        })
    }

    async fn get_prompt(&self, params: GetPromptParams) -> ProtocolResult<GetPromptResult> {
        self.state.next_request_id();
        self.state.prompts.get(&params)
    }
}
