//! Request handler and method dispatcher.

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::types::*;
use crate::sampling::SamplingBridge;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// Handler trait for processing MCP requests on the agent side.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle initialize request.
    async fn initialize(&self, params: InitializeParams) -> ProtocolResult<InitializeResult>;

    /// List available tools.
    async fn list_tools(&self) -> ProtocolResult<ListToolsResult>;

    /// Call a tool.
    async fn call_tool(
        &self,
        params: CallToolParams,
        ctx: RequestContext,
    ) -> ProtocolResult<CallToolResult>;

    /// List static resources.
    async fn list_resources(&self) -> ProtocolResult<ListResourcesResult>;

    /// List templated resources.
    async fn list_resource_templates(&self) -> ProtocolResult<ListResourceTemplatesResult>;

    /// Read a resource by URI.
    async fn read_resource(&self, params: ReadResourceParams)
    -> ProtocolResult<ReadResourceResult>;

    async fn list_prompts(&self) -> ProtocolResult<ListPromptsResult>;

    async fn get_prompt(&self, params: GetPromptParams) -> ProtocolResult<GetPromptResult>;

    /// Handle ping request.
    async fn ping(&self) -> ProtocolResult<Value> {
        Ok(serde_json::json!({}))
    }
}

/// Method dispatcher that routes requests to appropriate handlers.
pub struct Dispatcher<H: Handler> {
    handler: Arc<H>,
}

impl<H: Handler> Dispatcher<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Dispatch a request to the appropriate handler method.
    #[instrument(skip(self, request, ctx), fields(method = %request.method))]
    pub async fn dispatch(&self, request: JsonRpcRequest, ctx: RequestContext) -> JsonRpcResponse {
        debug!("Dispatching request: {}", request.method);

        let params = request.params;
        let result = match request.method.as_str() {
            methods::INITIALIZE => self.handle(params, |p| self.handler.initialize(p)).await,
            methods::PING => self.handler.ping().await,
            methods::LIST_TOOLS => encode(self.handler.list_tools().await),
            methods::CALL_TOOL => {
                self.handle(params, |p| self.handler.call_tool(p, ctx))
                    .await
            }
            methods::LIST_RESOURCES => encode(self.handler.list_resources().await),
            methods::LIST_RESOURCE_TEMPLATES => {
                encode(self.handler.list_resource_templates().await)
            }
            methods::READ_RESOURCE => self.handle(params, |p| self.handler.read_resource(p)).await,
            methods::LIST_PROMPTS => encode(self.handler.list_prompts().await),
            methods::GET_PROMPT => self.handle(params, |p| self.handler.get_prompt(p)).await,
            method => {
                warn!("Unknown method: {}", method);
                Err(ProtocolError::MethodNotFound(method.to_string()))
            }
        };

        match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => {
                error!("Request failed: {}", e);
                JsonRpcResponse::error(request.id, JsonRpcError::new(e.code(), e.to_string()))
            }
        }
    }

    async fn handle<P, R, F, Fut>(&self, params: Option<Value>, call: F) -> ProtocolResult<Value>
    where
        P: DeserializeOwned,
        R: Serialize,
        F: FnOnce(P) -> Fut,
        Fut: Future<Output = ProtocolResult<R>>,
    {
        let params = parse_params(params)?;
        encode(call(params).await)
    }
}

fn parse_params<P: DeserializeOwned>(params: Option<Value>) -> ProtocolResult<P> {
    params
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| ProtocolError::InvalidParams(e.to_string().into()))?
        .ok_or_else(|| ProtocolError::InvalidParams("Missing params".into()))
}

fn encode<R: Serialize>(result: ProtocolResult<R>) -> ProtocolResult<Value> {
    serde_json::to_value(result?).map_err(|e| ProtocolError::InternalError(e.to_string().into()))
}

/// Request context for handler methods.
#[derive(Clone)]
pub struct RequestContext {
    pub request_id: Option<RequestId>,
    pub method: String,
    /// Channel back to the host for nested sampling rounds.
    pub sampling: SamplingBridge,
}

impl RequestContext {
    pub fn new(request: &JsonRpcRequest, sampling: SamplingBridge) -> Self {
        Self {
            request_id: request.id.clone(),
            method: request.method.clone(),
            sampling,
        }
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}
