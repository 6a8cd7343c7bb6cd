//! Host side of a session: handshake, discovery, invocation, and answering
//! the agent's sampling requests.

use crate::cache::DiscoveryCache;
use crate::error::{McpError, ProtocolError, ProtocolResult, Result};
use crate::protocol::peer::Peer;
use crate::protocol::session::{Session, SessionState, is_supported_version};
use crate::protocol::transport::Transport;
use crate::protocol::types::*;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Produces completions for `sampling/createMessage`, typically by calling a
/// language model.
#[async_trait]
pub trait SamplingHandler: Send + Sync {
    async fn create_message(&self, params: CreateMessageParams) -> Result<CreateMessageResult>;
}

/// Connected host session.
pub struct McpClient {
    peer: Peer,
    session: Arc<Session>,
    cache: DiscoveryCache,
    server_info: ServerInfo,
    capabilities: ServerCapabilities,
    instructions: Option<String>,
    reader: JoinHandle<()>,
}

impl McpClient {
    /// Run the handshake over `transport`.
    ///
    /// The sampling capability is declared only when `sampler` is present.
    #[instrument(skip(transport, sampler), fields(client = %info.name))]
    pub async fn connect(
        transport: Arc<dyn Transport>,
        info: ClientInfo,
        sampler: Option<Arc<dyn SamplingHandler>>,
    ) -> Result<Self> {
        let peer = Peer::new(Arc::clone(&transport));
        let session = Arc::new(Session::new());
        let reader = tokio::spawn(read_loop(
            transport,
            peer.clone(),
            Arc::clone(&session),
            sampler.clone(),
        ));

        let params = InitializeParams {
            protocol_version: LATEST_PROTOCOL_VERSION.into(),
            capabilities: ClientCapabilities {
                sampling: sampler.as_ref().map(|_| SamplingCapability::default()),
            },
            client_info: info,
        };

        session.begin_handshake()?;
        let result = match handshake(&peer, &params).await {
            Ok(result) => result,
            Err(e) => {
                error!("Handshake failed: {}", e);
                session.close();
                peer.close();
                let _ = peer.transport().close().await;
                reader.abort();
                return Err(e.into());
            }
        };

        session.record_handshake(&result.protocol_version, Some(params.capabilities));
        peer.notify(methods::INITIALIZED, None).await?;
        session.activate()?;
        info!(
            "Connected to {} v{} (protocol {})",
            result.server_info.name, result.server_info.version, result.protocol_version
        );

        Ok(Self {
            peer,
            session,
            cache: DiscoveryCache::new(),
            server_info: result.server_info,
            capabilities: result.capabilities,
            instructions: result.instructions,
            reader,
        })
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn protocol_version(&self) -> Option<String> {
        self.session.protocol_version()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_active()
    }

    pub fn cache(&self) -> &DiscoveryCache {
        &self.cache
    }

    /// Drop cached discovery results; the next list call goes to the agent.
    pub fn refresh(&self) {
        self.cache.clear();
    }

    async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> ProtocolResult<R> {
        match self.session.state() {
            SessionState::Active => {}
            SessionState::Closed => return Err(ProtocolError::ConnectionClosed),
            SessionState::Disconnected | SessionState::Handshaking => {
                return Err(ProtocolError::NotInitialized);
            }
        }

        let value = self.peer.request(method, params).await?;
        serde_json::from_value(value).map_err(|e| {
            ProtocolError::InvalidRequest(format!("malformed {} result: {}", method, e).into())
        })
    }

    pub async fn ping(&self) -> ProtocolResult<()> {
        self.request::<Value>(methods::PING, None).await.map(|_| ())
    }

    pub async fn list_tools(&self) -> ProtocolResult<Vec<Tool>> {
        if let Some(tools) = self.cache.tools() {
            return Ok(tools);
        }
        let result: ListToolsResult = self.request(methods::LIST_TOOLS, None).await?;
        self.cache.set_tools(result.tools.clone());
        Ok(result.tools)
    }

    pub async fn list_resources(&self) -> ProtocolResult<Vec<Resource>> {
        if let Some(resources) = self.cache.resources() {
            return Ok(resources);
        }
        let result: ListResourcesResult = self.request(methods::LIST_RESOURCES, None).await?;
        self.cache.set_resources(result.resources.clone());
        Ok(result.resources)
    }

    pub async fn list_resource_templates(&self) -> ProtocolResult<Vec<ResourceTemplate>> {
        if let Some(templates) = self.cache.resource_templates() {
            return Ok(templates);
        }
        let result: ListResourceTemplatesResult =
            self.request(methods::LIST_RESOURCE_TEMPLATES, None).await?;
        self.cache
            .set_resource_templates(result.resource_templates.clone());
        Ok(result.resource_templates)
    }

    pub async fn list_prompts(&self) -> ProtocolResult<Vec<Prompt>> {
        if let Some(prompts) = self.cache.prompts() {
            return Ok(prompts);
        }
        let result: ListPromptsResult = self.request(methods::LIST_PROMPTS, None).await?;
        self.cache.set_prompts(result.prompts.clone());
        Ok(result.prompts)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> ProtocolResult<CallToolResult> {
        let params = serde_json::json!({ "name": name, "arguments": arguments });
        self.request(methods::CALL_TOOL, Some(params)).await
    }

    pub async fn read_resource(&self, uri: &str) -> ProtocolResult<ReadResourceResult> {
        let params = serde_json::json!({ "uri": uri });
        self.request(methods::READ_RESOURCE, Some(params)).await
    }

    pub async fn get_prompt(&self, name: &str, arguments: Value) -> ProtocolResult<GetPromptResult> {
        let params = serde_json::json!({ "name": name, "arguments": arguments });
        self.request(methods::GET_PROMPT, Some(params)).await
    }

    /// End the session. Outstanding requests fail with `ConnectionClosed`.
    pub async fn close(&self) -> Result<()> {
        self.session.close();
        self.peer.close();
        self.peer.transport().close().await
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn handshake(peer: &Peer, params: &InitializeParams) -> ProtocolResult<InitializeResult> {
    let result: InitializeResult = peer
        .call(methods::INITIALIZE, params)
        .await
        .map_err(|e| ProtocolError::HandshakeFailed(e.to_string().into()))?;

    if !is_supported_version(&result.protocol_version) {
        return Err(ProtocolError::HandshakeFailed(
            format!("unsupported protocol version {}", result.protocol_version).into(),
        ));
    }
    Ok(result)
}

/// Route responses and serve the agent's requests until EOF.
async fn read_loop(
    transport: Arc<dyn Transport>,
    peer: Peer,
    session: Arc<Session>,
    sampler: Option<Arc<dyn SamplingHandler>>,
) {
    loop {
        let message = match transport.read_message().await {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!("Agent closed its output");
                break;
            }
            Err(McpError::Protocol(
                e @ (ProtocolError::ParseError | ProtocolError::InvalidRequest(_)),
            )) => {
                warn!("Rejecting malformed message from agent: {}", e);
                let response =
                    JsonRpcResponse::error(None, JsonRpcError::new(e.code(), e.to_string()));
                if let Err(e) = peer.respond(response).await {
                    error!("Failed to send error response: {}", e);
                }
                continue;
            }
            Err(e) => {
                error!("Transport error: {}", e);
                break;
            }
        };

        match message {
            Message::Response(response) => {
                peer.handle_response(response);
            }
            Message::Request(request) => {
                let peer = peer.clone();
                let sampler = sampler.clone();
                tokio::spawn(async move {
                    let response = serve(request, sampler).await;
                    if let Err(e) = peer.respond(response).await {
                        error!("Failed to send response: {}", e);
                    }
                });
            }
            Message::Notification(notification) => {
                debug!("Ignoring notification: {}", notification.method);
            }
        }
    }

    session.close();
    peer.close();
}

async fn serve(
    request: JsonRpcRequest,
    sampler: Option<Arc<dyn SamplingHandler>>,
) -> JsonRpcResponse {
    let id = request.id.clone();
    let outcome = match (request.method.as_str(), sampler) {
        (methods::PING, _) => Ok(serde_json::json!({})),
        (methods::CREATE_MESSAGE, Some(sampler)) => sample(request.params, sampler.as_ref()).await,
        (method, _) => {
            warn!("Agent sent unsupported request: {}", method);
            Err(ProtocolError::MethodNotFound(method.to_string()))
        }
    };

    match outcome {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, JsonRpcError::new(e.code(), e.to_string())),
    }
}

async fn sample(params: Option<Value>, sampler: &dyn SamplingHandler) -> ProtocolResult<Value> {
    let params: CreateMessageParams = params
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| ProtocolError::InvalidParams(e.to_string().into()))?
        .ok_or_else(|| ProtocolError::InvalidParams("Missing params".into()))?;

    debug!("Serving sampling request ({} message(s))", params.messages.len());
    let result = sampler
        .create_message(params)
        .await
        .map_err(|e| ProtocolError::InternalError(e.to_string().into()))?;

    serde_json::to_value(result).map_err(|e| ProtocolError::InternalError(e.to_string().into()))
}
