//! Agent-side read loop with lifecycle management.

use crate::error::{McpError, ProtocolError, Result};
use crate::protocol::handler::{Dispatcher, Handler, RequestContext};
use crate::protocol::peer::Peer;
use crate::protocol::session::Session;
use crate::protocol::transport::{StdioTransport, Transport};
use crate::protocol::types::*;
use crate::sampling::SamplingBridge;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

/// MCP Server.
pub struct McpServer<H: Handler> {
    info: ServerInfo,
    handler: Arc<H>,
    session: Arc<Session>,
}

impl<H: Handler + 'static> McpServer<H> {
    /// Create a new MCP server.
    pub fn new(handler: H, info: ServerInfo) -> Self {
        Self {
            info,
            handler: Arc::new(handler),
            session: Arc::new(Session::new()),
        }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Shared view of the session lifecycle.
    pub fn session(&self) -> Arc<Session> {
        Arc::clone(&self.session)
    }

    /// Run the server with stdio transport.
    pub async fn run(self) -> Result<()> {
        let transport: Arc<dyn Transport> = Arc::new(StdioTransport::stdio());
        self.run_with_transport(transport).await
    }

    /// Serve one session until the transport closes.
    #[instrument(skip(self, transport), fields(server = %self.info.name))]
    pub async fn run_with_transport(self, transport: Arc<dyn Transport>) -> Result<()> {
        info!(
            "Starting MCP server: {} v{}",
            self.info.name, self.info.version
        );

        let peer = Peer::new(Arc::clone(&transport));
        let bridge = SamplingBridge::new(peer.clone(), Arc::clone(&self.session));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&self.handler)));
        let mut tasks = JoinSet::new();

        loop {
            while let Some(finished) = tasks.try_join_next() {
                if let Err(e) = finished {
                    error!("Request task failed: {}", e);
                }
            }

            let message = match transport.read_message().await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    debug!("EOF received, shutting down");
                    break;
                }
                Err(McpError::Protocol(
                    e @ (ProtocolError::ParseError | ProtocolError::InvalidRequest(_)),
                )) => {
                    warn!("Rejecting malformed message: {}", e);
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
                Message::Request(request) => {
                    if let Err(e) = self.session.admit(&request.method) {
                        warn!("Rejecting {} in state {:?}", request.method, self.session.state());
                        let response = JsonRpcResponse::error(
                            request.id,
                            JsonRpcError::new(e.code(), e.to_string()),
                        );
                        if let Err(e) = peer.respond(response).await {
                            error!("Failed to send response: {}", e);
                        }
                        continue;
                    }

                    let ctx = RequestContext::new(&request, bridge.clone());
                    if request.method == methods::INITIALIZE {
                        // Inline, so the handshake is recorded before the
                        // acknowledgement is read.
                        let response = self.initialize(&dispatcher, request, ctx).await;
                        if let Err(e) = peer.respond(response).await {
                            error!("Failed to send response: {}", e);
                        }
                        continue;
                    }

                    let dispatcher = Arc::clone(&dispatcher);
                    let peer = peer.clone();
                    tasks.spawn(async move {
                        let response = dispatcher.dispatch(request, ctx).await;
                        if let Err(e) = peer.respond(response).await {
                            error!("Failed to send response: {}", e);
                        }
                    });
                }
                Message::Notification(notification) => match notification.method.as_str() {
                    methods::INITIALIZED => {
                        if let Err(e) = self.session.activate() {
                            warn!("Unexpected initialized notification: {}", e);
                        }
                    }
                    method => debug!("Ignoring notification: {}", method),
                },
                Message::Response(response) => {
                    peer.handle_response(response);
                }
            }
        }

        self.session.close();
        // Fails any sampling round still waiting, so handlers can finish.
        peer.close();
        while let Some(finished) = tasks.join_next().await {
            if let Err(e) = finished {
                error!("Request task failed: {}", e);
            }
        }
        if let Err(e) = transport.close().await {
            debug!("Transport close failed: {}", e);
        }

        info!("Server stopped");
        Ok(())
    }

    async fn initialize(
        &self,
        dispatcher: &Dispatcher<H>,
        request: JsonRpcRequest,
        ctx: RequestContext,
    ) -> JsonRpcResponse {
        if let Err(e) = self.session.begin_handshake() {
            return JsonRpcResponse::error(request.id, JsonRpcError::new(e.code(), e.to_string()));
        }

        let client_capabilities = request
            .params
            .as_ref()
            .and_then(|p| p.get("capabilities"))
            .and_then(|c| serde_json::from_value::<ClientCapabilities>(c.clone()).ok());

        let response = dispatcher.dispatch(request, ctx).await;
        let version = response
            .result
            .as_ref()
            .and_then(|r| r.get("protocolVersion"))
            .and_then(|v| v.as_str());

        match version {
            Some(version) => {
                info!("Handshake answered with protocol {}", version);
                self.session.record_handshake(version, client_capabilities);
            }
            None => self.session.abort_handshake(),
        }
        response
    }
}

/// Builder for MCP Server.
pub struct McpServerBuilder<H: Handler> {
    handler: Option<H>,
    name: String,
    version: String,
}

impl<H: Handler + 'static> McpServerBuilder<H> {
    pub fn new() -> Self {
        Self {
            handler: None,
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }

    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn build(self) -> Result<McpServer<H>> {
        let handler = self.handler.ok_or_else(|| McpError::Internal {
            message: "Handler is required".into(),
        })?;

        Ok(McpServer::new(
            handler,
            ServerInfo::new(self.name, self.version),
        ))
    }
}

impl<H: Handler + 'static> Default for McpServerBuilder<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::protocol::session::SessionState;
    use crate::protocol::transport::StreamTransport;
    use crate::server::{McpHandler, ServerStateBuilder};
    use serde_json::Value;
    use tokio::io::{
        AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
    };

    fn build_server(dir: &tempfile::TempDir) -> McpServer<McpHandler> {
        let config = ServerConfig::builder()
            .data_file(dir.path().join("users.json"))
            .build()
            .unwrap();
        let state = Arc::new(ServerStateBuilder::new().config(config).build().unwrap());
        McpServerBuilder::new()
            .handler(McpHandler::new(state))
            .name("test-server")
            .build()
            .unwrap()
    }

    type HostWriter = WriteHalf<DuplexStream>;
    type HostLines = Lines<BufReader<ReadHalf<DuplexStream>>>;

    async fn send(writer: &mut HostWriter, line: &str) {
        writer.write_all(line.as_bytes()).await.unwrap();
        writer.write_all(b"\n").await.unwrap();
    }

    async fn exchange(writer: &mut HostWriter, lines: &mut HostLines, line: &str) -> Value {
        send(writer, line).await;
        let reply = lines.next_line().await.unwrap().unwrap();
        serde_json::from_str(&reply).unwrap()
    }

    #[test]
    fn test_server_builder() {
        let dir = tempfile::tempdir().unwrap();
        let server = build_server(&dir);
        assert_eq!(server.info().name, "test-server");
        assert_eq!(server.info().version, env!("CARGO_PKG_VERSION"));
        assert_eq!(server.session().state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_lifecycle_over_raw_lines() {
        let dir = tempfile::tempdir().unwrap();
        let server = build_server(&dir);
        let session = server.session();

        let (host, agent) = tokio::io::duplex(64 * 1024);
        let (agent_read, agent_write) = tokio::io::split(agent);
        let transport: Arc<dyn Transport> =
            Arc::new(StreamTransport::new(agent_read, agent_write));
        let running = tokio::spawn(server.run_with_transport(transport));

        let (host_read, mut host_write) = tokio::io::split(host);
        let mut lines = BufReader::new(host_read).lines();

        let reply = exchange(&mut host_write, &mut lines, "not json").await;
        assert_eq!(reply["error"]["code"], -32700);
        assert_eq!(reply["id"], Value::Null);

        let reply = exchange(
            &mut host_write,
            &mut lines,
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#,
        )
        .await;
        assert_eq!(reply["error"]["code"], -32002);

        let reply = exchange(
            &mut host_write,
            &mut lines,
            r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
        )
        .await;
        assert_eq!(reply["result"], serde_json::json!({}));

        let reply = exchange(
            &mut host_write,
            &mut lines,
            r#"{"jsonrpc":"2.0","id":3,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"raw","version":"0"}}}"#,
        )
        .await;
        assert_eq!(reply["id"], 3);
        assert_eq!(reply["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(reply["result"]["serverInfo"]["name"], "users-mcp");

        let reply = exchange(
            &mut host_write,
            &mut lines,
            r#"{"jsonrpc":"2.0","id":4,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"raw","version":"0"}}}"#,
        )
        .await;
        assert_eq!(reply["error"]["code"], -32002);

        let initialized = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        send(&mut host_write, initialized).await;
        let reply = exchange(
            &mut host_write,
            &mut lines,
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/list"}"#,
        )
        .await;
        assert_eq!(reply["id"], 5);
        assert_eq!(reply["result"]["tools"][0]["name"], "create-user");
        assert_eq!(session.state(), SessionState::Active);

        host_write.shutdown().await.unwrap();
        running.await.unwrap().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_invalid_utf8_keeps_session_open() {
        let dir = tempfile::tempdir().unwrap();
        let server = build_server(&dir);

        let (host, agent) = tokio::io::duplex(64 * 1024);
        let (agent_read, agent_write) = tokio::io::split(agent);
        let transport: Arc<dyn Transport> =
            Arc::new(StreamTransport::new(agent_read, agent_write));
        let running = tokio::spawn(server.run_with_transport(transport));

        let (host_read, mut host_write) = tokio::io::split(host);
        let mut lines = BufReader::new(host_read).lines();

        host_write.write_all(b"\xff\xfe garbage\n").await.unwrap();
        let reply = lines.next_line().await.unwrap().unwrap();
        let reply: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["error"]["code"], -32700);
        assert_eq!(reply["id"], Value::Null);

        let reply = exchange(
            &mut host_write,
            &mut lines,
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
        )
        .await;
        assert_eq!(reply["id"], 1);
        assert_eq!(reply["result"], serde_json::json!({}));
        assert!(!running.is_finished());

        host_write.shutdown().await.unwrap();
        running.await.unwrap().unwrap();
    }
}
