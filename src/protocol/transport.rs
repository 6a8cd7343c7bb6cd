//! Line-oriented transports for JSON-RPC messages.

use crate::error::{McpError, ProtocolError, Result};
use crate::protocol::codec;
use crate::protocol::types::{JsonRpcResponse, Message};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout,
};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, error, trace, warn};

/// How long `close` waits for a spawned agent to exit on its own.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport trait for MCP communication.
///
/// Reads come from a single loop; writes may come from any task.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Next message, or `None` once the peer has closed its end.
    async fn read_message(&self) -> Result<Option<Message>>;
    async fn write_message(&self, message: &Message) -> Result<()>;
    /// Close the outbound half. Later writes fail.
    async fn close(&self) -> Result<()>;

    async fn write_response(&self, response: &JsonRpcResponse) -> Result<()> {
        debug!("Sending response: id={:?}", response.id);
        self.write_message(&Message::Response(response.clone())).await
    }
}

/// Transport over any async byte stream pair.
pub struct StreamTransport<R, W> {
    reader: Mutex<BufReader<R>>,
    writer: Mutex<Option<W>>,
    // Keeps a spawned agent alive for the transport's lifetime.
    child: Option<Mutex<Child>>,
}

/// Stdio-based transport, used by the agent process.
pub type StdioTransport = StreamTransport<Stdin, Stdout>;

impl<R, W> StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(BufReader::new(reader)),
            writer: Mutex::new(Some(writer)),
            child: None,
        }
    }

    /// Read a single non-empty line.
    ///
    /// Lines over [`codec::MAX_MESSAGE_BYTES`] are discarded up to the next
    /// newline and reported as invalid requests. Bytes that are not UTF-8
    /// are a parse error. Neither ends the stream.
    async fn read_line(&self) -> Result<Option<String>> {
        let mut reader = self.reader.lock().await;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let limit = codec::MAX_MESSAGE_BYTES as u64 + 1;
            let read = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await;
            match read {
                Ok(0) => return Ok(None), // EOF
                Ok(_) if buf.len() > codec::MAX_MESSAGE_BYTES => {
                    if buf.last() != Some(&b'\n') {
                        discard_line(&mut *reader).await?;
                    }
                    return Err(ProtocolError::InvalidRequest(
                        format!("message exceeds {} bytes", codec::MAX_MESSAGE_BYTES).into(),
                    )
                    .into());
                }
                Ok(_) => {
                    let line = String::from_utf8(std::mem::take(&mut buf))
                        .map_err(|_| ProtocolError::ParseError)?;
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    trace!("Received line: {}", trimmed);
                    return Ok(Some(trimmed.to_string()));
                }
                Err(e) => {
                    error!("Error reading from transport: {}", e);
                    return Err(McpError::Io(e));
                }
            }
        }
    }

    /// Write a line.
    async fn write_line(&self, content: &str) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(ProtocolError::ConnectionClosed)?;
        trace!("Sending line: {}", content);
        writer.write_all(content.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Drop buffered input through the next newline.
async fn discard_line<R: AsyncRead + Unpin>(reader: &mut BufReader<R>) -> std::io::Result<()> {
    loop {
        let (consumed, done) = {
            let available = reader.fill_buf().await?;
            match available.iter().position(|b| *b == b'\n') {
                Some(i) => (i + 1, true),
                None => (available.len(), available.is_empty()),
            }
        };
        reader.consume(consumed);
        if done {
            return Ok(());
        }
    }
}

impl StdioTransport {
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl StreamTransport<ChildStdout, ChildStdin> {
    /// Launch an agent process and talk to it over its stdio.
    pub fn spawn(program: &str, args: &[String]) -> Result<Self> {
        let mut command = Command::new(program);
        command.args(args);
        Self::spawn_command(command)
    }

    /// Launch a prepared command, e.g. one with extra environment.
    ///
    /// Stdio is always piped, with stderr discarded.
    pub fn spawn_command(mut command: Command) -> Result<Self> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        debug!("Spawned agent {:?} (pid {:?})", command.as_std().get_program(), child.id());

        let stdin = child.stdin.take().ok_or_else(|| McpError::Internal {
            message: "child stdin not captured".into(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| McpError::Internal {
            message: "child stdout not captured".into(),
        })?;

        let mut transport = Self::new(stdout, stdin);
        transport.child = Some(Mutex::new(child));
        Ok(transport)
    }

    /// Process id of the agent, or `None` once it has been reaped.
    pub async fn pid(&self) -> Option<u32> {
        match &self.child {
            Some(child) => child.lock().await.id(),
            None => None,
        }
    }
}

#[async_trait::async_trait]
impl<R, W> Transport for StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn read_message(&self) -> Result<Option<Message>> {
        let Some(line) = self.read_line().await? else {
            return Ok(None);
        };

        let message = codec::decode(&line)?;
        match &message {
            Message::Request(request) | Message::Notification(request) => {
                debug!("Received request: method={}", request.method);
            }
            Message::Response(response) => {
                debug!("Received response: id={:?}", response.id);
            }
        }
        Ok(Some(message))
    }

    async fn write_message(&self, message: &Message) -> Result<()> {
        let line = codec::encode(message)?;
        self.write_line(&line).await
    }

    async fn close(&self) -> Result<()> {
        if let Some(mut writer) = self.writer.lock().await.take() {
            debug!("Closing transport");
            writer.shutdown().await?;
        }
        if let Some(child) = &self.child {
            let mut child = child.lock().await;
            match tokio::time::timeout(REAP_TIMEOUT, child.wait()).await {
                Ok(Ok(status)) => debug!("Agent process exited: {}", status),
                Ok(Err(e)) => error!("Failed to reap agent process: {}", e),
                Err(_) => {
                    warn!("Agent process did not exit after stdin closed, killing it");
                    child.kill().await?;
                }
            }
        }
        Ok(())
    }
}
