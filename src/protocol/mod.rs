//! MCP protocol implementation over JSON-RPC 2.0.

pub mod client;
pub mod codec;
pub mod handler;
pub mod peer;
pub mod server;
pub mod session;
pub mod transport;
pub mod types;

pub use client::{McpClient, SamplingHandler};
pub use handler::{Dispatcher, Handler, RequestContext};
pub use peer::{PendingRequests, Peer};
pub use server::{McpServer, McpServerBuilder};
pub use session::{Session, SessionState};
pub use transport::{StdioTransport, StreamTransport, Transport};
pub use types::*;
