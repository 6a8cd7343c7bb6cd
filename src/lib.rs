//! MCP agent exposing a small user directory, plus the host-side client that
//! drives it.
//!
//! The agent serves two resources (`users://all`, `users://{userId}/profile`),
//! two tools (`create-user`, `create-random-user`) and one prompt
//! (`generate-fake-user`). `create-random-user` asks the host for generated
//! data through a nested sampling round trip.
//!
//! # Example
//!
//! ```no_run
//! use users_mcp::{
//!     config::ServerConfig,
//!     protocol::McpServerBuilder,
//!     server::{McpHandler, ServerStateBuilder},
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::builder().from_env()?.build()?;
//!     let state = Arc::new(ServerStateBuilder::new().config(config).build()?);
//!
//!     let server = McpServerBuilder::new()
//!         .handler(McpHandler::new(state))
//!         .build()?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod prompts;
pub mod protocol;
pub mod resources;
pub mod sampling;
pub mod schema;
pub mod server;
pub mod store;
pub mod tools;

pub use config::{SamplingConfig, ServerConfig, ServerConfigBuilder};
pub use error::{McpError, Result};
pub use protocol::{McpClient, McpServer, McpServerBuilder, SamplingHandler};
pub use server::{McpHandler, ServerState, ServerStateBuilder};
pub use store::{JsonFileStore, User, UserStore};
