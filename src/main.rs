//! MCP agent binary entry point.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};
use users_mcp::{
    config::ServerConfig,
    protocol::McpServerBuilder,
    server::{McpHandler, ServerStateBuilder},
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let config = ServerConfig::builder().from_env()?.build()?;
    info!("Serving user records from {}", config.data_file.display());

    let name = config.name.to_string();
    let version = config.version.to_string();
    let state = Arc::new(ServerStateBuilder::new().config(config).build()?);

    info!(
        "Server state initialized with {} tools, {} resources, {} prompts",
        state.tools.len(),
        state.resources.len(),
        state.prompts.len()
    );

    let server = McpServerBuilder::new()
        .handler(McpHandler::new(state))
        .name(name)
        .version(version)
        .build()?;

    info!("MCP server ready, waiting for host...");

    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("users_mcp=info,warn"));

    // JSON to stderr; stdout carries the protocol.
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .json()
        .init();
}
