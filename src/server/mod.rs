//! Agent wiring: configuration, record store and registries behind one handler.

pub mod handler;
pub mod state;

pub use handler::McpHandler;
pub use state::{ServerState, ServerStateBuilder};
