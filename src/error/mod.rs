//! Error types for the MCP agent and host.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `From` conversions.

use std::borrow::Cow;
use thiserror::Error;

/// Main error type for the crate.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    // Displayed bare: store messages double as domain-error payloads.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Sampling error: {0}")]
    Sampling(#[from] SamplingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: Cow<'static, str> },
}

/// JSON-RPC 2.0 and MCP protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Parse error: invalid JSON")]
    ParseError,

    #[error("Invalid request: {0}")]
    InvalidRequest(Cow<'static, str>),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(Cow<'static, str>),

    #[error("Internal error: {0}")]
    InternalError(Cow<'static, str>),

    #[error("Session not initialized")]
    NotInitialized,

    #[error("Session already initialized")]
    AlreadyInitialized,

    #[error("Handshake failed: {0}")]
    HandshakeFailed(Cow<'static, str>),

    #[error("Resource {0} not found")]
    ResourceNotFound(String),

    #[error("Tool {0} not found")]
    ToolNotFound(String),

    #[error("Prompt {0} not found")]
    PromptNotFound(String),

    #[error("Invalid arguments for {target}: {source}")]
    Validation {
        target: String,
        #[source]
        source: ValidationError,
    },

    #[error("Transport error: {0}")]
    Transport(Cow<'static, str>),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("{message}")]
    Remote { code: i32, message: String },
}

impl ProtocolError {
    /// Returns the JSON-RPC 2.0 error code.
    pub fn code(&self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest(_) => -32600,
            Self::MethodNotFound(_) => -32601,
            Self::InvalidParams(_) => -32602,
            Self::ResourceNotFound(_) | Self::ToolNotFound(_) | Self::PromptNotFound(_) => -32602,
            Self::Validation { .. } => -32602,
            Self::InternalError(_) => -32603,
            Self::HandshakeFailed(_) => -32603,
            Self::NotInitialized => -32002,
            Self::AlreadyInitialized => -32002,
            Self::Transport(_) | Self::ConnectionClosed => -32000,
            Self::Remote { code, .. } => *code,
        }
    }
}

/// Argument map failed an input schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("arguments must be an object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing required argument '{0}'")]
    MissingField(String),

    #[error("unknown argument '{0}'")]
    UnknownField(String),

    #[error("argument '{field}' must be {expected}, got {actual}")]
    WrongType {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Capability registration errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Duplicate {kind} registration: {name}")]
    Duplicate { kind: &'static str, name: String },

    #[error("Invalid URI template '{template}': {message}")]
    InvalidTemplate {
        template: String,
        message: Cow<'static, str>,
    },
}

/// Tool execution errors.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

/// Record store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("User not found")]
    UserNotFound,

    #[error("Failed to access record file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Record file {path} is malformed: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures of a nested sampling round.
#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("Host did not declare the sampling capability")]
    Unsupported,

    #[error("Host rejected the sampling request: {0}")]
    Rejected(String),

    #[error("Sampling returned {0} content instead of text")]
    NotText(&'static str),

    #[error("Sampled text is not a valid payload: {0}")]
    Unparsable(String),

    #[error("Sampling round failed: {0}")]
    Transport(#[from] ProtocolError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(Cow<'static, str>),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        field: Cow<'static, str>,
        message: Cow<'static, str>,
    },
}

/// Result type alias for McpError.
pub type Result<T> = std::result::Result<T, McpError>;

/// Result type alias for ProtocolError.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Result type alias for StoreError.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for SamplingError.
pub type SamplingResult<T> = std::result::Result<T, SamplingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_codes() {
        assert_eq!(ProtocolError::ParseError.code(), -32700);
        assert_eq!(ProtocolError::InvalidRequest("test".into()).code(), -32600);
        assert_eq!(ProtocolError::MethodNotFound("test".into()).code(), -32601);
        assert_eq!(ProtocolError::InvalidParams("test".into()).code(), -32602);
        assert_eq!(ProtocolError::InternalError("test".into()).code(), -32603);
        assert_eq!(ProtocolError::ToolNotFound("x".into()).code(), -32602);
        assert_eq!(ProtocolError::ConnectionClosed.code(), -32000);
        assert_eq!(
            ProtocolError::Remote {
                code: -32001,
                message: "x".into()
            }
            .code(),
            -32001
        );
    }

    #[test]
    fn test_store_error_displays_bare() {
        let err: McpError = StoreError::UserNotFound.into();
        assert_eq!(err.to_string(), "User not found");
    }

    #[test]
    fn test_validation_error_message() {
        let err = ProtocolError::Validation {
            target: "create-user".into(),
            source: ValidationError::MissingField("email".into()),
        };
        assert_eq!(
            err.to_string(),
            "Invalid arguments for create-user: missing required argument 'email'"
        );
    }
}
