//! Configuration types and builders.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::env;
use std::path::PathBuf;

pub const ENV_DATA_FILE: &str = "USERS_MCP_DATA_FILE";
pub const ENV_SAMPLING_MAX_TOKENS: &str = "USERS_MCP_SAMPLING_MAX_TOKENS";
pub const ENV_NAME: &str = "USERS_MCP_NAME";

/// Sampling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Token budget sent with every sampling request.
    pub max_tokens: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self { max_tokens: 1024 }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: Cow<'static, str>,
    pub version: Cow<'static, str>,
    /// JSON array file holding the user records.
    pub data_file: PathBuf,
    pub sampling: SamplingConfig,
    /// Free-form usage notes returned from `initialize`.
    pub instructions: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
            data_file: PathBuf::from("data/users.json"),
            sampling: SamplingConfig::default(),
            instructions: Some(
                "User directory agent. Read users://all or users://{userId}/profile, \
                 create records with create-user, or let the host invent one with \
                 create-random-user."
                    .into(),
            ),
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

/// Builder for ServerConfig.
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<Cow<'static, str>>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_file = path.into();
        self
    }

    pub fn sampling_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.sampling.max_tokens = max_tokens;
        self
    }

    pub fn instructions(mut self, instructions: Option<String>) -> Self {
        self.config.instructions = instructions;
        self
    }

    /// Apply overrides from environment variables.
    pub fn from_env(self) -> Result<Self> {
        self.from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(path) = lookup(ENV_DATA_FILE) {
            self.config.data_file = PathBuf::from(path);
        }

        if let Some(max_tokens) = lookup(ENV_SAMPLING_MAX_TOKENS) {
            self.config.sampling.max_tokens =
                max_tokens.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    field: ENV_SAMPLING_MAX_TOKENS.into(),
                    message: format!("Invalid token count: {}", max_tokens).into(),
                })?;
        }

        if let Some(name) = lookup(ENV_NAME) {
            self.config.name = name.into();
        }

        Ok(self)
    }

    pub fn build(self) -> Result<ServerConfig> {
        self.validate()?;
        Ok(self.config)
    }

    fn validate(&self) -> Result<()> {
        if self.config.name.is_empty() {
            return Err(ConfigError::MissingField("name".into()).into());
        }
        if self.config.data_file.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("data_file".into()).into());
        }
        if self.config.sampling.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sampling.max_tokens".into(),
                message: "Token budget must be greater than 0".into(),
            }
            .into());
        }
        Ok(())
    }
}
