//! User-record tools.

use crate::error::Result;
use crate::protocol::{CallToolResult, RequestContext, ToolAnnotations};
use crate::schema::{FieldType, InputSchema, ValidatedArgs};
use crate::store::{NewUser, UserStore};
use crate::tools::registry::{ToolDefinition, ToolHandler};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const CREATE_FAILED: &str = "Failed to create user";
pub const GENERATE_FAILED: &str = "Failed to generate user data";

const RANDOM_USER_PROMPT: &str = "Generate fake user data. The user should have a realistic name, \
email, address, and phone number. Return this data as a JSON object with no other text or \
formatter so it can be used with JSON.parse.";

fn user_schema() -> InputSchema {
    InputSchema::new()
        .required("name", FieldType::String)
        .required("email", FieldType::String)
        .required("address", FieldType::String)
        .required("phone", FieldType::String)
}

fn created(id: u64) -> CallToolResult {
    CallToolResult::text(format!("User {} created successfully", id))
}

/// Writes go through the store; the tool itself holds no state.
fn write_annotations(title: &str) -> ToolAnnotations {
    ToolAnnotations {
        title: Some(title.into()),
        read_only_hint: Some(false),
        destructive_hint: Some(false),
        idempotent_hint: Some(false),
        open_world_hint: Some(true),
    }
}

/// `create-user`: append a record built from the caller's arguments.
pub struct CreateUserTool {
    store: Arc<dyn UserStore>,
}

impl CreateUserTool {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for CreateUserTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("create-user", user_schema())
            .title("Create a new user")
            .description("Create a new user in the database")
            .annotations(write_annotations("Create a new user"))
    }

    #[instrument(skip_all)]
    async fn execute(&self, args: ValidatedArgs, _ctx: RequestContext) -> Result<CallToolResult> {
        let user: NewUser = args.deserialize()?;

        match self.store.create(user).await {
            Ok(id) => Ok(created(id)),
            Err(e) => {
                warn!("create-user failed: {}", e);
                Ok(CallToolResult::error(CREATE_FAILED))
            }
        }
    }
}

/// `create-random-user`: ask the host to invent a record, then store it.
pub struct CreateRandomUserTool {
    store: Arc<dyn UserStore>,
    max_tokens: u32,
}

impl CreateRandomUserTool {
    pub fn new(store: Arc<dyn UserStore>, max_tokens: u32) -> Self {
        Self { store, max_tokens }
    }
}

#[async_trait]
impl ToolHandler for CreateRandomUserTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("create-random-user", InputSchema::new())
            .title("Create Random User")
            .description("Create a random user with fake data")
            .annotations(write_annotations("Create Random User"))
    }

    #[instrument(skip_all, fields(max_tokens = self.max_tokens))]
    async fn execute(&self, _args: ValidatedArgs, ctx: RequestContext) -> Result<CallToolResult> {
        let user: NewUser = match ctx
            .sampling
            .complete_json(RANDOM_USER_PROMPT, self.max_tokens)
            .await
        {
            Ok(user) => user,
            Err(e) => {
                warn!("Sampling for random user failed: {}", e);
                return Ok(CallToolResult::error(GENERATE_FAILED));
            }
        };

        match self.store.create(user).await {
            Ok(id) => {
                info!("Stored generated user {}", id);
                Ok(created(id))
            }
            Err(e) => {
                warn!("create-random-user failed: {}", e);
                Ok(CallToolResult::error(CREATE_FAILED))
            }
        }
    }
}
