//! User resources: `users://all` and `users://{userId}/profile`.

use crate::error::{Result, StoreError};
use crate::protocol::ResourceContents;
use crate::resources::registry::{ResourceDefinition, ResourceDescriptor, ResourceHandler};
use crate::resources::template::{TemplateVariables, UriTemplate};
use crate::store::UserStore;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing::instrument;

const JSON_MIME: &str = "application/json";

static PROFILE_TEMPLATE: Lazy<UriTemplate> = Lazy::new(|| {
    UriTemplate::parse("users://{userId}/profile").expect("Invalid template: user profile")
});

pub struct AllUsersResource {
    store: Arc<dyn UserStore>,
}

impl AllUsersResource {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ResourceHandler for AllUsersResource {
    fn definition(&self) -> ResourceDefinition {
        ResourceDefinition {
            name: "users".into(),
            descriptor: ResourceDescriptor::fixed("users://all"),
            title: Some("Users".into()),
            description: Some("A list of all users in the database".into()),
            mime_type: Some(JSON_MIME.into()),
        }
    }

    #[instrument(skip(self, _variables), fields(resource = "users"))]
    async fn read(&self, uri: &str, _variables: &TemplateVariables) -> Result<Vec<ResourceContents>> {
        let users = self.store.all().await?;
        let text = serde_json::to_string(&users)?;
        Ok(vec![ResourceContents::text(uri, Some(JSON_MIME), text)])
    }
}

pub struct UserProfileResource {
    store: Arc<dyn UserStore>,
}

impl UserProfileResource {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ResourceHandler for UserProfileResource {
    fn definition(&self) -> ResourceDefinition {
        ResourceDefinition {
            name: "user-details".into(),
            descriptor: ResourceDescriptor::Templated(PROFILE_TEMPLATE.clone()),
            title: Some("User Profile".into()),
            description: Some("Detailed profile information for a specific user".into()),
            mime_type: Some(JSON_MIME.into()),
        }
    }

    #[instrument(skip(self), fields(resource = "user-details"))]
    async fn read(&self, uri: &str, variables: &TemplateVariables) -> Result<Vec<ResourceContents>> {
        // A non-numeric id can never match a record.
        let id = variables
            .get("userId")
            .and_then(|raw| raw.parse::<u64>().ok())
            .ok_or(StoreError::UserNotFound)?;

        let user = self.store.find(id).await?;
        let text = serde_json::to_string(&user)?;
        Ok(vec![ResourceContents::text(uri, Some(JSON_MIME), text)])
    }
}
