//! Resource definitions and registry.

pub mod registry;
pub mod template;
pub mod users;

pub use registry::{
    ResolvedResource, ResourceDefinition, ResourceDescriptor, ResourceHandler, ResourceRegistry,
};
pub use template::{TemplateVariables, UriTemplate};
pub use users::{AllUsersResource, UserProfileResource};

use crate::error::RegistryError;
use crate::store::UserStore;
use std::sync::Arc;

/// Create and register all resources.
pub fn create_registry(store: Arc<dyn UserStore>) -> Result<ResourceRegistry, RegistryError> {
    let registry = ResourceRegistry::new();
    registry.register(AllUsersResource::new(Arc::clone(&store)))?;
    registry.register(UserProfileResource::new(store))?;
    Ok(registry)
}
