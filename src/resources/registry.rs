//! Resource registry: static URIs and URI templates.

use crate::error::{ProtocolError, ProtocolResult, RegistryError, Result};
use crate::protocol::{ReadResourceResult, Resource, ResourceContents, ResourceTemplate};
use crate::resources::template::{TemplateVariables, UriTemplate};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// How a resource is addressed.
#[derive(Debug, Clone)]
pub enum ResourceDescriptor {
    /// Exact URI.
    Static(String),
    /// Pattern with named placeholders.
    Templated(UriTemplate),
}

impl ResourceDescriptor {
    pub fn fixed(uri: impl Into<String>) -> Self {
        Self::Static(uri.into())
    }

    pub fn template(pattern: &str) -> std::result::Result<Self, RegistryError> {
        UriTemplate::parse(pattern).map(Self::Templated)
    }

    fn key(&self) -> &str {
        match self {
            Self::Static(uri) => uri,
            Self::Templated(template) => template.as_str(),
        }
    }
}

/// Metadata advertised for a resource.
#[derive(Debug, Clone)]
pub struct ResourceDefinition {
    pub name: String,
    pub descriptor: ResourceDescriptor,
    pub title: Option<String>,
    pub description: Option<String>,
    pub mime_type: Option<String>,
}

#[async_trait]
pub trait ResourceHandler: Send + Sync {
    fn definition(&self) -> ResourceDefinition;

    /// Produce contents for `uri`. `variables` is empty for static resources.
    async fn read(&self, uri: &str, variables: &TemplateVariables) -> Result<Vec<ResourceContents>>;
}

struct Entry {
    definition: ResourceDefinition,
    handler: Arc<dyn ResourceHandler>,
}

/// Resolution outcome: the handler plus any placeholder values.
pub struct ResolvedResource {
    pub definition: ResourceDefinition,
    pub handler: Arc<dyn ResourceHandler>,
    pub variables: TemplateVariables,
}

/// Registered resources.
///
/// Registration happens before the session goes active; afterwards the
/// registry is only read.
#[derive(Default)]
pub struct ResourceRegistry {
    statics: RwLock<Vec<Entry>>,
    templates: RwLock<Vec<Entry>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<R: ResourceHandler + 'static>(
        &self,
        resource: R,
    ) -> std::result::Result<(), RegistryError> {
        let definition = resource.definition();
        let mut statics = self.statics.write();
        let mut templates = self.templates.write();

        let taken = statics.iter().chain(templates.iter()).any(|e| {
            e.definition.name == definition.name
                || e.definition.descriptor.key() == definition.descriptor.key()
        });
        if taken {
            return Err(RegistryError::Duplicate {
                kind: "resource",
                name: definition.name,
            });
        }

        debug!(
            "Registering resource: {} ({})",
            definition.name,
            definition.descriptor.key()
        );
        let is_static = matches!(definition.descriptor, ResourceDescriptor::Static(_));
        let entry = Entry {
            handler: Arc::new(resource),
            definition,
        };
        if is_static {
            statics.push(entry);
        } else {
            templates.push(entry);
        }
        Ok(())
    }

    /// Static exact match first, then templates in registration order.
    pub fn resolve(&self, uri: &str) -> ProtocolResult<ResolvedResource> {
        if let Some(entry) = self
            .statics
            .read()
            .iter()
            .find(|e| matches!(&e.definition.descriptor, ResourceDescriptor::Static(u) if u == uri))
        {
            return Ok(ResolvedResource {
                definition: entry.definition.clone(),
                handler: Arc::clone(&entry.handler),
                variables: TemplateVariables::new(),
            });
        }

        for entry in self.templates.read().iter() {
            let ResourceDescriptor::Templated(template) = &entry.definition.descriptor else {
                continue;
            };
            if let Some(variables) = template.match_uri(uri) {
                return Ok(ResolvedResource {
                    definition: entry.definition.clone(),
                    handler: Arc::clone(&entry.handler),
                    variables,
                });
            }
        }

        Err(ProtocolError::ResourceNotFound(uri.to_string()))
    }

    /// Resolve and read. Handler failures become an `{"error": ...}` payload
    /// inside a successful result; only an unknown URI is a protocol error.
    #[instrument(skip(self))]
    pub async fn read(&self, uri: &str) -> ProtocolResult<ReadResourceResult> {
        let resolved = self.resolve(uri)?;

        let contents = match resolved.handler.read(uri, &resolved.variables).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Resource {} lookup failed: {}", resolved.definition.name, e);
                let payload = serde_json::json!({ "error": e.to_string() });
                vec![ResourceContents::text(
                    uri,
                    resolved.definition.mime_type.as_deref(),
                    payload.to_string(),
                )]
            }
        };

        Ok(ReadResourceResult { contents })
    }

    pub fn list(&self) -> Vec<Resource> {
        self.statics
            .read()
            .iter()
            .map(|e| {
                let d = &e.definition;
                Resource {
                    uri: d.descriptor.key().to_string(),
                    name: d.name.clone(),
                    title: d.title.clone(),
                    description: d.description.clone(),
                    mime_type: d.mime_type.clone(),
                }
            })
            .collect()
    }

    pub fn list_templates(&self) -> Vec<ResourceTemplate> {
        self.templates
            .read()
            .iter()
            .map(|e| {
                let d = &e.definition;
                ResourceTemplate {
                    uri_template: d.descriptor.key().to_string(),
                    name: d.name.clone(),
                    title: d.title.clone(),
                    description: d.description.clone(),
                    mime_type: d.mime_type.clone(),
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.statics.read().len() + self.templates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{McpError, StoreError};

    struct Fixed {
        name: &'static str,
        descriptor: ResourceDescriptor,
    }

    #[async_trait]
    impl ResourceHandler for Fixed {
        fn definition(&self) -> ResourceDefinition {
            ResourceDefinition {
                name: self.name.into(),
                descriptor: self.descriptor.clone(),
                title: None,
                description: None,
                mime_type: Some("application/json".into()),
            }
        }

        async fn read(
            &self,
            uri: &str,
            variables: &TemplateVariables,
        ) -> Result<Vec<ResourceContents>> {
            if variables.get("id").map(String::as_str) == Some("missing") {
                return Err(McpError::Store(StoreError::UserNotFound));
            }
            let text = format!("{}:{:?}", self.name, variables);
            Ok(vec![ResourceContents::text(uri, Some("text/plain"), text)])
        }
    }

    fn registry() -> ResourceRegistry {
        let registry = ResourceRegistry::new();
        registry
            .register(Fixed {
                name: "wildcard",
                descriptor: ResourceDescriptor::template("items://{id}").unwrap(),
            })
            .unwrap();
        registry
            .register(Fixed {
                name: "all",
                descriptor: ResourceDescriptor::fixed("items://all"),
            })
            .unwrap();
        registry
            .register(Fixed {
                name: "second-template",
                descriptor: ResourceDescriptor::template("items://{key}/detail").unwrap(),
            })
            .unwrap();
        registry
    }

    #[test]
    fn test_static_wins_over_template() {
        let resolved = registry().resolve("items://all").unwrap();
        assert_eq!(resolved.definition.name, "all");
        assert!(resolved.variables.is_empty());
    }

    #[test]
    fn test_template_resolution() {
        let registry = registry();
        let resolved = registry.resolve("items://7").unwrap();
        assert_eq!(resolved.definition.name, "wildcard");
        assert_eq!(resolved.variables["id"], "7");

        let resolved = registry.resolve("items://7/detail").unwrap();
        assert_eq!(resolved.definition.name, "second-template");
        assert_eq!(resolved.variables["key"], "7");
    }

    #[test]
    fn test_unmatched_uri_is_not_found() {
        let err = registry().resolve("other://7").err().unwrap();
        assert!(matches!(err, ProtocolError::ResourceNotFound(uri) if uri == "other://7"));
    }

    #[test]
    fn test_listing_splits_static_and_templates() {
        let registry = registry();
        assert_eq!(registry.len(), 3);
        let statics = registry.list();
        assert_eq!(statics.len(), 1);
        assert_eq!(statics[0].uri, "items://all");
        let templates = registry.list_templates();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].uri_template, "items://{id}");
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = registry();
        let err = registry
            .register(Fixed {
                name: "all",
                descriptor: ResourceDescriptor::fixed("items://everything"),
            })
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { kind: "resource", .. }));
    }

    #[tokio::test]
    async fn test_read_echoes_requested_uri() {
        let result = registry().read("items://all").await.unwrap();
        assert_eq!(result.contents.len(), 1);
        assert_eq!(result.contents[0].uri, "items://all");
    }

    #[tokio::test]
    async fn test_handler_failure_is_domain_payload() {
        let result = registry().read("items://missing").await.unwrap();
        assert_eq!(result.contents[0].uri, "items://missing");
        assert_eq!(
            result.contents[0].text.as_deref(),
            Some(r#"{"error":"User not found"}"#)
        );
    }
}
