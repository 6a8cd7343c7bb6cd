//! Host-side cache of discovery results.
//!
//! The agent's capability set is fixed once the session is active, so list
//! results stay valid for the whole connection. `clear` forces a re-fetch.

use crate::protocol::{Prompt, Resource, ResourceTemplate, Tool};
use parking_lot::RwLock;
use tracing::debug;

#[derive(Default)]
pub struct DiscoveryCache {
    tools: RwLock<Option<Vec<Tool>>>,
    resources: RwLock<Option<Vec<Resource>>>,
    templates: RwLock<Option<Vec<ResourceTemplate>>>,
    prompts: RwLock<Option<Vec<Prompt>>>,
}

impl DiscoveryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tools(&self) -> Option<Vec<Tool>> {
        self.tools.read().clone()
    }

    pub fn set_tools(&self, tools: Vec<Tool>) {
        debug!("Caching {} tools", tools.len());
        *self.tools.write() = Some(tools);
    }

    pub fn resources(&self) -> Option<Vec<Resource>> {
        self.resources.read().clone()
    }

    pub fn set_resources(&self, resources: Vec<Resource>) {
        debug!("Caching {} resources", resources.len());
        *self.resources.write() = Some(resources);
    }

    pub fn resource_templates(&self) -> Option<Vec<ResourceTemplate>> {
        self.templates.read().clone()
    }

    pub fn set_resource_templates(&self, templates: Vec<ResourceTemplate>) {
        debug!("Caching {} resource templates", templates.len());
        *self.templates.write() = Some(templates);
    }

    pub fn prompts(&self) -> Option<Vec<Prompt>> {
        self.prompts.read().clone()
    }

    pub fn set_prompts(&self, prompts: Vec<Prompt>) {
        debug!("Caching {} prompts", prompts.len());
        *self.prompts.write() = Some(prompts);
    }

    /// Clear all cache entries.
    pub fn clear(&self) {
        debug!("Clearing discovery cache");
        *self.tools.write() = None;
        *self.resources.write() = None;
        *self.templates.write() = None;
        *self.prompts.write() = None;
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            tools_cached: self.tools.read().as_ref().map_or(0, Vec::len),
            resources_cached: self.resources.read().as_ref().map_or(0, Vec::len),
            templates_cached: self.templates.read().as_ref().map_or(0, Vec::len),
            prompts_cached: self.prompts.read().as_ref().map_or(0, Vec::len),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub tools_cached: usize,
    pub resources_cached: usize,
    pub templates_cached: usize,
    pub prompts_cached: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(uri: &str) -> Resource {
        Resource {
            uri: uri.into(),
            name: "r".into(),
            title: None,
            description: None,
            mime_type: None,
        }
    }

    #[test]
    fn test_cache_operations() {
        let cache = DiscoveryCache::new();
        assert!(cache.resources().is_none());

        cache.set_resources(vec![resource("users://all")]);
        assert_eq!(cache.resources().unwrap()[0].uri, "users://all");
        assert_eq!(cache.stats().resources_cached, 1);

        // An empty list is still a cached answer.
        cache.set_prompts(vec![]);
        assert_eq!(cache.prompts().map(|p| p.len()), Some(0));
    }

    #[test]
    fn test_cache_clear() {
        let cache = DiscoveryCache::new();
        cache.set_resources(vec![resource("users://all")]);
        cache.set_tools(vec![]);

        cache.clear();
        assert!(cache.resources().is_none());
        assert!(cache.tools().is_none());
        assert_eq!(
            cache.stats(),
            CacheStats {
                tools_cached: 0,
                resources_cached: 0,
                templates_cached: 0,
                prompts_cached: 0,
            }
        );
    }
}
