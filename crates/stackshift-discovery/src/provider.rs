//! Raw resource providers
//!
//! A [`ResourceProvider`] wraps the cloud API enumeration and describe calls.
//! [`StaticResourceProvider`] serves a fixed inventory, loaded from a JSON
//! snapshot or built in memory.

use crate::error::{DiscoveryError, ProviderError};
use stackshift_model::{DiscoveredResource, ResourceType};
use std::collections::BTreeMap;
use std::path::Path;

/// Raw enumeration of live resources
#[async_trait::async_trait]
pub trait ResourceProvider: Send + Sync + std::fmt::Debug {
    /// List resources of one type in one region
    async fn list_resources(
        &self,
        resource_type: &ResourceType,
        region: &str,
    ) -> Result<Vec<DiscoveredResource>, ProviderError>;

    /// Fetch tags for a listed resource
    ///
    /// `Ok(None)` means the listing already carried the tags.
    async fn fetch_tags(
        &self,
        _resource: &DiscoveredResource,
    ) -> Result<Option<BTreeMap<String, String>>, ProviderError> {
        Ok(None)
    }
}

/// Provider over a fixed inventory of resources
#[derive(Debug, Clone, Default)]
pub struct StaticResourceProvider {
    resources: Vec<DiscoveredResource>,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum InventoryFile {
    List(Vec<DiscoveredResource>),
    Wrapped { resources: Vec<DiscoveredResource> },
}

impl StaticResourceProvider {
    /// Create provider over resources
    #[inline]
    #[must_use]
    pub fn new(resources: Vec<DiscoveredResource>) -> Self {
        Self { resources }
    }

    /// Load a JSON inventory snapshot
    ///
    /// Accepts either a bare array of resources or `{"resources": [...]}`.
    ///
    /// # Errors
    /// `DiscoveryError::Inventory` on IO or JSON errors.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DiscoveryError> {
        let path = path.as_ref();
        let inventory_error = |reason: String| DiscoveryError::Inventory {
            path: path.to_path_buf(),
            reason,
        };
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| inventory_error(e.to_string()))?;
        let file: InventoryFile =
            serde_json::from_str(&text).map_err(|e| inventory_error(e.to_string()))?;
        let resources = match file {
            InventoryFile::List(resources) | InventoryFile::Wrapped { resources } => resources,
        };
        tracing::debug!(path = %path.display(), count = resources.len(), "loaded inventory");
        Ok(Self::new(resources))
    }

    /// Number of resources in the inventory
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[async_trait::async_trait]
impl ResourceProvider for StaticResourceProvider {
    async fn list_resources(
        &self,
        resource_type: &ResourceType,
        region: &str,
    ) -> Result<Vec<DiscoveredResource>, ProviderError> {
        Ok(self
            .resources
            .iter()
            .filter(|r| r.resource_type() == resource_type)
            // Regionless entries (global services) match any region
            .filter(|r| r.region().is_empty() || r.region() == region)
            .cloned()
            .collect())
    }
}
