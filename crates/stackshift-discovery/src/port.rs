//! Discovery port consumed by the resolver and migration steps

use crate::error::DiscoveryError;
use stackshift_model::{DiscoveredResource, ResourceType};
use std::time::Duration;

/// Per-call discovery options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Serve from cache when a fresh entry exists
    pub use_cache: bool,
    /// Maximum entry age for this call; `None` uses the context TTL
    pub cache_expiry: Option<Duration>,
}

impl DiscoveryOptions {
    /// Bypass the cache for this call
    #[inline]
    #[must_use]
    pub fn fresh() -> Self {
        Self {
            use_cache: false,
            cache_expiry: None,
        }
    }

    /// With maximum entry age
    #[inline]
    #[must_use]
    pub fn with_cache_expiry(mut self, expiry: Duration) -> Self {
        self.cache_expiry = Some(expiry);
        self
    }
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            cache_expiry: None,
        }
    }
}

/// Source of normalized live resources, one resource type at a time
///
/// # Errors
/// Implementations return `UnsupportedResourceType` for types outside the
/// supported set and propagate provider errors unchanged otherwise.
#[async_trait::async_trait]
pub trait DiscoveryPort: Send + Sync + std::fmt::Debug {
    /// Discover all live resources of one type in a region
    async fn discover_resource_type(
        &self,
        resource_type: &ResourceType,
        region: Option<&str>,
        options: DiscoveryOptions,
    ) -> Result<Vec<DiscoveredResource>, DiscoveryError>;
}
