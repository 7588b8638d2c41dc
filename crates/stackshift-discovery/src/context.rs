//! Discovery context with read-through caching
//!
//! Owns the discovery cache explicitly; there is no process-wide cache.
//! Entries are keyed by `(resource_type, region)` and are only ever replaced
//! whole or invalidated.

use crate::error::DiscoveryError;
use crate::port::{DiscoveryOptions, DiscoveryPort};
use crate::provider::ResourceProvider;
use futures::stream::{self, StreamExt};
use moka::future::Cache;
use stackshift_model::{DiscoveredResource, ResourceType};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Discovery context configuration
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Region used when a call does not name one
    pub default_region: String,
    /// Cache time-to-live
    pub cache_ttl: Duration,
    /// Maximum cached `(type, region)` entries
    pub max_capacity: u64,
    /// Maximum concurrent discoveries in [`DiscoveryContext::discover_many`]
    pub concurrency: usize,
}

impl DiscoveryConfig {
    /// Create config for a default region
    #[inline]
    #[must_use]
    pub fn new(default_region: impl Into<String>) -> Self {
        Self {
            default_region: default_region.into(),
            ..Self::default()
        }
    }

    /// With cache TTL
    #[inline]
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// With fan-out bound
    #[inline]
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            default_region: "us-east-1".to_string(),
            cache_ttl: Duration::from_secs(300),
            max_capacity: 1_000,
            concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    resource_type: ResourceType,
    region: String,
}

#[derive(Debug)]
struct CachedEntry {
    resources: Vec<DiscoveredResource>,
    fetched_at: Instant,
}

/// Cached discovery over a [`ResourceProvider`]
#[derive(Debug)]
pub struct DiscoveryContext {
    provider: Arc<dyn ResourceProvider>,
    cache: Cache<CacheKey, Arc<CachedEntry>>,
    config: DiscoveryConfig,
    disposed: AtomicBool,
}

impl DiscoveryContext {
    /// Create context over a provider
    #[must_use]
    pub fn new(provider: Arc<dyn ResourceProvider>, config: DiscoveryConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.cache_ttl)
            .build();
        Self {
            provider,
            cache,
            config,
            disposed: AtomicBool::new(false),
        }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Discover several resource types concurrently
    ///
    /// At most `config.concurrency` discoveries are in flight. Each type
    /// succeeds or fails independently.
    pub async fn discover_many<I>(
        &self,
        resource_types: I,
        region: Option<&str>,
        options: DiscoveryOptions,
    ) -> BTreeMap<ResourceType, Result<Vec<DiscoveredResource>, DiscoveryError>>
    where
        I: IntoIterator<Item = ResourceType>,
    {
        stream::iter(resource_types)
            .map(|resource_type| async move {
                let result = self
                    .discover_resource_type(&resource_type, region, options)
                    .await;
                (resource_type, result)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect()
    }

    /// Drop every cached entry
    pub fn clear_cache(&self) {
        tracing::debug!("clearing discovery cache");
        self.cache.invalidate_all();
    }

    /// Number of live cache entries
    pub async fn cached_entries(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    /// Release the cache; later discoveries fail with `Disposed`
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            self.cache.invalidate_all();
            tracing::debug!("discovery context disposed");
        }
    }

    /// Whether [`dispose`](Self::dispose) has been called
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    async fn fetch(
        &self,
        resource_type: &ResourceType,
        region: &str,
    ) -> Result<Vec<DiscoveredResource>, DiscoveryError> {
        let listed = self.provider.list_resources(resource_type, region).await?;

        // Order preserved; tag lookups bounded like type fan-out
        let enriched = stream::iter(listed)
            .map(|resource| self.enrich(resource))
            .buffered(self.config.concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        Ok(enriched)
    }

    async fn enrich(&self, resource: DiscoveredResource) -> DiscoveredResource {
        match self.provider.fetch_tags(&resource).await {
            Ok(None) => resource,
            Ok(Some(tags)) => resource.to_builder().tags(tags).build(),
            Err(e) => {
                tracing::warn!(
                    physical_id = resource.physical_id(),
                    error = %e,
                    "tag lookup failed, continuing with empty tags"
                );
                resource.to_builder().tags_unavailable().build()
            }
        }
    }
}

#[async_trait::async_trait]
impl DiscoveryPort for DiscoveryContext {
    #[tracing::instrument(skip(self, resource_type, options), fields(resource_type = %resource_type))]
    async fn discover_resource_type(
        &self,
        resource_type: &ResourceType,
        region: Option<&str>,
        options: DiscoveryOptions,
    ) -> Result<Vec<DiscoveredResource>, DiscoveryError> {
        if self.is_disposed() {
            return Err(DiscoveryError::Disposed);
        }
        if !resource_type.is_supported() {
            return Err(DiscoveryError::UnsupportedResourceType(resource_type.clone()));
        }

        let region = region.unwrap_or(self.config.default_region.as_str());
        let key = CacheKey {
            resource_type: resource_type.clone(),
            region: region.to_string(),
        };

        if options.use_cache {
            if let Some(entry) = self.cache.get(&key).await {
                let max_age = options.cache_expiry.unwrap_or(self.config.cache_ttl);
                if entry.fetched_at.elapsed() < max_age {
                    tracing::debug!(count = entry.resources.len(), "discovery cache hit");
                    return Ok(entry.resources.clone());
                }
            }
        }

        let resources = self.fetch(resource_type, region).await?;
        tracing::debug!(count = resources.len(), region, "discovered resources");

        self.cache
            .insert(
                key,
                Arc::new(CachedEntry {
                    resources: resources.clone(),
                    fetched_at: Instant::now(),
                }),
            )
            .await;

        Ok(resources)
    }
}
