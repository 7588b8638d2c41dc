//! Cascading physical-id resolver

use crate::error::ResolveError;
use crate::intervention::InterventionPort;
use crate::matcher::{MatchResult, ResourceMatcher};
use crate::strategy::{ResolutionStrategy, StrategyError, StrategyFailure};
use serde::{Deserialize, Serialize};
use stackshift_discovery::{DiscoveryError, DiscoveryOptions, DiscoveryPort};
use stackshift_model::{ClassifiedResource, ResourceType, TemplateProperties};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Resolver configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverConfig {
    /// Minimum best-match confidence for auto-discovery
    pub auto_match_threshold: f64,
    /// Include the human-intervention strategy
    pub enable_human_intervention: bool,
    /// Options passed to every discovery call
    pub discovery_options: DiscoveryOptions,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            auto_match_threshold: 0.9,
            enable_human_intervention: true,
            discovery_options: DiscoveryOptions::default(),
        }
    }
}

/// Resource to resolve
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionRequest {
    pub logical_id: String,
    pub resource_type: ResourceType,
    pub properties: TemplateProperties,
    /// Region override; `None` uses the discovery default
    pub region: Option<String>,
}

impl ResolutionRequest {
    /// Create request
    #[must_use]
    pub fn new(
        logical_id: impl Into<String>,
        resource_type: impl Into<ResourceType>,
        properties: TemplateProperties,
    ) -> Self {
        Self {
            logical_id: logical_id.into(),
            resource_type: resource_type.into(),
            properties,
            region: None,
        }
    }

    /// With region
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

impl From<&ClassifiedResource> for ResolutionRequest {
    fn from(resource: &ClassifiedResource) -> Self {
        Self::new(
            resource.logical_id.clone(),
            resource.resource_type.clone(),
            resource.properties.clone(),
        )
    }
}

/// Resolved physical id with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub logical_id: String,
    pub physical_id: String,
    /// Name of the strategy that answered
    pub strategy: String,
    pub confidence: f64,
}

impl Resolution {
    pub(crate) fn new(
        request: &ResolutionRequest,
        physical_id: String,
        strategy: &str,
        confidence: f64,
    ) -> Self {
        Self {
            logical_id: request.logical_id.clone(),
            physical_id,
            strategy: strategy.to_string(),
            confidence,
        }
    }
}

/// Resolves logical resources to physical ids through a strategy cascade
pub struct PhysicalIdResolver {
    discovery: Arc<dyn DiscoveryPort>,
    matcher: ResourceMatcher,
    pub(crate) intervention: Option<Arc<dyn InterventionPort>>,
    config: ResolverConfig,
}

impl fmt::Debug for PhysicalIdResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicalIdResolver")
            .field("discovery", &self.discovery)
            .field("matcher", &self.matcher)
            .field("intervention", &self.intervention.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl PhysicalIdResolver {
    /// Create resolver without an operator
    #[must_use]
    pub fn new(discovery: Arc<dyn DiscoveryPort>, matcher: ResourceMatcher) -> Self {
        Self {
            discovery,
            matcher,
            intervention: None,
            config: ResolverConfig::default(),
        }
    }

    /// With intervention adapter
    #[must_use]
    pub fn with_intervention(mut self, intervention: Arc<dyn InterventionPort>) -> Self {
        self.intervention = Some(intervention);
        self
    }

    /// With configuration
    #[must_use]
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Strategy cascade for one resolution, built fresh per call
    #[must_use]
    pub fn strategies(&self) -> Vec<ResolutionStrategy> {
        let mut strategies = vec![
            ResolutionStrategy::Explicit,
            ResolutionStrategy::AutoDiscovery {
                threshold: self.config.auto_match_threshold,
            },
        ];
        if self.config.enable_human_intervention {
            strategies.push(ResolutionStrategy::HumanIntervention);
        }
        strategies
    }

    /// Resolve one resource, trying strategies in order
    ///
    /// # Errors
    /// `ResolveError::ResolutionExhausted` listing every strategy's failure,
    /// or `ResolveError::UnsupportedResourceType` as soon as discovery rejects
    /// the type.
    #[tracing::instrument(skip(self, request), fields(logical_id = %request.logical_id))]
    pub async fn resolve(&self, request: &ResolutionRequest) -> Result<Resolution, ResolveError> {
        let mut failures = Vec::new();

        for strategy in self.strategies() {
            match strategy.execute(self, request).await {
                Ok(resolution) => {
                    tracing::info!(
                        physical_id = %resolution.physical_id,
                        strategy = strategy.name(),
                        confidence = resolution.confidence,
                        "resolved physical id"
                    );
                    return Ok(resolution);
                }
                Err(StrategyError::Discovery(DiscoveryError::UnsupportedResourceType(
                    resource_type,
                ))) => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        resource_type = %resource_type,
                        "unsupported resource type, not retrying"
                    );
                    return Err(ResolveError::UnsupportedResourceType {
                        logical_id: request.logical_id.clone(),
                        resource_type,
                    });
                }
                Err(e) => {
                    tracing::debug!(strategy = strategy.name(), error = %e, "strategy failed");
                    failures.push(StrategyFailure::from_error(strategy.name(), &e));
                }
            }
        }

        tracing::warn!(attempts = failures.len(), "resolution exhausted");
        Err(ResolveError::ResolutionExhausted {
            logical_id: request.logical_id.clone(),
            resource_type: request.resource_type.clone(),
            failures,
        })
    }

    /// Resolve a batch, one resource at a time
    ///
    /// # Errors
    /// `ResolveError::AggregateResolutionFailure` naming each failed logical
    /// id and carrying the resolutions that did succeed.
    pub async fn resolve_many(
        &self,
        requests: &[ResolutionRequest],
    ) -> Result<BTreeMap<String, Resolution>, ResolveError> {
        let mut resolved = BTreeMap::new();
        let mut failed = BTreeMap::new();

        for request in requests {
            match self.resolve(request).await {
                Ok(resolution) => {
                    resolved.insert(request.logical_id.clone(), resolution);
                }
                Err(e) => {
                    failed.insert(request.logical_id.clone(), e);
                }
            }
        }

        if failed.is_empty() {
            Ok(resolved)
        } else {
            Err(ResolveError::AggregateResolutionFailure { failed, resolved })
        }
    }

    /// Whether explicit or auto-discovery would resolve without an operator
    ///
    /// Discovery errors count as "no".
    pub async fn can_resolve_automatically(&self, request: &ResolutionRequest) -> bool {
        for strategy in self.strategies() {
            if matches!(strategy, ResolutionStrategy::HumanIntervention) {
                continue;
            }
            if strategy.execute(self, request).await.is_ok() {
                return true;
            }
        }
        false
    }

    /// Discover candidates for a request and score them
    pub(crate) async fn discover_and_match(
        &self,
        request: &ResolutionRequest,
    ) -> Result<MatchResult, StrategyError> {
        let candidates = self
            .discovery
            .discover_resource_type(
                &request.resource_type,
                request.region.as_deref(),
                self.config.discovery_options,
            )
            .await?;
        Ok(self.matcher.match_resource(
            &request.logical_id,
            &request.resource_type,
            &request.properties,
            &candidates,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intervention::{InterventionError, MockInterventionPort};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use stackshift_model::{DiscoveredResource, PropertyValue};

    /// Discovery fake that counts calls
    #[derive(Debug, Default)]
    struct FakeDiscovery {
        resources: Vec<DiscoveredResource>,
        calls: Mutex<usize>,
        fail: bool,
    }

    impl FakeDiscovery {
        fn with(ids: &[&str]) -> Self {
            Self {
                resources: ids
                    .iter()
                    .map(|id| DiscoveredResource::builder(*id, ResourceType::dynamodb_table()).build())
                    .collect(),
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl DiscoveryPort for FakeDiscovery {
        async fn discover_resource_type(
            &self,
            resource_type: &ResourceType,
            _region: Option<&str>,
            _options: DiscoveryOptions,
        ) -> Result<Vec<DiscoveredResource>, DiscoveryError> {
            *self.calls.lock() += 1;
            if !resource_type.is_supported() {
                return Err(DiscoveryError::UnsupportedResourceType(resource_type.clone()));
            }
            if self.fail {
                return Err(stackshift_discovery::ProviderError::new("Throttling", "slow down").into());
            }
            Ok(self
                .resources
                .iter()
                .filter(|r| r.resource_type() == resource_type)
                .cloned()
                .collect())
        }
    }

    fn named(logical_id: &str, table_name: &str) -> ResolutionRequest {
        let mut props = TemplateProperties::new();
        props.insert("TableName".into(), PropertyValue::literal(json!(table_name)));
        ResolutionRequest::new(logical_id, ResourceType::dynamodb_table(), props)
    }

    fn unnamed(logical_id: &str) -> ResolutionRequest {
        ResolutionRequest::new(logical_id, ResourceType::dynamodb_table(), TemplateProperties::new())
    }

    #[tokio::test]
    async fn explicit_name_skips_discovery() {
        let discovery = Arc::new(FakeDiscovery::with(&["orders-dev"]));
        let resolver = PhysicalIdResolver::new(discovery.clone(), ResourceMatcher::default());

        let resolution = resolver.resolve(&named("OrdersTable", "orders-dev")).await.unwrap();

        assert_eq!(resolution.physical_id, "orders-dev");
        assert_eq!(resolution.strategy, "explicit");
        assert_eq!(discovery.calls(), 0);
    }

    #[tokio::test]
    async fn reference_name_falls_through_to_discovery() {
        let discovery = Arc::new(FakeDiscovery::with(&["orderstable"]));
        // Logical-id similarity alone scores 0.4
        let matcher = ResourceMatcher::new(crate::matcher::MatcherConfig::new(0.3));
        let resolver = PhysicalIdResolver::new(discovery.clone(), matcher)
            .with_config(ResolverConfig {
                auto_match_threshold: 0.3,
                enable_human_intervention: false,
                ..ResolverConfig::default()
            });
        let mut props = TemplateProperties::new();
        props.insert(
            "TableName".into(),
            PropertyValue::Reference {
                logical_id: "NameParam".into(),
            },
        );

        let resolution = resolver
            .resolve(&ResolutionRequest::new("OrdersTable", ResourceType::dynamodb_table(), props))
            .await
            .unwrap();
        assert_eq!(resolution.strategy, "auto-discovery");
        assert_eq!(resolution.physical_id, "orderstable");
        assert_eq!(discovery.calls(), 1);
    }

    #[tokio::test]
    async fn dissimilar_candidates_reach_the_operator() {
        let discovery = Arc::new(FakeDiscovery::with(&[
            "user-data",
            "users-legacy",
            "user-profiles",
        ]));
        let mut port = MockInterventionPort::new();
        port.expect_prompt_for_physical_id()
            .times(1)
            .returning(|_, _, candidates| {
                assert_eq!(candidates.len(), 3);
                Ok("users-legacy".to_string())
            });

        let resolver = PhysicalIdResolver::new(discovery, ResourceMatcher::default())
            .with_intervention(Arc::new(port));
        let resolution = resolver.resolve(&unnamed("UsersTable")).await.unwrap();

        assert_eq!(resolution.physical_id, "users-legacy");
        assert_eq!(resolution.strategy, "human-intervention");
    }

    #[tokio::test]
    async fn skip_exhausts_and_is_cancelled() {
        let mut port = MockInterventionPort::new();
        port.expect_prompt_for_physical_id()
            .returning(|logical_id, _, _| Err(InterventionError::skipped(logical_id)));

        let resolver = PhysicalIdResolver::new(
            Arc::new(FakeDiscovery::with(&["user-data"])),
            ResourceMatcher::default(),
        )
        .with_intervention(Arc::new(port));

        let err = resolver.resolve(&unnamed("UsersTable")).await.unwrap_err();
        match &err {
            ResolveError::ResolutionExhausted { failures, .. } => {
                let names: Vec<_> = failures.iter().map(|f| f.strategy).collect();
                assert_eq!(names, vec!["explicit", "auto-discovery", "human-intervention"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn missing_operator_is_a_failure_not_a_panic() {
        let resolver = PhysicalIdResolver::new(
            Arc::new(FakeDiscovery::default()),
            ResourceMatcher::default(),
        );
        let err = resolver.resolve(&unnamed("UsersTable")).await.unwrap_err();
        assert!(err.to_string().contains("no intervention adapter configured"));
        assert!(!err.is_cancelled());
    }

    #[tokio::test]
    async fn discovery_errors_are_recorded_per_strategy() {
        let discovery = Arc::new(FakeDiscovery {
            fail: true,
            ..FakeDiscovery::default()
        });
        let resolver = PhysicalIdResolver::new(discovery.clone(), ResourceMatcher::default())
            .with_intervention(Arc::new(MockInterventionPort::new()));

        let err = resolver.resolve(&unnamed("UsersTable")).await.unwrap_err();
        assert!(err.to_string().contains("Throttling"));
        // auto-discovery and human-intervention each tried discovery
        assert_eq!(discovery.calls(), 2);
    }

    #[tokio::test]
    async fn unsupported_type_stops_the_cascade() {
        let discovery = Arc::new(FakeDiscovery::default());
        let mut port = MockInterventionPort::new();
        port.expect_prompt_for_physical_id().never();
        let resolver = PhysicalIdResolver::new(discovery.clone(), ResourceMatcher::default())
            .with_intervention(Arc::new(port));
        let request =
            ResolutionRequest::new("Widget", ResourceType::new("Custom::Widget"), TemplateProperties::new());

        let err = resolver.resolve(&request).await.unwrap_err();

        assert!(matches!(
            &err,
            ResolveError::UnsupportedResourceType { logical_id, resource_type }
                if logical_id == "Widget" && resource_type.as_str() == "Custom::Widget"
        ));
        assert_eq!(discovery.calls(), 1);
    }

    #[tokio::test]
    async fn batch_keeps_partial_results() {
        let resolver = PhysicalIdResolver::new(
            Arc::new(FakeDiscovery::default()),
            ResourceMatcher::default(),
        )
        .with_config(ResolverConfig {
            enable_human_intervention: false,
            ..ResolverConfig::default()
        });
        let requests = vec![
            named("A", "table-a"),
            unnamed("B"),
            named("C", "table-c"),
            unnamed("D"),
        ];

        let err = resolver.resolve_many(&requests).await.unwrap_err();

        assert_eq!(err.failed_logical_ids(), vec!["B", "D"]);
        let resolved = err.resolved().unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved["A"].physical_id, "table-a");
        assert_eq!(resolved["C"].physical_id, "table-c");
    }

    #[tokio::test]
    async fn batch_succeeds_when_all_resolve() {
        let resolver = PhysicalIdResolver::new(
            Arc::new(FakeDiscovery::default()),
            ResourceMatcher::default(),
        );
        let map = resolver
            .resolve_many(&[named("A", "a"), named("B", "b")])
            .await
            .unwrap();
        assert_eq!(map.len(), 2);
    }

    #[tokio::test]
    async fn automatic_resolution_check_never_prompts() {
        let mut port = MockInterventionPort::new();
        port.expect_prompt_for_physical_id().never();
        let resolver = PhysicalIdResolver::new(
            Arc::new(FakeDiscovery::with(&["orders-dev", "user-data"])),
            ResourceMatcher::default(),
        )
        .with_intervention(Arc::new(port));

        assert!(resolver.can_resolve_automatically(&named("Orders", "orders-dev")).await);
        assert!(!resolver.can_resolve_automatically(&unnamed("UsersTable")).await);
    }

    #[test]
    fn disabling_intervention_shortens_cascade() {
        let resolver = PhysicalIdResolver::new(
            Arc::new(FakeDiscovery::default()),
            ResourceMatcher::default(),
        );
        assert_eq!(resolver.strategies().len(), 3);

        let resolver = resolver.with_config(ResolverConfig {
            enable_human_intervention: false,
            ..ResolverConfig::default()
        });
        assert_eq!(resolver.strategies().len(), 2);
    }
}
