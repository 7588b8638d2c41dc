//! Discovered live resources
//!
//! A [`DiscoveredResource`] is an immutable snapshot produced by discovery.
//! Fields are private; construction goes through [`DiscoveredResourceBuilder`].

use crate::resource_type::ResourceType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata key set when a resource's tags could not be fetched
pub const TAGS_UNAVAILABLE: &str = "tagsUnavailable";

/// Snapshot of a live provider resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredResource {
    physical_id: String,
    resource_type: ResourceType,
    #[serde(default)]
    region: String,
    #[serde(default)]
    arn: String,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
}

impl DiscoveredResource {
    /// Start building a resource snapshot
    #[inline]
    #[must_use]
    pub fn builder(
        physical_id: impl Into<String>,
        resource_type: impl Into<ResourceType>,
    ) -> DiscoveredResourceBuilder {
        DiscoveredResourceBuilder {
            inner: Self {
                physical_id: physical_id.into(),
                resource_type: resource_type.into(),
                region: String::new(),
                arn: String::new(),
                tags: BTreeMap::new(),
                created_at: None,
                metadata: BTreeMap::new(),
            },
        }
    }

    /// Rebuild from this snapshot (produces a new snapshot)
    #[inline]
    #[must_use]
    pub fn to_builder(&self) -> DiscoveredResourceBuilder {
        DiscoveredResourceBuilder {
            inner: self.clone(),
        }
    }

    #[inline]
    #[must_use]
    pub fn physical_id(&self) -> &str {
        &self.physical_id
    }

    #[inline]
    #[must_use]
    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    #[inline]
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    #[inline]
    #[must_use]
    pub fn arn(&self) -> &str {
        &self.arn
    }

    #[inline]
    #[must_use]
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    #[inline]
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    /// Whether tag lookup failed during discovery
    #[must_use]
    pub fn tags_unavailable(&self) -> bool {
        self.metadata
            .get(TAGS_UNAVAILABLE)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

/// Builder for [`DiscoveredResource`]
#[derive(Debug, Clone)]
pub struct DiscoveredResourceBuilder {
    inner: DiscoveredResource,
}

impl DiscoveredResourceBuilder {
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.inner.region = region.into();
        self
    }

    #[must_use]
    pub fn arn(mut self, arn: impl Into<String>) -> Self {
        self.inner.arn = arn.into();
        self
    }

    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.tags.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.inner.tags = tags;
        self
    }

    #[must_use]
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.inner.created_at = Some(created_at);
        self
    }

    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.inner.metadata.insert(key.into(), value);
        self
    }

    /// Mark tags as unavailable and clear any partial tag set
    #[must_use]
    pub fn tags_unavailable(mut self) -> Self {
        self.inner.tags.clear();
        self.inner
            .metadata
            .insert(TAGS_UNAVAILABLE.to_string(), serde_json::Value::Bool(true));
        self
    }

    /// Finish the snapshot
    ///
    /// An empty ARN is derived from the service, region and physical id.
    #[must_use]
    pub fn build(mut self) -> DiscoveredResource {
        if self.inner.arn.is_empty() {
            if let Some(service) = self.inner.resource_type.service() {
                self.inner.arn = format!(
                    "arn:aws:{}:{}::{}",
                    service, self.inner.region, self.inner.physical_id
                );
            }
        }
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_sets_fields() {
        let resource = DiscoveredResource::builder("orders-dev", ResourceType::dynamodb_table())
            .region("us-east-1")
            .tag("stage", "dev")
            .metadata("BillingMode", json!("PAY_PER_REQUEST"))
            .build();

        assert_eq!(resource.physical_id(), "orders-dev");
        assert_eq!(resource.region(), "us-east-1");
        assert_eq!(resource.tags().get("stage").map(String::as_str), Some("dev"));
        assert_eq!(resource.arn(), "arn:aws:dynamodb:us-east-1::orders-dev");
        assert!(!resource.tags_unavailable());
    }

    #[test]
    fn explicit_arn_kept() {
        let resource = DiscoveredResource::builder("b", ResourceType::s3_bucket())
            .arn("arn:aws:s3:::b")
            .build();
        assert_eq!(resource.arn(), "arn:aws:s3:::b");
    }

    #[test]
    fn tags_unavailable_clears_tags() {
        let resource = DiscoveredResource::builder("q", "AWS::SQS::Queue")
            .tag("a", "b")
            .build()
            .to_builder()
            .tags_unavailable()
            .build();
        assert!(resource.tags().is_empty());
        assert!(resource.tags_unavailable());
    }

    #[test]
    fn deserializes_camel_case_snapshot() {
        let resource: DiscoveredResource = serde_json::from_value(json!({
            "physicalId": "users-legacy",
            "resourceType": "AWS::DynamoDB::Table",
            "region": "eu-west-1",
            "createdAt": "2024-01-01T00:00:00Z",
        }))
        .unwrap();
        assert_eq!(resource.physical_id(), "users-legacy");
        assert!(resource.created_at().is_some());
        assert!(resource.metadata().is_empty());
    }
}
