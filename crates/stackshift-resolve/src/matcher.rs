//! Confidence scoring of discovered resources against a template resource
//!
//! Scoring is a pure function of its inputs: the template properties, the
//! candidate snapshots and a reference time for the recency bonus. Candidates
//! of any other resource type are dropped before scoring.
//!
//! | Signal                                  | Contribution            |
//! |-----------------------------------------|-------------------------|
//! | physical id equals the template name    | 0.9, nothing else added |
//! | name similarity above 0.7               | similarity × 0.5        |
//! | logical id similarity above 0.7         | similarity × 0.4        |
//! | at least half the template tags present | +0.2                    |
//! | configuration property equal            | +0.3                    |
//! | created within the last 30 days         | +0.1                    |
//!
//! The sum is clamped to 1.0.

use crate::similarity::similarity;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use stackshift_model::{
    template_tags, values_equivalent, DiscoveredResource, ResourceType, TemplateProperties,
};
use std::cmp::Ordering;

/// Confidence assigned to an exact physical-name match
pub const EXACT_MATCH_CONFIDENCE: f64 = 0.9;

const EXACT_MATCH_REASON: &str = "Exact name match";

/// Best-match confidence below which a human should review the choice
pub const HUMAN_REVIEW_THRESHOLD: f64 = 0.9;

const SIMILARITY_FLOOR: f64 = 0.7;
const NAME_WEIGHT: f64 = 0.5;
const LOGICAL_ID_WEIGHT: f64 = 0.4;
const TAG_BONUS: f64 = 0.2;
const TAG_OVERLAP_RATIO: f64 = 0.5;
const CONFIG_BONUS: f64 = 0.3;
const RECENCY_BONUS: f64 = 0.1;
const RECENCY_WINDOW_DAYS: i64 = 30;

/// Matcher configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatcherConfig {
    /// Minimum confidence for a candidate to count as the best match
    pub threshold: f64,
}

impl MatcherConfig {
    /// Create config with threshold, clamped into `[0, 1]`
    #[inline]
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { threshold: 0.7 }
    }
}

/// One scored candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCandidate {
    pub physical_id: String,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
    /// Human-readable reasons behind the score
    pub match_reasons: Vec<String>,
    pub discovered_resource: DiscoveredResource,
}

/// Ranked candidates for one logical resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub logical_id: String,
    pub resource_type: ResourceType,
    /// All candidates, highest confidence first
    pub matches: Vec<MatchCandidate>,
    /// Top candidate when it reaches the matcher threshold
    pub best_match: Option<MatchCandidate>,
    /// No best match, or best match below [`HUMAN_REVIEW_THRESHOLD`]
    pub requires_human_review: bool,
}

/// Scores discovered resources against template resources
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceMatcher {
    config: MatcherConfig,
}

impl ResourceMatcher {
    /// Create matcher
    #[inline]
    #[must_use]
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Score candidates against a template resource using the current time
    #[must_use]
    pub fn match_resource(
        &self,
        logical_id: &str,
        resource_type: &ResourceType,
        properties: &TemplateProperties,
        candidates: &[DiscoveredResource],
    ) -> MatchResult {
        self.match_at(logical_id, resource_type, properties, candidates, Utc::now())
    }

    /// Score candidates with an explicit reference time
    #[must_use]
    pub fn match_at(
        &self,
        logical_id: &str,
        resource_type: &ResourceType,
        properties: &TemplateProperties,
        candidates: &[DiscoveredResource],
        now: DateTime<Utc>,
    ) -> MatchResult {
        let signals = TemplateSignals::new(logical_id, resource_type, properties);

        let mut matches: Vec<MatchCandidate> = candidates
            .iter()
            .filter(|candidate| candidate.resource_type() == resource_type)
            .map(|candidate| signals.score(candidate, now))
            .collect();
        // Stable: ties keep discovery order
        matches.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });

        let best_match = matches
            .first()
            .filter(|top| top.confidence >= self.config.threshold)
            .cloned();
        let requires_human_review = best_match
            .as_ref()
            .map_or(true, |best| best.confidence < HUMAN_REVIEW_THRESHOLD);

        tracing::debug!(
            logical_id,
            resource_type = %resource_type,
            candidates = matches.len(),
            best = best_match.as_ref().map(|b| b.physical_id.as_str()),
            requires_human_review,
            "scored candidates"
        );

        MatchResult {
            logical_id: logical_id.to_string(),
            resource_type: resource_type.clone(),
            matches,
            best_match,
            requires_human_review,
        }
    }
}

/// Template-side inputs, extracted once per match call
struct TemplateSignals<'a> {
    logical_id: String,
    expected_name: Option<String>,
    config_property: Option<(&'static str, &'a Value)>,
    tags: std::collections::BTreeMap<String, String>,
}

impl<'a> TemplateSignals<'a> {
    fn new(
        logical_id: &str,
        resource_type: &ResourceType,
        properties: &'a TemplateProperties,
    ) -> Self {
        let expected_name = resource_type
            .physical_name_property()
            .and_then(|p| properties.get(p))
            .and_then(|v| v.resolve_static());
        let config_property = resource_type.config_property().and_then(|p| {
            properties
                .get(p)
                .and_then(|v| v.as_literal())
                .map(|value| (p, value))
        });

        Self {
            logical_id: logical_id.to_lowercase(),
            expected_name,
            config_property,
            tags: template_tags(properties),
        }
    }

    fn score(&self, candidate: &DiscoveredResource, now: DateTime<Utc>) -> MatchCandidate {
        let physical_id = candidate.physical_id();
        let mut confidence = 0.0;
        let mut reasons = Vec::new();

        if self.expected_name.as_deref() == Some(physical_id) {
            return MatchCandidate {
                physical_id: physical_id.to_string(),
                confidence: EXACT_MATCH_CONFIDENCE,
                match_reasons: vec![EXACT_MATCH_REASON.to_string()],
                discovered_resource: candidate.clone(),
            };
        }

        let lowered = physical_id.to_lowercase();

        if let Some(name) = &self.expected_name {
            let s = similarity(&name.to_lowercase(), &lowered);
            if s > SIMILARITY_FLOOR {
                confidence += s * NAME_WEIGHT;
                reasons.push(format!("Name similarity {:.0}%", s * 100.0));
            }
        }

        let s = similarity(&self.logical_id, &lowered);
        if s > SIMILARITY_FLOOR {
            confidence += s * LOGICAL_ID_WEIGHT;
            reasons.push(format!("Logical ID similarity {:.0}%", s * 100.0));
        }

        if !self.tags.is_empty() {
            let shared = self
                .tags
                .iter()
                .filter(|(k, v)| candidate.tags().get(*k) == Some(*v))
                .count();
            #[allow(clippy::cast_precision_loss)]
            let ratio = shared as f64 / self.tags.len() as f64;
            if ratio >= TAG_OVERLAP_RATIO {
                confidence += TAG_BONUS;
                reasons.push(format!("Tag overlap {shared}/{}", self.tags.len()));
            }
        }

        if let Some((property, expected)) = self.config_property {
            if candidate
                .metadata()
                .get(property)
                .is_some_and(|live| values_equivalent(expected, live))
            {
                confidence += CONFIG_BONUS;
                reasons.push(format!("Configuration match ({property})"));
            }
        }

        if let Some(created) = candidate.created_at() {
            let age = now.signed_duration_since(created);
            if age >= Duration::zero() && age < Duration::days(RECENCY_WINDOW_DAYS) {
                confidence += RECENCY_BONUS;
                reasons.push("Recently created".to_string());
            }
        }

        MatchCandidate {
            physical_id: physical_id.to_string(),
            confidence: f64::min(confidence, 1.0),
            match_reasons: reasons,
            discovered_resource: candidate.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::json;
    use stackshift_model::PropertyValue;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn table(id: &str) -> DiscoveredResource {
        DiscoveredResource::builder(id, ResourceType::dynamodb_table())
            .region("us-east-1")
            .build()
    }

    fn props(pairs: &[(&str, Value)]) -> TemplateProperties {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), PropertyValue::literal(v.clone())))
            .collect()
    }

    #[test]
    fn exact_name_match_short_circuits() {
        let matcher = ResourceMatcher::default();
        let recent = table("orders-dev")
            .to_builder()
            .created_at(now() - Duration::days(1))
            .metadata("KeySchema", json!([{"AttributeName": "id"}]))
            .build();
        let properties = props(&[
            ("TableName", json!("orders-dev")),
            ("KeySchema", json!([{"AttributeName": "id"}])),
        ]);

        let result = matcher.match_at(
            "OrdersTable",
            &ResourceType::dynamodb_table(),
            &properties,
            &[recent],
            now(),
        );

        let best = result.best_match.expect("exact match");
        assert_eq!(best.physical_id, "orders-dev");
        assert!((best.confidence - EXACT_MATCH_CONFIDENCE).abs() < f64::EPSILON);
        assert_eq!(best.match_reasons, vec!["Exact name match".to_string()]);
        assert!(!result.requires_human_review);
    }

    #[test]
    fn other_resource_types_are_never_candidates() {
        let bucket = DiscoveredResource::builder("orders-dev", ResourceType::s3_bucket()).build();
        let properties = props(&[("TableName", json!("orders-dev"))]);

        let result = ResourceMatcher::default().match_at(
            "OrdersTable",
            &ResourceType::dynamodb_table(),
            &properties,
            &[bucket.clone()],
            now(),
        );
        assert!(result.matches.is_empty());
        assert!(result.best_match.is_none());
        assert!(result.requires_human_review);

        // Mixed list keeps only the tables, in discovery order
        let result = ResourceMatcher::default().match_at(
            "OrdersTable",
            &ResourceType::dynamodb_table(),
            &properties,
            &[bucket, table("orders-dev"), table("users-legacy")],
            now(),
        );
        let ids: Vec<_> = result.matches.iter().map(|m| m.physical_id.as_str()).collect();
        assert_eq!(ids, vec!["orders-dev", "users-legacy"]);
        let best = result.best_match.expect("table match");
        assert_eq!(best.discovered_resource.resource_type(), &ResourceType::dynamodb_table());
    }

    #[test]
    fn empty_candidates_need_review() {
        let result = ResourceMatcher::default().match_at(
            "UsersTable",
            &ResourceType::dynamodb_table(),
            &TemplateProperties::new(),
            &[],
            now(),
        );
        assert!(result.matches.is_empty());
        assert!(result.best_match.is_none());
        assert!(result.requires_human_review);
    }

    #[test]
    fn dissimilar_candidates_have_no_best_match() {
        let candidates = [table("user-data"), table("users-legacy"), table("user-profiles")];
        let result = ResourceMatcher::default().match_at(
            "UsersTable",
            &ResourceType::dynamodb_table(),
            &TemplateProperties::new(),
            &candidates,
            now(),
        );

        assert_eq!(result.matches.len(), 3);
        assert!(result.best_match.is_none());
        assert!(result.requires_human_review);
        assert!(result.matches.iter().all(|m| m.confidence < 0.7));
    }

    #[test]
    fn signals_accumulate() {
        let candidate = table("orders-table")
            .to_builder()
            .tag("team", "payments")
            .tag("env", "dev")
            .metadata("KeySchema", json!("id"))
            .created_at(now() - Duration::days(3))
            .build();
        let properties = props(&[
            ("KeySchema", json!("id")),
            (
                "Tags",
                json!([{"Key": "team", "Value": "payments"}, {"Key": "env", "Value": "prod"}]),
            ),
        ]);

        let result = ResourceMatcher::default().match_at(
            "OrdersTable",
            &ResourceType::dynamodb_table(),
            &properties,
            &[candidate],
            now(),
        );
        let top = &result.matches[0];

        // logical id "orderstable" vs "orders-table": one edit in twelve
        let expected = (1.0 - 1.0 / 12.0) * 0.4 + 0.2 + 0.3 + 0.1;
        assert!((top.confidence - expected).abs() < 1e-9, "{}", top.confidence);
        assert_eq!(top.match_reasons.len(), 4);
    }

    #[test]
    fn confidence_is_clamped() {
        let candidate = table("orders-dev-1")
            .to_builder()
            .tag("app", "orders")
            .metadata("KeySchema", json!("id"))
            .created_at(now())
            .build();
        let properties = props(&[
            ("TableName", json!("orders-dev")),
            ("KeySchema", json!("id")),
            ("Tags", json!([{"Key": "app", "Value": "orders"}])),
        ]);

        let result = ResourceMatcher::default().match_at(
            "OrdersDev",
            &ResourceType::dynamodb_table(),
            &properties,
            &[candidate],
            now(),
        );
        assert!((result.matches[0].confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_metadata_is_not_an_error() {
        // Second candidate has no KeySchema metadata at all
        let with_meta = table("alpha").to_builder().metadata("KeySchema", json!("id")).build();
        let without = table("beta");
        let properties = props(&[("KeySchema", json!("id"))]);

        let result = ResourceMatcher::default().match_at(
            "Gamma",
            &ResourceType::dynamodb_table(),
            &properties,
            &[without, with_meta],
            now(),
        );
        assert_eq!(result.matches[0].physical_id, "alpha");
        assert!((result.matches[0].confidence - CONFIG_BONUS).abs() < 1e-9);
        assert!(result.matches[1].confidence.abs() < f64::EPSILON);
    }

    #[test]
    fn numeric_config_matches_string_metadata() {
        let group = DiscoveredResource::builder("/app/logs", ResourceType::log_group())
            .metadata("RetentionInDays", json!("14"))
            .build();
        let properties = props(&[("RetentionInDays", json!(14))]);

        let result = ResourceMatcher::default().match_at(
            "AppLogs",
            &ResourceType::log_group(),
            &properties,
            &[group],
            now(),
        );
        assert!(result.matches[0]
            .match_reasons
            .iter()
            .any(|r| r.contains("RetentionInDays")));
    }

    #[test]
    fn old_and_future_resources_get_no_recency_bonus() {
        let old = table("x").to_builder().created_at(now() - Duration::days(45)).build();
        let future = table("y").to_builder().created_at(now() + Duration::days(1)).build();

        let result = ResourceMatcher::default().match_at(
            "Zzz",
            &ResourceType::dynamodb_table(),
            &TemplateProperties::new(),
            &[old, future],
            now(),
        );
        assert!(result.matches.iter().all(|m| m.confidence.abs() < f64::EPSILON));
    }

    #[test]
    fn threshold_gates_best_match() {
        let candidate = table("ordertable");
        let strict = ResourceMatcher::new(MatcherConfig::new(0.95));
        let result = strict.match_at(
            "OrdersTable",
            &ResourceType::dynamodb_table(),
            &TemplateProperties::new(),
            &[candidate],
            now(),
        );
        assert!(result.matches[0].confidence > 0.0);
        assert!(result.best_match.is_none());
    }

    fn any_resource_type() -> impl Strategy<Value = ResourceType> {
        prop_oneof![
            Just(ResourceType::dynamodb_table()),
            Just(ResourceType::s3_bucket()),
            Just(ResourceType::log_group()),
            Just(ResourceType::lambda_function()),
        ]
    }

    proptest! {
        #[test]
        fn scores_are_bounded_and_sorted(
            entries in prop::collection::vec(("[a-z]{1,8}(-[a-z]{1,6})?", any_resource_type()), 0..8),
            requested in any_resource_type(),
            logical in "[A-Z][a-z]{1,10}",
            age_days in 0i64..60,
        ) {
            let candidates: Vec<_> = entries
                .iter()
                .map(|(id, kind)| {
                    DiscoveredResource::builder(id.as_str(), kind.clone())
                        .created_at(now() - Duration::days(age_days))
                        .build()
                })
                .collect();
            let name = entries.first().map(|(id, _)| id.clone()).unwrap_or_default();
            let properties: TemplateProperties = requested
                .physical_name_property()
                .map(|p| props(&[(p, json!(name))]))
                .unwrap_or_default();

            let result = ResourceMatcher::default().match_at(
                &logical,
                &requested,
                &properties,
                &candidates,
                now(),
            );

            let same_type = candidates.iter().filter(|c| c.resource_type() == &requested).count();
            prop_assert_eq!(result.matches.len(), same_type);
            for m in &result.matches {
                prop_assert_eq!(m.discovered_resource.resource_type(), &requested);
                prop_assert!((0.0..=1.0).contains(&m.confidence));
            }
            for pair in result.matches.windows(2) {
                prop_assert!(pair[0].confidence >= pair[1].confidence);
            }
            if let Some(best) = &result.best_match {
                prop_assert!(best.confidence >= 0.7);
                prop_assert_eq!(&best.physical_id, &result.matches[0].physical_id);
            }
        }
    }
}
