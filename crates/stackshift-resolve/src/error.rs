//! Error types for physical-id resolution

use crate::resolver::Resolution;
use crate::strategy::StrategyFailure;
use stackshift_model::ResourceType;
use std::collections::BTreeMap;

/// Errors raised while resolving physical ids
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Every strategy failed for one resource
    #[error("could not resolve {logical_id} ({resource_type}): {}", summarize(.failures))]
    ResolutionExhausted {
        /// Logical id being resolved
        logical_id: String,
        /// Its resource type
        resource_type: ResourceType,
        /// One entry per attempted strategy, in cascade order
        failures: Vec<StrategyFailure>,
    },

    /// Discovery does not know the resource type; no strategy can help
    #[error("cannot resolve {logical_id}: unsupported resource type {resource_type}")]
    UnsupportedResourceType {
        /// Logical id being resolved
        logical_id: String,
        /// The unsupported type
        resource_type: ResourceType,
    },

    /// Some resources of a batch could not be resolved
    #[error("failed to resolve {} resource(s): {}", .failed.len(), joined_keys(.failed))]
    AggregateResolutionFailure {
        /// Per-resource failure, keyed by logical id
        failed: BTreeMap<String, ResolveError>,
        /// Resources that did resolve
        resolved: BTreeMap<String, Resolution>,
    },
}

impl ResolveError {
    /// Whether the operator skipped or aborted during resolution
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::ResolutionExhausted { failures, .. } => failures.iter().any(|f| f.cancelled),
            Self::UnsupportedResourceType { .. } => false,
            Self::AggregateResolutionFailure { failed, .. } => {
                failed.values().any(ResolveError::is_cancelled)
            }
        }
    }

    /// Logical ids that failed
    #[must_use]
    pub fn failed_logical_ids(&self) -> Vec<&str> {
        match self {
            Self::ResolutionExhausted { logical_id, .. }
            | Self::UnsupportedResourceType { logical_id, .. } => vec![logical_id.as_str()],
            Self::AggregateResolutionFailure { failed, .. } => {
                failed.keys().map(String::as_str).collect()
            }
        }
    }

    /// Partial successes carried by a batch failure
    #[must_use]
    pub fn resolved(&self) -> Option<&BTreeMap<String, Resolution>> {
        match self {
            Self::AggregateResolutionFailure { resolved, .. } => Some(resolved),
            Self::ResolutionExhausted { .. } | Self::UnsupportedResourceType { .. } => None,
        }
    }
}

fn summarize(failures: &[StrategyFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn joined_keys(failed: &BTreeMap<String, ResolveError>) -> String {
    failed.keys().cloned().collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exhausted(id: &str, cancelled: bool) -> ResolveError {
        ResolveError::ResolutionExhausted {
            logical_id: id.to_string(),
            resource_type: ResourceType::dynamodb_table(),
            failures: vec![
                StrategyFailure::new("explicit", "no physical name in template"),
                StrategyFailure {
                    strategy: "human-intervention",
                    reason: "operator skipped".into(),
                    cancelled,
                },
            ],
        }
    }

    #[test]
    fn exhausted_message_lists_every_strategy() {
        let msg = exhausted("UsersTable", false).to_string();
        assert!(msg.contains("UsersTable"));
        assert!(msg.contains("explicit: no physical name in template"));
        assert!(msg.contains("human-intervention: operator skipped"));
    }

    #[test]
    fn unsupported_type_names_the_type() {
        let err = ResolveError::UnsupportedResourceType {
            logical_id: "Widget".into(),
            resource_type: ResourceType::new("Custom::Widget"),
        };
        assert_eq!(
            err.to_string(),
            "cannot resolve Widget: unsupported resource type Custom::Widget"
        );
        assert_eq!(err.failed_logical_ids(), vec!["Widget"]);
        assert!(!err.is_cancelled());
    }

    #[test]
    fn aggregate_reports_failures_and_keeps_partials() {
        let mut failed = BTreeMap::new();
        failed.insert("B".to_string(), exhausted("B", false));
        failed.insert("A".to_string(), exhausted("A", true));
        let err = ResolveError::AggregateResolutionFailure {
            failed,
            resolved: BTreeMap::new(),
        };

        assert_eq!(err.to_string(), "failed to resolve 2 resource(s): A, B");
        assert_eq!(err.failed_logical_ids(), vec!["A", "B"]);
        assert!(err.is_cancelled());
        assert!(err.resolved().is_some());
    }
}
