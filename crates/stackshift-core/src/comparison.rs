//! Template / live comparison
//!
//! [`compare_properties`] is the pure core; [`score_confidence`] and
//! [`correlate_drift`] enrich its output independently and are composed by
//! the comparison and verification steps.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stackshift_model::{
    values_equivalent, DifferenceSeverity, DriftReport, DriftStatus, PropertyDifference,
    ResourceType, TemplateProperties,
};
use std::collections::BTreeMap;

const CRITICAL_PENALTY: f64 = 0.5;
const WARNING_PENALTY: f64 = 0.1;
const INFO_PENALTY: f64 = 0.02;

/// Differences between literal template properties and live configuration
///
/// Only properties present on both sides are compared; intrinsic values
/// that are not literals are skipped.
#[must_use]
pub fn compare_properties(
    resource_type: &ResourceType,
    template: &TemplateProperties,
    live: &BTreeMap<String, Value>,
) -> Vec<PropertyDifference> {
    template
        .iter()
        .filter_map(|(name, value)| {
            let expected = value.as_literal()?;
            let actual = live.get(name)?;
            if values_equivalent(expected, actual) {
                return None;
            }
            Some(PropertyDifference {
                property: name.clone(),
                template_value: Some(expected.clone()),
                live_value: Some(actual.clone()),
                severity: severity_of(resource_type, name),
            })
        })
        .collect()
}

fn severity_of(resource_type: &ResourceType, property: &str) -> DifferenceSeverity {
    if resource_type.is_critical_property(property)
        || resource_type.physical_name_property() == Some(property)
    {
        DifferenceSeverity::Critical
    } else if property == "Tags" {
        DifferenceSeverity::Info
    } else {
        DifferenceSeverity::Warning
    }
}

/// Confidence that the live resource can be imported as-is, in `[0, 1]`
#[must_use]
pub fn score_confidence(differences: &[PropertyDifference]) -> f64 {
    let penalty: f64 = differences
        .iter()
        .map(|d| match d.severity {
            DifferenceSeverity::Critical => CRITICAL_PENALTY,
            DifferenceSeverity::Warning => WARNING_PENALTY,
            DifferenceSeverity::Info => INFO_PENALTY,
        })
        .sum();
    (1.0 - penalty).clamp(0.0, 1.0)
}

/// Difference annotated with whether live drift explains it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelatedDifference {
    pub difference: PropertyDifference,
    /// Live value changed outside the source stack
    pub drifted: bool,
}

/// Mark differences explained by drift
#[must_use]
pub fn correlate_drift(
    differences: &[PropertyDifference],
    drift: &DriftReport,
) -> Vec<CorrelatedDifference> {
    differences
        .iter()
        .map(|difference| {
            let drifted = match drift.status {
                DriftStatus::Deleted => true,
                DriftStatus::Modified => drift
                    .differences
                    .iter()
                    .any(|d| d.property == difference.property),
                DriftStatus::InSync | DriftStatus::NotChecked => false,
            };
            CorrelatedDifference {
                difference: difference.clone(),
                drifted,
            }
        })
        .collect()
}
