//! Property differences and drift reports

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// How serious a template/live divergence is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifferenceSeverity {
    Info,
    Warning,
    Critical,
}

/// One property that differs between template and live resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDifference {
    pub property: String,
    pub template_value: Option<Value>,
    pub live_value: Option<Value>,
    pub severity: DifferenceSeverity,
}

impl PropertyDifference {
    #[inline]
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.severity == DifferenceSeverity::Critical
    }
}

impl Display for PropertyDifference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<Value>| v.as_ref().map_or_else(|| "<absent>".to_string(), Value::to_string);
        write!(
            f,
            "{} ({:?}): template={} live={}",
            self.property,
            self.severity,
            show(&self.template_value),
            show(&self.live_value)
        )
    }
}

/// Drift detection outcome for one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftStatus {
    InSync,
    Modified,
    Deleted,
    NotChecked,
}

/// Drift of a live resource against the last-applied template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub logical_id: String,
    pub physical_id: String,
    pub status: DriftStatus,
    #[serde(default)]
    pub differences: Vec<PropertyDifference>,
}

impl DriftReport {
    /// Whether the resource has drifted
    #[inline]
    #[must_use]
    pub fn has_drift(&self) -> bool {
        matches!(self.status, DriftStatus::Modified | DriftStatus::Deleted)
    }
}

/// Structural equality, treating scalars by their textual form
///
/// Providers often report numbers and booleans as strings.
#[must_use]
pub fn values_equivalent(template: &Value, live: &Value) -> bool {
    if template == live {
        return true;
    }
    match (scalar_text(template), scalar_text(live)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn severity_orders_critical_last() {
        assert!(DifferenceSeverity::Critical > DifferenceSeverity::Warning);
        assert!(DifferenceSeverity::Warning > DifferenceSeverity::Info);
    }

    #[test]
    fn scalars_compare_by_text() {
        assert!(values_equivalent(&json!(14), &json!("14")));
        assert!(values_equivalent(&json!(true), &json!("true")));
        assert!(!values_equivalent(&json!([1]), &json!("[1]")));
        assert!(values_equivalent(&json!({"a": 1}), &json!({"a": 1})));
    }

    #[test]
    fn difference_display() {
        let diff = PropertyDifference {
            property: "BillingMode".into(),
            template_value: Some(json!("PROVISIONED")),
            live_value: None,
            severity: DifferenceSeverity::Warning,
        };
        assert_eq!(
            diff.to_string(),
            "BillingMode (Warning): template=\"PROVISIONED\" live=<absent>"
        );
    }

    #[test]
    fn drift_flags() {
        let report = DriftReport {
            logical_id: "T".into(),
            physical_id: "t".into(),
            status: DriftStatus::InSync,
            differences: vec![],
        };
        assert!(!report.has_drift());
        assert!(DriftReport {
            status: DriftStatus::Deleted,
            ..report
        }
        .has_drift());
    }
}
