//! Built-in step executors
//!
//! One executor per [`MigrationStep`]. Steps hand data forward through
//! [`MigrationState::step_data`]; the output types below are that contract.

mod classification;
mod command;
mod comparison;
mod complete;
mod discovery;
mod scan;
mod verification;

pub use classification::ClassificationStep;
pub use command::{CommandStep, ENV_MIGRATION_ID, ENV_RESOLUTIONS, ENV_STEP};
pub use comparison::ComparisonStep;
pub use complete::CompleteStep;
pub use discovery::DiscoveryStep;
pub use scan::InitialScanStep;
pub use verification::VerificationStep;

use crate::comparison::CorrelatedDifference;
use crate::executor::StepExecutor;
use crate::state::MigrationState;
use crate::step::MigrationStep;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stackshift_model::{
    ClassifiedResource, DiscoveredResource, DriftStatus, PropertyDifference, ResourceType,
};
use stackshift_resolve::{CriticalDecision, DriftDecision};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Output of [`InitialScanStep`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanData {
    pub template_path: PathBuf,
    pub resource_count: usize,
    pub resource_types: Vec<ResourceType>,
    /// Raw template document
    pub template: Value,
}

/// Output of [`DiscoveryStep`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryData {
    pub region: String,
    /// Live resources keyed by resource type name
    pub resources: BTreeMap<String, Vec<DiscoveredResource>>,
}

impl DiscoveryData {
    /// Snapshot of one live resource
    #[must_use]
    pub fn find(&self, resource_type: &ResourceType, physical_id: &str) -> Option<&DiscoveredResource> {
        self.resources
            .get(resource_type.as_str())?
            .iter()
            .find(|r| r.physical_id() == physical_id)
    }

    /// Total discovered resources
    #[must_use]
    pub fn total(&self) -> usize {
        self.resources.values().map(Vec::len).sum()
    }
}

/// Output of [`ClassificationStep`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationData {
    pub resources: Vec<ClassifiedResource>,
    pub stateful: usize,
    /// Logical ids that must be imported
    pub to_import: Vec<String>,
}

/// One resolved resource compared against its live snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparedResource {
    pub logical_id: String,
    pub resource_type: ResourceType,
    pub physical_id: String,
    /// Strategy that resolved the physical id
    pub strategy: String,
    pub resolution_confidence: f64,
    /// Whether discovery returned a snapshot for the physical id
    pub live_found: bool,
    pub differences: Vec<PropertyDifference>,
    /// Import confidence derived from the differences
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<CriticalDecision>,
    pub requires_manual_review: bool,
}

/// Output of [`ComparisonStep`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonData {
    pub resources: Vec<ComparedResource>,
}

impl ComparisonData {
    /// Logical id to physical id
    #[must_use]
    pub fn resolutions(&self) -> BTreeMap<String, String> {
        self.resources
            .iter()
            .map(|r| (r.logical_id.clone(), r.physical_id.clone()))
            .collect()
    }
}

/// Output of [`CommandStep`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    /// No command configured
    pub skipped: bool,
    /// Command was not run because of dry-run mode
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stdout: String,
}

/// One imported resource after verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedResource {
    pub logical_id: String,
    pub physical_id: String,
    pub exists: bool,
    pub drift_status: DriftStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift_decision: Option<DriftDecision>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub correlated: Vec<CorrelatedDifference>,
}

/// Output of [`VerificationStep`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationData {
    pub resources: Vec<VerifiedResource>,
}

/// Output of [`CompleteStep`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    pub migration_id: String,
    pub imported: usize,
    pub resolutions: BTreeMap<String, String>,
    pub drifted: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Executors for every step, in order
#[must_use]
pub fn default_steps() -> Vec<Arc<dyn StepExecutor>> {
    vec![
        Arc::new(InitialScanStep),
        Arc::new(DiscoveryStep),
        Arc::new(ClassificationStep),
        Arc::new(ComparisonStep),
        Arc::new(CommandStep::new(MigrationStep::TemplateModification)),
        Arc::new(CommandStep::new(MigrationStep::CodeGeneration)),
        Arc::new(CommandStep::new(MigrationStep::ImportPreparation)),
        Arc::new(VerificationStep),
        Arc::new(CompleteStep),
    ]
}

/// Whether every listed step completed
fn completed(state: &MigrationState, steps: &[MigrationStep]) -> bool {
    steps.iter().all(|s| state.is_completed(*s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_steps_cover_every_step_in_order() {
        let steps: Vec<_> = default_steps().iter().map(|s| s.step()).collect();
        assert_eq!(steps, MigrationStep::ALL.to_vec());
    }
}
