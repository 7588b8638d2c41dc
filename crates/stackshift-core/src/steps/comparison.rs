use super::{completed, ClassificationData, ComparedResource, ComparisonData, DiscoveryData};
use crate::checkpoint::CheckpointManager;
use crate::comparison::{compare_properties, score_confidence};
use crate::error::MigrationError;
use crate::executor::{StepContext, StepExecutor, ValidationCheck};
use crate::state::MigrationState;
use crate::step::MigrationStep;
use serde_json::Value;
use stackshift_model::{ClassifiedResource, DiscoveredResource, PropertyDifference};
use stackshift_resolve::{CriticalDecision, Resolution, ResolutionRequest};
use std::collections::BTreeMap;

/// Import confidence below which an operator is asked to confirm
const LOW_CONFIDENCE: f64 = 0.5;

/// Resolves physical ids and compares template against live configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct ComparisonStep;

impl ComparisonStep {
    async fn compare(
        ctx: &StepContext,
        resource: &ClassifiedResource,
        resolution: &Resolution,
        live: Option<&DiscoveredResource>,
    ) -> Result<ComparedResource, MigrationError> {
        let mut compared = ComparedResource {
            logical_id: resource.logical_id.clone(),
            resource_type: resource.resource_type.clone(),
            physical_id: resolution.physical_id.clone(),
            strategy: resolution.strategy.clone(),
            resolution_confidence: resolution.confidence,
            live_found: live.is_some(),
            differences: Vec::new(),
            confidence: 0.0,
            decision: None,
            requires_manual_review: false,
        };

        let Some(live) = live else {
            let prompt = CheckpointManager::prompt(
                format!(
                    "{} resolved to {} but no live snapshot was discovered; continue without comparison?",
                    resource.logical_id, resolution.physical_id
                ),
                Some(&resource.logical_id),
            );
            ctx.checkpoints.require_continue(&prompt).await?;
            compared.requires_manual_review = true;
            return Ok(compared);
        };

        let differences =
            compare_properties(&resource.resource_type, &resource.properties, &live_properties(live));
        compared.confidence = score_confidence(&differences);

        let critical: Vec<PropertyDifference> =
            differences.iter().filter(|d| d.is_critical()).cloned().collect();
        if critical.is_empty() {
            if compared.confidence < LOW_CONFIDENCE {
                let prompt = CheckpointManager::prompt(
                    format!(
                        "{} differs from {} in {} propert(ies); continue?",
                        resource.logical_id,
                        resolution.physical_id,
                        differences.len()
                    ),
                    Some(&resource.logical_id),
                );
                ctx.checkpoints.require_continue(&prompt).await?;
            }
        } else {
            let decision = ctx
                .intervention
                .confirm_critical_difference(&resolution.physical_id, &critical)
                .await?;
            tracing::info!(
                logical_id = %resource.logical_id,
                physical_id = %resolution.physical_id,
                critical = critical.len(),
                ?decision,
                "critical differences confirmed"
            );
            match decision {
                CriticalDecision::Abort => {
                    return Err(MigrationError::Aborted(format!(
                        "critical differences on {}",
                        resource.logical_id
                    )))
                }
                CriticalDecision::Manual => compared.requires_manual_review = true,
                CriticalDecision::Proceed => {}
            }
            compared.decision = Some(decision);
        }

        compared.differences = differences;
        Ok(compared)
    }
}

/// Live configuration as a property bag
fn live_properties(live: &DiscoveredResource) -> BTreeMap<String, Value> {
    let mut properties = live.metadata().clone();
    if let Some(name) = live.resource_type().physical_name_property() {
        properties
            .entry(name.to_string())
            .or_insert_with(|| Value::String(live.physical_id().to_string()));
    }
    properties
}

#[async_trait::async_trait]
impl StepExecutor for ComparisonStep {
    fn step(&self) -> MigrationStep {
        MigrationStep::Comparison
    }

    fn validate_prerequisites(&self, state: &MigrationState) -> bool {
        completed(
            state,
            &[MigrationStep::Discovery, MigrationStep::Classification],
        )
    }

    #[tracing::instrument(skip_all, fields(migration_id = %ctx.migration_id))]
    async fn execute_step(
        &self,
        state: &MigrationState,
        ctx: &StepContext,
    ) -> Result<Value, MigrationError> {
        let classification: ClassificationData =
            state.step_data(MigrationStep::Classification, self.step())?;
        let discovered: DiscoveryData = state.step_data(MigrationStep::Discovery, self.step())?;

        let to_import: Vec<&ClassifiedResource> = classification
            .resources
            .iter()
            .filter(|r| r.requires_resolution())
            .collect();
        let requests: Vec<ResolutionRequest> = to_import
            .iter()
            .map(|r| ResolutionRequest::from(*r).with_region(discovered.region.clone()))
            .collect();

        let resolutions = ctx.resolver.resolve_many(&requests).await?;

        let mut resources = Vec::with_capacity(to_import.len());
        for resource in to_import {
            let Some(resolution) = resolutions.get(&resource.logical_id) else {
                continue;
            };
            let live = discovered.find(&resource.resource_type, &resolution.physical_id);
            resources.push(Self::compare(ctx, resource, resolution, live).await?);
        }

        tracing::info!(
            compared = resources.len(),
            manual = resources.iter().filter(|r| r.requires_manual_review).count(),
            "comparison finished"
        );
        Ok(serde_json::to_value(ComparisonData { resources })?)
    }

    fn run_validation_checks(&self, state: &MigrationState, data: &Value) -> Vec<ValidationCheck> {
        let Ok(data) = serde_json::from_value::<ComparisonData>(data.clone()) else {
            return vec![ValidationCheck::error("comparison-output", false, "unreadable output")];
        };
        let expected = state
            .step_data::<ClassificationData>(MigrationStep::Classification, self.step())
            .map(|c| c.to_import)
            .unwrap_or_default();
        let resolved = data.resolutions();
        let unresolved: Vec<&str> = expected
            .iter()
            .filter(|id| !resolved.contains_key(*id))
            .map(String::as_str)
            .collect();

        let manual: Vec<&str> = data
            .resources
            .iter()
            .filter(|r| r.requires_manual_review)
            .map(|r| r.logical_id.as_str())
            .collect();
        let low: Vec<&str> = data
            .resources
            .iter()
            .filter(|r| r.live_found && r.confidence < LOW_CONFIDENCE)
            .map(|r| r.logical_id.as_str())
            .collect();

        vec![
            ValidationCheck::error(
                "resources-resolved",
                unresolved.is_empty(),
                if unresolved.is_empty() {
                    format!("{} resource(s) resolved", resolved.len())
                } else {
                    format!("unresolved: {}", unresolved.join(", "))
                },
            ),
            ValidationCheck::warning(
                "manual-review",
                manual.is_empty(),
                format!("manual review: [{}]", manual.join(", ")),
            ),
            ValidationCheck::warning(
                "import-confidence",
                low.is_empty(),
                format!("low confidence: [{}]", low.join(", ")),
            ),
        ]
    }
}
