use super::{ComparedResource, ComparisonData, VerificationData, VerifiedResource};
use crate::checkpoint::CheckpointManager;
use crate::comparison::correlate_drift;
use crate::drift::DriftDetector;
use crate::error::MigrationError;
use crate::executor::{StepContext, StepExecutor, ValidationCheck};
use crate::polling::poll_until;
use crate::state::MigrationState;
use crate::step::MigrationStep;
use serde_json::Value;
use stackshift_discovery::DiscoveryOptions;
use stackshift_model::{DriftReport, DriftStatus, ResourceType};
use std::collections::{BTreeMap, BTreeSet};

/// Confirms imported resources still exist and checks them for drift
#[derive(Debug, Clone, Copy, Default)]
pub struct VerificationStep;

impl VerificationStep {
    /// Physical ids that exist right now, per type, bypassing the cache
    async fn live_ids(
        ctx: &StepContext,
        region: &str,
        resources: &[ComparedResource],
    ) -> Result<BTreeMap<ResourceType, BTreeSet<String>>, MigrationError> {
        let types: BTreeSet<&ResourceType> = resources.iter().map(|r| &r.resource_type).collect();
        let mut live = BTreeMap::new();
        for resource_type in types {
            let found = ctx
                .discovery
                .discover_resource_type(resource_type, Some(region), DiscoveryOptions::fresh())
                .await?;
            live.insert(
                resource_type.clone(),
                found.iter().map(|r| r.physical_id().to_string()).collect(),
            );
        }
        Ok(live)
    }

    /// Poll for a drift report; a timeout is a checkpoint
    async fn detect(
        state: &MigrationState,
        ctx: &StepContext,
        detector: &dyn DriftDetector,
        resource: &ComparedResource,
    ) -> Result<Option<DriftReport>, MigrationError> {
        let settings = &state.config.drift;
        let operation = format!("drift detection for {}", resource.physical_id);
        let polled = poll_until(
            &operation,
            settings.poll_attempts,
            settings.poll_interval(),
            move || detector.detect_drift(&resource.logical_id, &resource.physical_id, &resource.resource_type),
        )
        .await;

        match polled {
            Ok(report) => Ok(Some(report)),
            Err(MigrationError::Timeout { attempts, .. }) => {
                let prompt = CheckpointManager::prompt(
                    format!("{operation} did not finish after {attempts} attempt(s); continue without it?"),
                    Some(&resource.logical_id),
                );
                ctx.checkpoints.require_continue(&prompt).await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait::async_trait]
impl StepExecutor for VerificationStep {
    fn step(&self) -> MigrationStep {
        MigrationStep::Verification
    }

    fn validate_prerequisites(&self, state: &MigrationState) -> bool {
        state.is_completed(MigrationStep::Comparison)
            && state.is_completed(MigrationStep::ImportPreparation)
    }

    #[tracing::instrument(skip_all, fields(migration_id = %ctx.migration_id))]
    async fn execute_step(
        &self,
        state: &MigrationState,
        ctx: &StepContext,
    ) -> Result<Value, MigrationError> {
        let comparison: ComparisonData = state.step_data(MigrationStep::Comparison, self.step())?;
        let live = Self::live_ids(ctx, &state.config.region, &comparison.resources).await?;

        let mut resources = Vec::with_capacity(comparison.resources.len());
        for resource in &comparison.resources {
            let exists = live
                .get(&resource.resource_type)
                .is_some_and(|ids| ids.contains(&resource.physical_id));
            let mut verified = VerifiedResource {
                logical_id: resource.logical_id.clone(),
                physical_id: resource.physical_id.clone(),
                exists,
                drift_status: DriftStatus::NotChecked,
                drift_decision: None,
                correlated: Vec::new(),
            };

            let report = match (&ctx.drift, exists) {
                (Some(detector), true) => Self::detect(state, ctx, detector.as_ref(), resource).await?,
                _ => None,
            };
            if let Some(report) = report {
                verified.drift_status = report.status;
                if report.has_drift() {
                    let decision = ctx
                        .intervention
                        .resolve_drift(&resource.physical_id, &report)
                        .await?;
                    tracing::info!(
                        logical_id = %resource.logical_id,
                        status = ?report.status,
                        ?decision,
                        "drift resolved"
                    );
                    verified.drift_decision = Some(decision);
                    verified.correlated = correlate_drift(&resource.differences, &report);
                }
            }
            resources.push(verified);
        }

        Ok(serde_json::to_value(VerificationData { resources })?)
    }

    fn run_validation_checks(&self, _state: &MigrationState, data: &Value) -> Vec<ValidationCheck> {
        let Ok(data) = serde_json::from_value::<VerificationData>(data.clone()) else {
            return vec![ValidationCheck::error("verification-output", false, "unreadable output")];
        };
        let missing: Vec<&str> = data
            .resources
            .iter()
            .filter(|r| !r.exists)
            .map(|r| r.physical_id.as_str())
            .collect();
        let drifted: Vec<&str> = data
            .resources
            .iter()
            .filter(|r| matches!(r.drift_status, DriftStatus::Modified | DriftStatus::Deleted))
            .map(|r| r.logical_id.as_str())
            .collect();

        vec![
            ValidationCheck::error(
                "resources-exist",
                missing.is_empty(),
                format!("missing: [{}]", missing.join(", ")),
            ),
            ValidationCheck::warning(
                "no-drift",
                drifted.is_empty(),
                format!("drifted: [{}]", drifted.join(", ")),
            ),
        ]
    }
}
