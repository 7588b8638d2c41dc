use super::{ComparisonData, MigrationSummary, VerificationData};
use crate::error::MigrationError;
use crate::executor::{StepContext, StepExecutor};
use crate::state::MigrationState;
use crate::step::MigrationStep;
use chrono::Utc;
use serde_json::Value;

/// Summarizes the migration
#[derive(Debug, Clone, Copy, Default)]
pub struct CompleteStep;

#[async_trait::async_trait]
impl StepExecutor for CompleteStep {
    fn step(&self) -> MigrationStep {
        MigrationStep::Complete
    }

    fn validate_prerequisites(&self, state: &MigrationState) -> bool {
        state.is_completed(MigrationStep::Verification)
    }

    async fn execute_step(
        &self,
        state: &MigrationState,
        ctx: &StepContext,
    ) -> Result<Value, MigrationError> {
        let comparison: ComparisonData = state.step_data(MigrationStep::Comparison, self.step())?;
        let verification: VerificationData =
            state.step_data(MigrationStep::Verification, self.step())?;

        let summary = MigrationSummary {
            migration_id: ctx.migration_id.clone(),
            imported: comparison.resources.len(),
            resolutions: comparison.resolutions(),
            drifted: verification
                .resources
                .iter()
                .filter(|r| r.drift_decision.is_some())
                .map(|r| r.logical_id.clone())
                .collect(),
            completed_at: Utc::now(),
        };
        tracing::info!(
            migration_id = %summary.migration_id,
            imported = summary.imported,
            drifted = summary.drifted.len(),
            "migration summarized"
        );
        Ok(serde_json::to_value(summary)?)
    }
}
