use super::{completed, ClassificationData, ScanData};
use crate::error::MigrationError;
use crate::executor::{StepContext, StepExecutor, ValidationCheck};
use crate::state::MigrationState;
use crate::step::MigrationStep;
use serde_json::Value;
use stackshift_model::{classify_template, Template};

/// Tags template resources as stateful and import candidates
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassificationStep;

#[async_trait::async_trait]
impl StepExecutor for ClassificationStep {
    fn step(&self) -> MigrationStep {
        MigrationStep::Classification
    }

    fn validate_prerequisites(&self, state: &MigrationState) -> bool {
        completed(state, &[MigrationStep::InitialScan, MigrationStep::Discovery])
    }

    async fn execute_step(
        &self,
        state: &MigrationState,
        _ctx: &StepContext,
    ) -> Result<Value, MigrationError> {
        let scan: ScanData = state.step_data(MigrationStep::InitialScan, self.step())?;
        let template = Template::from_value(scan.template)?;
        let resources = classify_template(&template);

        let to_import: Vec<String> = resources
            .iter()
            .filter(|r| r.requires_resolution())
            .map(|r| r.logical_id.clone())
            .collect();
        let stateful = resources.iter().filter(|r| r.is_stateful).count();
        tracing::info!(
            total = resources.len(),
            stateful,
            to_import = to_import.len(),
            "resources classified"
        );

        Ok(serde_json::to_value(ClassificationData {
            resources,
            stateful,
            to_import,
        })?)
    }

    fn run_validation_checks(&self, _state: &MigrationState, data: &Value) -> Vec<ValidationCheck> {
        let Ok(data) = serde_json::from_value::<ClassificationData>(data.clone()) else {
            return vec![ValidationCheck::error("classification-output", false, "unreadable output")];
        };
        let to_import = data.to_import.len();
        vec![ValidationCheck::warning(
            "stateful-resources-importable",
            data.stateful == to_import,
            format!(
                "{to_import} of {} stateful resource(s) can be imported",
                data.stateful
            ),
        )]
    }
}
