use super::ScanData;
use crate::error::MigrationError;
use crate::executor::{StepContext, StepExecutor, ValidationCheck};
use crate::state::MigrationState;
use crate::step::MigrationStep;
use serde_json::Value;
use stackshift_model::Template;

/// Reads and parses the source template
#[derive(Debug, Clone, Copy, Default)]
pub struct InitialScanStep;

#[async_trait::async_trait]
impl StepExecutor for InitialScanStep {
    fn step(&self) -> MigrationStep {
        MigrationStep::InitialScan
    }

    fn validate_prerequisites(&self, state: &MigrationState) -> bool {
        !state.config.template_path.as_os_str().is_empty()
    }

    #[tracing::instrument(skip_all, fields(migration_id = %ctx.migration_id))]
    async fn execute_step(
        &self,
        state: &MigrationState,
        ctx: &StepContext,
    ) -> Result<Value, MigrationError> {
        let path = &state.config.template_path;
        let body = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| MigrationError::Io {
                path: path.clone(),
                source,
            })?;
        let raw: Value = serde_json::from_str(&body)?;
        let template = Template::from_value(raw.clone())?;

        tracing::info!(
            path = %path.display(),
            resources = template.len(),
            "template scanned"
        );
        let data = ScanData {
            template_path: path.clone(),
            resource_count: template.len(),
            resource_types: template.resource_types().into_iter().collect(),
            template: raw,
        };
        Ok(serde_json::to_value(data)?)
    }

    fn run_validation_checks(&self, _state: &MigrationState, data: &Value) -> Vec<ValidationCheck> {
        let count = data
            .get("resourceCount")
            .and_then(Value::as_u64)
            .unwrap_or_default();
        vec![ValidationCheck::error(
            "template-has-resources",
            count > 0,
            format!("{count} resource(s) in template"),
        )]
    }
}
