use super::{CommandData, ComparisonData};
use crate::config::{CommandSpec, InteractionMode};
use crate::error::MigrationError;
use crate::executor::{StepContext, StepExecutor};
use crate::state::MigrationState;
use crate::step::MigrationStep;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;

/// Environment variable carrying the migration id
pub const ENV_MIGRATION_ID: &str = "STACKSHIFT_MIGRATION_ID";
/// Environment variable carrying the step name
pub const ENV_STEP: &str = "STACKSHIFT_STEP";
/// Environment variable carrying resolved physical ids as a JSON object
pub const ENV_RESOLUTIONS: &str = "STACKSHIFT_RESOLUTIONS";

/// Runs the external command configured for a step
///
/// Used for template modification, code generation and import preparation.
/// A step without a configured command completes as skipped.
#[derive(Debug, Clone, Copy)]
pub struct CommandStep {
    step: MigrationStep,
}

impl CommandStep {
    /// Create executor for `step`
    #[must_use]
    pub fn new(step: MigrationStep) -> Self {
        Self { step }
    }

    async fn run(
        &self,
        state: &MigrationState,
        program: &str,
        args: &[String],
        working_dir: Option<&Path>,
    ) -> Result<Output, MigrationError> {
        let resolutions = state
            .step_data::<ComparisonData>(MigrationStep::Comparison, self.step)
            .map(|c| c.resolutions())
            .unwrap_or_default();

        let mut command = Command::new(program);
        command
            .args(args)
            .env(ENV_MIGRATION_ID, &state.id)
            .env(ENV_STEP, self.step.as_str())
            .env(ENV_RESOLUTIONS, resolutions_env(&resolutions)?)
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            command.current_dir(dir);
        }

        tracing::info!(step = %self.step, program, ?args, "running command");
        let output = command.output().await.map_err(|e| MigrationError::Command {
            program: program.to_string(),
            reason: e.to_string(),
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MigrationError::Command {
                program: program.to_string(),
                reason: format!("{}: {}", output.status, stderr.trim()),
            });
        }
        Ok(output)
    }

    fn spec<'a>(&self, state: &'a MigrationState) -> Option<&'a CommandSpec> {
        state.config.commands.for_step(self.step)
    }
}

fn resolutions_env(resolutions: &BTreeMap<String, String>) -> Result<String, MigrationError> {
    Ok(serde_json::to_string(resolutions)?)
}

#[async_trait::async_trait]
impl StepExecutor for CommandStep {
    fn step(&self) -> MigrationStep {
        self.step
    }

    fn validate_prerequisites(&self, state: &MigrationState) -> bool {
        state.is_completed(MigrationStep::Comparison)
    }

    #[tracing::instrument(skip_all, fields(migration_id = %ctx.migration_id, step = %self.step))]
    async fn execute_step(
        &self,
        state: &MigrationState,
        ctx: &StepContext,
    ) -> Result<Value, MigrationError> {
        let Some(spec) = self.spec(state) else {
            tracing::debug!("no command configured");
            return Ok(serde_json::to_value(CommandData {
                skipped: true,
                ..CommandData::default()
            })?);
        };

        if state.config.interaction == InteractionMode::DryRun {
            tracing::info!(program = %spec.program, "dry run, command not executed");
            return Ok(serde_json::to_value(CommandData {
                program: Some(spec.program.clone()),
                dry_run: true,
                ..CommandData::default()
            })?);
        }

        let output = self
            .run(state, &spec.program, &spec.args, spec.working_dir.as_deref())
            .await?;
        Ok(serde_json::to_value(CommandData {
            program: Some(spec.program.clone()),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            ..CommandData::default()
        })?)
    }

    async fn execute_rollback(
        &self,
        state: &MigrationState,
        _ctx: &StepContext,
    ) -> Result<(), MigrationError> {
        if state.config.interaction == InteractionMode::DryRun {
            return Ok(());
        }
        let Some(spec) = self.spec(state) else {
            return Ok(());
        };
        let Some(rollback) = &spec.rollback else {
            tracing::warn!(step = %self.step, program = %spec.program, "no rollback command configured");
            return Ok(());
        };
        self.run(state, &rollback.program, &rollback.args, spec.working_dir.as_deref())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolutions_are_a_json_object() {
        let mut map = BTreeMap::new();
        map.insert("UsersTable".to_string(), "users-legacy".to_string());
        assert_eq!(
            resolutions_env(&map).unwrap(),
            r#"{"UsersTable":"users-legacy"}"#
        );
    }
}
