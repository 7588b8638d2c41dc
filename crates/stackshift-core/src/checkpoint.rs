//! Checkpoints and audited intervention
//!
//! [`AuditingIntervention`] decorates any [`InterventionPort`] so every
//! answered prompt (interactive or automated) lands in the audit log.
//! [`CheckpointManager`] turns a question into `continue | pause | abort`.

use crate::audit::{AuditContext, AuditLog, AuditRecord};
use crate::error::MigrationError;
use crate::step::MigrationStep;
use stackshift_model::{DriftReport, PropertyDifference, ResourceType};
use stackshift_resolve::{
    CriticalDecision, DriftDecision, InterventionError, InterventionPort, InterventionPrompt,
    InterventionResponse, MatchCandidate, PromptKind, ResponseAction,
};
use std::fmt;
use std::sync::Arc;

/// Outcome of a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointOutcome {
    Continue,
    Pause,
    Abort,
}

/// Intervention port that records every answer
pub struct AuditingIntervention {
    inner: Arc<dyn InterventionPort>,
    audit: Arc<dyn AuditLog>,
    migration_id: String,
    step: MigrationStep,
}

impl fmt::Debug for AuditingIntervention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditingIntervention")
            .field("audit", &self.audit)
            .field("migration_id", &self.migration_id)
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}

impl AuditingIntervention {
    /// Wrap `inner` for one step of one migration
    #[must_use]
    pub fn new(
        inner: Arc<dyn InterventionPort>,
        audit: Arc<dyn AuditLog>,
        migration_id: impl Into<String>,
        step: MigrationStep,
    ) -> Self {
        Self {
            inner,
            audit,
            migration_id: migration_id.into(),
            step,
        }
    }

    async fn record<T>(
        &self,
        prompt: &InterventionPrompt,
        resource_type: Option<&ResourceType>,
        outcome: Result<(T, InterventionResponse), InterventionError>,
    ) -> Result<T, InterventionError> {
        let (result, response) = match outcome {
            Ok((value, response)) => (Ok(value), response),
            Err(e) => {
                let action = match &e {
                    InterventionError::Skipped { .. } => ResponseAction::Skip,
                    InterventionError::Aborted(_) => ResponseAction::Abort,
                    // Nothing was answered
                    _ => return Err(e),
                };
                let response = InterventionResponse::new(prompt.id.clone(), action, None);
                (Err(e), response)
            }
        };

        let record = AuditRecord {
            migration_id: self.migration_id.clone(),
            response,
            context: AuditContext {
                step: Some(self.step),
                resource_id: prompt.resource_id.clone(),
                resource_type: resource_type.map(ToString::to_string),
                prompt_kind: Some(prompt.kind),
            },
        };
        self.audit.append(record).await.map_err(|e| {
            tracing::error!(error = %e, "failed to record intervention");
            InterventionError::Unavailable(format!("audit log: {e}"))
        })?;
        result
    }
}

#[async_trait::async_trait]
impl InterventionPort for AuditingIntervention {
    async fn prompt_for_physical_id(
        &self,
        logical_id: &str,
        resource_type: &ResourceType,
        candidates: &[MatchCandidate],
    ) -> Result<String, InterventionError> {
        let prompt = InterventionPrompt::physical_id(logical_id, resource_type, candidates);
        let outcome = self
            .inner
            .prompt_for_physical_id(logical_id, resource_type, candidates)
            .await
            .map(|id| (id.clone(), InterventionResponse::select(&prompt, id)));
        self.record(&prompt, Some(resource_type), outcome).await
    }

    async fn confirm_critical_difference(
        &self,
        resource_id: &str,
        differences: &[PropertyDifference],
    ) -> Result<CriticalDecision, InterventionError> {
        let prompt = InterventionPrompt::critical_difference(resource_id, differences);
        let outcome = self
            .inner
            .confirm_critical_difference(resource_id, differences)
            .await
            .map(|d| (d, InterventionResponse::select(&prompt, critical_value(d))));
        self.record(&prompt, None, outcome).await
    }

    async fn resolve_drift(
        &self,
        resource_id: &str,
        drift: &DriftReport,
    ) -> Result<DriftDecision, InterventionError> {
        let prompt = InterventionPrompt::drift(resource_id, drift);
        let outcome = self
            .inner
            .resolve_drift(resource_id, drift)
            .await
            .map(|d| (d, InterventionResponse::select(&prompt, drift_value(d))));
        self.record(&prompt, None, outcome).await
    }

    async fn prompt(
        &self,
        prompt: &InterventionPrompt,
    ) -> Result<InterventionResponse, InterventionError> {
        let outcome = self
            .inner
            .prompt(prompt)
            .await
            .map(|response| (response.clone(), response));
        self.record(prompt, None, outcome).await
    }
}

fn critical_value(decision: CriticalDecision) -> &'static str {
    match decision {
        CriticalDecision::Proceed => "proceed",
        CriticalDecision::Abort => "abort",
        CriticalDecision::Manual => "manual",
    }
}

fn drift_value(decision: DriftDecision) -> &'static str {
    match decision {
        DriftDecision::UseCurrent => "use-current",
        DriftDecision::UseTemplate => "use-template",
        DriftDecision::Manual => "manual",
    }
}

/// Raises `continue | pause | abort` checkpoints inside steps
#[derive(Clone)]
pub struct CheckpointManager {
    intervention: Arc<dyn InterventionPort>,
}

impl fmt::Debug for CheckpointManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckpointManager").finish_non_exhaustive()
    }
}

impl CheckpointManager {
    /// Create manager over an (audited) intervention port
    #[must_use]
    pub fn new(intervention: Arc<dyn InterventionPort>) -> Self {
        Self { intervention }
    }

    /// Checkpoint prompt with the three standard options, defaulting to continue
    #[must_use]
    pub fn prompt(message: impl Into<String>, resource_id: Option<&str>) -> InterventionPrompt {
        let prompt = InterventionPrompt::new(PromptKind::Checkpoint, message)
            .with_option("continue", "Continue the migration")
            .with_option("pause", "Pause and persist state")
            .with_option("abort", "Abort the migration")
            .with_default("continue");
        match resource_id {
            Some(id) => prompt.with_resource(id),
            None => prompt,
        }
    }

    /// Ask and interpret the answer
    ///
    /// # Errors
    /// Intervention failures other than a skip, which counts as pause.
    pub async fn checkpoint(
        &self,
        prompt: &InterventionPrompt,
    ) -> Result<CheckpointOutcome, MigrationError> {
        let response = match self.intervention.prompt(prompt).await {
            Ok(response) => response,
            Err(InterventionError::Skipped { .. }) => return Ok(CheckpointOutcome::Pause),
            Err(InterventionError::Aborted(_)) => return Ok(CheckpointOutcome::Abort),
            Err(e) => return Err(e.into()),
        };

        let outcome = match (response.action, response.value.as_deref()) {
            (ResponseAction::Pause, _) | (ResponseAction::Select, Some("pause")) => {
                CheckpointOutcome::Pause
            }
            (ResponseAction::Abort, _) | (ResponseAction::Select, Some("abort")) => {
                CheckpointOutcome::Abort
            }
            (ResponseAction::Skip, _) => CheckpointOutcome::Pause,
            _ => CheckpointOutcome::Continue,
        };
        tracing::info!(prompt_id = %prompt.id, ?outcome, "checkpoint resolved");
        Ok(outcome)
    }

    /// Checkpoint that turns pause and abort into errors
    ///
    /// # Errors
    /// `MigrationError::Paused` or `MigrationError::Aborted` carrying the
    /// prompt message.
    pub async fn require_continue(&self, prompt: &InterventionPrompt) -> Result<(), MigrationError> {
        match self.checkpoint(prompt).await? {
            CheckpointOutcome::Continue => Ok(()),
            CheckpointOutcome::Pause => Err(MigrationError::Paused(prompt.message.clone())),
            CheckpointOutcome::Abort => Err(MigrationError::Aborted(prompt.message.clone())),
        }
    }
}
