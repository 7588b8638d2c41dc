//! Persisted migration state
//!
//! [`MigrationState`] is the resumability contract: written after every step
//! boundary, it holds enough to continue from `current_step` in a fresh
//! process.

use crate::config::MigrationConfig;
use crate::error::MigrationError;
use crate::executor::ValidationCheck;
use crate::step::{MigrationStatus, MigrationStep, StepStatus};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step: MigrationStep,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Step output consumed by later steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation: Vec<ValidationCheck>,
}

impl StepResult {
    /// Create in-progress result, started now
    #[must_use]
    pub fn started(step: MigrationStep) -> Self {
        Self {
            step,
            status: StepStatus::InProgress,
            started_at: Utc::now(),
            completed_at: None,
            data: None,
            error: None,
            validation: Vec::new(),
        }
    }

    /// Mark completed with output
    pub fn complete(&mut self, data: Value, validation: Vec<ValidationCheck>) {
        self.status = StepStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.data = Some(data);
        self.validation = validation;
    }

    /// Mark failed
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
    }

    /// Reset after a successful rollback
    pub fn roll_back(&mut self) {
        self.status = StepStatus::RolledBack;
        self.completed_at = None;
        self.data = None;
        self.error = None;
        self.validation.clear();
    }
}

/// State of one migration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationState {
    pub id: String,
    /// Next step to execute, or the last one executed when terminal
    pub current_step: MigrationStep,
    pub status: MigrationStatus,
    pub config: MigrationConfig,
    #[serde(default)]
    pub step_results: BTreeMap<MigrationStep, StepResult>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MigrationState {
    /// Create pending state with a fresh id
    #[must_use]
    pub fn new(config: MigrationConfig) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            current_step: MigrationStep::FIRST,
            status: MigrationStatus::Pending,
            config,
            step_results: BTreeMap::new(),
            started_at: now,
            updated_at: now,
            completed_at: None,
            error: None,
        }
    }

    /// With explicit id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Result of a step, if it ever ran
    #[inline]
    #[must_use]
    pub fn result(&self, step: MigrationStep) -> Option<&StepResult> {
        self.step_results.get(&step)
    }

    /// Status of a step; `Pending` when it never ran
    #[must_use]
    pub fn step_status(&self, step: MigrationStep) -> StepStatus {
        self.result(step).map_or(StepStatus::Pending, |r| r.status)
    }

    /// Whether a step completed
    #[inline]
    #[must_use]
    pub fn is_completed(&self, step: MigrationStep) -> bool {
        self.step_status(step) == StepStatus::Completed
    }

    /// Deserialize a completed step's output
    ///
    /// # Errors
    /// `StepPrerequisiteNotMet` for `consumer` when the step has no output;
    /// `Serialization` when the output has another shape.
    pub fn step_data<T: DeserializeOwned>(
        &self,
        step: MigrationStep,
        consumer: MigrationStep,
    ) -> Result<T, MigrationError> {
        let data = self
            .result(step)
            .filter(|r| r.status == StepStatus::Completed)
            .and_then(|r| r.data.clone())
            .ok_or_else(|| MigrationError::StepPrerequisiteNotMet {
                step: consumer,
                reason: format!("{step} has no completed output"),
            })?;
        Ok(serde_json::from_value(data)?)
    }

    /// Steps that can be rolled back, latest first
    #[must_use]
    pub fn rollback_candidates(&self) -> Vec<MigrationStep> {
        self.step_results
            .values()
            .filter(|r| matches!(r.status, StepStatus::Completed | StepStatus::Failed))
            .map(|r| r.step)
            .rev()
            .collect()
    }

    /// Bump `updated_at`
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
