//! Step executor contract
//!
//! Every migration step implements [`StepExecutor`]. Only `execute_step` and
//! `execute_rollback` talk to collaborators; prerequisite and validation
//! checks are pure.

use crate::checkpoint::CheckpointManager;
use crate::drift::DriftDetector;
use crate::error::MigrationError;
use crate::state::MigrationState;
use crate::step::MigrationStep;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stackshift_discovery::DiscoveryPort;
use stackshift_resolve::{InterventionPort, PhysicalIdResolver};
use std::fmt;
use std::sync::Arc;

/// Severity of a validation check; only `Error` fails a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckSeverity {
    Info,
    Warning,
    Error,
}

/// Post-execution check of a step's output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub severity: CheckSeverity,
}

impl ValidationCheck {
    /// Check with outcome
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        passed: bool,
        message: impl Into<String>,
        severity: CheckSeverity,
    ) -> Self {
        Self {
            name: name.into(),
            passed,
            message: message.into(),
            severity,
        }
    }

    /// Error-severity check
    #[must_use]
    pub fn error(name: impl Into<String>, passed: bool, message: impl Into<String>) -> Self {
        Self::new(name, passed, message, CheckSeverity::Error)
    }

    /// Warning-severity check
    #[must_use]
    pub fn warning(name: impl Into<String>, passed: bool, message: impl Into<String>) -> Self {
        Self::new(name, passed, message, CheckSeverity::Warning)
    }

    /// Failed with error severity
    #[inline]
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        !self.passed && self.severity == CheckSeverity::Error
    }
}

/// Collaborators available to a running step
#[derive(Clone)]
pub struct StepContext {
    pub migration_id: String,
    pub step: MigrationStep,
    pub discovery: Arc<dyn DiscoveryPort>,
    pub resolver: Arc<PhysicalIdResolver>,
    /// Audited intervention for this step
    pub intervention: Arc<dyn InterventionPort>,
    pub checkpoints: CheckpointManager,
    pub drift: Option<Arc<dyn DriftDetector>>,
}

impl fmt::Debug for StepContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("migration_id", &self.migration_id)
            .field("step", &self.step)
            .field("drift", &self.drift.is_some())
            .finish_non_exhaustive()
    }
}

/// One migration step
#[async_trait::async_trait]
pub trait StepExecutor: Send + Sync + fmt::Debug {
    /// Step this executor implements
    fn step(&self) -> MigrationStep;

    /// Whether the state holds everything this step needs
    ///
    /// Must not have side effects.
    fn validate_prerequisites(&self, _state: &MigrationState) -> bool {
        true
    }

    /// Run the step and return its output
    async fn execute_step(
        &self,
        state: &MigrationState,
        ctx: &StepContext,
    ) -> Result<Value, MigrationError>;

    /// Check the output of a successful run
    fn run_validation_checks(&self, _state: &MigrationState, _data: &Value) -> Vec<ValidationCheck> {
        Vec::new()
    }

    /// Undo the step's external effects, best effort
    async fn execute_rollback(
        &self,
        _state: &MigrationState,
        _ctx: &StepContext,
    ) -> Result<(), MigrationError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_failed_errors_block() {
        assert!(ValidationCheck::error("a", false, "").is_blocking());
        assert!(!ValidationCheck::error("a", true, "").is_blocking());
        assert!(!ValidationCheck::warning("a", false, "").is_blocking());
        assert!(!ValidationCheck::new("a", false, "", CheckSeverity::Info).is_blocking());
    }
}
