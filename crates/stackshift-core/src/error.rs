//! Error types for migration orchestration
//!
//! Step-level and rollback-level failures carry the step name; lower-level
//! failures are wrapped unchanged.

use crate::step::MigrationStep;
use stackshift_discovery::DiscoveryError;
use stackshift_model::ModelError;
use stackshift_resolve::{InterventionError, ResolveError};
use std::path::PathBuf;

/// Main migration error type
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Step prerequisites are not satisfied; nothing was executed
    #[error("prerequisites for {step} not met: {reason}")]
    StepPrerequisiteNotMet { step: MigrationStep, reason: String },

    /// State machine refused the step
    #[error("step {step} cannot execute (current step {current}, {reason})")]
    StepNotExecutable {
        step: MigrationStep,
        current: MigrationStep,
        reason: String,
    },

    /// Step order violation
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition { from: MigrationStep, to: MigrationStep },

    /// An error-severity validation check failed
    #[error("validation failed for {step}: {}", .checks.join(", "))]
    ValidationCheckFailed {
        step: MigrationStep,
        checks: Vec<String>,
    },

    /// Rollback of a step failed; the chain stops here
    #[error("rollback of {step} failed: {reason}; manual remediation required")]
    RollbackFailure { step: MigrationStep, reason: String },

    /// Step-specific failure
    #[error("step {step} failed: {reason}")]
    StepFailed { step: MigrationStep, reason: String },

    /// Checkpoint asked to stop at the next boundary
    #[error("paused: {0}")]
    Paused(String),

    /// Checkpoint aborted the migration
    #[error("aborted: {0}")]
    Aborted(String),

    /// No executor registered for a step
    #[error("no executor registered for {0}")]
    MissingExecutor(MigrationStep),

    /// Unknown migration id
    #[error("migration not found: {0}")]
    NotFound(String),

    /// Bounded polling ran out of attempts
    #[error("{operation} timed out after {attempts} attempt(s)")]
    Timeout { operation: String, attempts: u32 },

    /// External command failed
    #[error("command `{program}` failed: {reason}")]
    Command { program: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Template(#[from] ModelError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Resolution(#[from] ResolveError),

    #[error(transparent)]
    Intervention(#[from] InterventionError),

    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    #[error("audit log error: {0}")]
    Audit(#[from] AuditError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MigrationError {
    /// Whether an operator must act before anything else runs
    #[inline]
    #[must_use]
    pub fn requires_manual_remediation(&self) -> bool {
        matches!(
            self,
            Self::RollbackFailure { .. } | Self::Audit(AuditError::IntegrityViolation { .. })
        )
    }

    /// Whether this is an operator pause rather than a failure
    #[inline]
    #[must_use]
    pub fn is_pause(&self) -> bool {
        matches!(self, Self::Paused(_))
    }

    /// Whether an operator stopped the migration
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            Self::Aborted(_) | Self::Intervention(InterventionError::Aborted(_))
        )
    }
}

/// State persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt state {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Audit log errors
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt audit entry at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },

    /// Hash chain broken: an entry was edited, reordered or removed
    #[error("audit chain broken at entry {sequence}: {reason}")]
    IntegrityViolation { sequence: u64, reason: String },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
