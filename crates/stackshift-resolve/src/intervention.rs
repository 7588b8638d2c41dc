//! Human intervention port
//!
//! The resolver and migration steps ask an operator for decisions through
//! [`InterventionPort`]. Terminal, scripted and automated adapters implement
//! it; a skip surfaces as [`InterventionError::Skipped`] so callers never
//! mistake it for an answer.

use crate::matcher::MatchCandidate;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stackshift_model::{DriftReport, PropertyDifference, ResourceType};

/// Errors raised by intervention adapters
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterventionError {
    /// Operator declined to answer
    #[error("operator skipped {subject}")]
    Skipped {
        /// What was being asked about
        subject: String,
    },

    /// Operator or signal aborted the session
    #[error("intervention aborted: {0}")]
    Aborted(String),

    /// No operator is reachable (closed terminal, non-interactive run)
    #[error("intervention unavailable: {0}")]
    Unavailable(String),

    /// Answer did not fit the prompt
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl InterventionError {
    /// Skip for a subject
    #[must_use]
    pub fn skipped(subject: impl Into<String>) -> Self {
        Self::Skipped {
            subject: subject.into(),
        }
    }

    /// Whether the operator chose to skip or abort
    #[inline]
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Skipped { .. } | Self::Aborted(_))
    }
}

/// Answer to a critical property difference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CriticalDecision {
    /// Continue the migration with the live values
    Proceed,
    /// Stop the migration
    Abort,
    /// Continue, leaving the difference for manual follow-up
    Manual,
}

/// Answer to drift on a live resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriftDecision {
    /// Keep the live configuration
    UseCurrent,
    /// Restore the template configuration
    UseTemplate,
    /// Leave for manual follow-up
    Manual,
}

/// Kind of question being asked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptKind {
    /// Choose a physical id among candidates
    PhysicalId,
    /// Critical property difference
    CriticalDifference,
    /// Live drift
    Drift,
    /// Pause point between migration steps
    Checkpoint,
    /// Plain yes/no confirmation
    Confirm,
}

/// One selectable answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOption {
    pub value: String,
    pub label: String,
}

impl PromptOption {
    #[must_use]
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// A question for an operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionPrompt {
    /// Unique prompt id (ULID)
    pub id: String,
    pub kind: PromptKind,
    pub message: String,
    pub options: Vec<PromptOption>,
    /// Value of the option chosen when nobody is asked
    pub default: Option<String>,
    /// Resource the question is about, if any
    pub resource_id: Option<String>,
}

impl InterventionPrompt {
    /// Create prompt with a fresh id
    #[must_use]
    pub fn new(kind: PromptKind, message: impl Into<String>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            kind,
            message: message.into(),
            options: Vec::new(),
            default: None,
            resource_id: None,
        }
    }

    /// With an option
    #[must_use]
    pub fn with_option(mut self, value: impl Into<String>, label: impl Into<String>) -> Self {
        self.options.push(PromptOption::new(value, label));
        self
    }

    /// With default option value
    #[must_use]
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// With subject resource
    #[must_use]
    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Physical id selection prompt; options are the ranked candidates
    #[must_use]
    pub fn physical_id(
        logical_id: &str,
        resource_type: &ResourceType,
        candidates: &[MatchCandidate],
    ) -> Self {
        let mut prompt = Self::new(
            PromptKind::PhysicalId,
            format!("Select the physical resource for {logical_id} ({resource_type})"),
        )
        .with_resource(logical_id);
        for candidate in candidates {
            prompt = prompt.with_option(
                candidate.physical_id.clone(),
                format!(
                    "{} ({:.0}%)",
                    candidate.physical_id,
                    candidate.confidence * 100.0
                ),
            );
        }
        prompt
    }

    /// Critical difference prompt
    #[must_use]
    pub fn critical_difference(resource_id: &str, differences: &[PropertyDifference]) -> Self {
        let details: Vec<String> = differences.iter().map(ToString::to_string).collect();
        Self::new(
            PromptKind::CriticalDifference,
            format!(
                "Critical differences on {resource_id}:\n  {}",
                details.join("\n  ")
            ),
        )
        .with_resource(resource_id)
        .with_option("proceed", "Proceed with live values")
        .with_option("abort", "Abort the migration")
        .with_option("manual", "Continue and resolve manually later")
        .with_default("manual")
    }

    /// Drift prompt
    #[must_use]
    pub fn drift(resource_id: &str, drift: &DriftReport) -> Self {
        Self::new(
            PromptKind::Drift,
            format!(
                "{resource_id} has drifted ({:?}, {} difference(s))",
                drift.status,
                drift.differences.len()
            ),
        )
        .with_resource(resource_id)
        .with_option("use-current", "Keep the live configuration")
        .with_option("use-template", "Restore the template configuration")
        .with_option("manual", "Resolve manually later")
        .with_default("use-current")
    }

    /// Value an unattended adapter should answer with
    ///
    /// The declared default, else the first option.
    #[must_use]
    pub fn automatic_choice(&self) -> Option<&str> {
        self.default
            .as_deref()
            .or_else(|| self.options.first().map(|o| o.value.as_str()))
    }

    /// Whether `value` is one of the options
    #[must_use]
    pub fn accepts(&self, value: &str) -> bool {
        self.options.iter().any(|o| o.value == value)
    }
}

/// Action recorded for an answered prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseAction {
    /// An option or free-text value was chosen
    Select,
    /// Carry on past a checkpoint
    Continue,
    /// Stop after persisting state
    Pause,
    /// Stop the migration
    Abort,
    /// Declined to answer
    Skip,
}

/// Answer to an [`InterventionPrompt`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionResponse {
    pub prompt_id: String,
    pub action: ResponseAction,
    pub value: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl InterventionResponse {
    /// Create response to a prompt, timestamped now
    #[must_use]
    pub fn new(prompt_id: impl Into<String>, action: ResponseAction, value: Option<String>) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            action,
            value,
            timestamp: Utc::now(),
        }
    }

    /// Selection of a value
    #[must_use]
    pub fn select(prompt: &InterventionPrompt, value: impl Into<String>) -> Self {
        Self::new(prompt.id.clone(), ResponseAction::Select, Some(value.into()))
    }
}

/// Operator decisions requested by resolution and migration steps
///
/// # Errors
/// Every method returns `InterventionError::Skipped` when the operator
/// declines; `Unavailable` when no operator can be reached.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InterventionPort: Send + Sync {
    /// Choose a physical id for a logical resource among ranked candidates
    async fn prompt_for_physical_id(
        &self,
        logical_id: &str,
        resource_type: &ResourceType,
        candidates: &[MatchCandidate],
    ) -> Result<String, InterventionError>;

    /// Decide how to handle critical template/live differences
    async fn confirm_critical_difference(
        &self,
        resource_id: &str,
        differences: &[PropertyDifference],
    ) -> Result<CriticalDecision, InterventionError>;

    /// Decide how to handle drift on a live resource
    async fn resolve_drift(
        &self,
        resource_id: &str,
        drift: &DriftReport,
    ) -> Result<DriftDecision, InterventionError>;

    /// Answer a generic prompt
    async fn prompt(
        &self,
        prompt: &InterventionPrompt,
    ) -> Result<InterventionResponse, InterventionError>;
}

impl std::str::FromStr for CriticalDecision {
    type Err = InterventionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "proceed" => Ok(Self::Proceed),
            "abort" => Ok(Self::Abort),
            "manual" => Ok(Self::Manual),
            other => Err(InterventionError::InvalidResponse(other.to_string())),
        }
    }
}

impl std::str::FromStr for DriftDecision {
    type Err = InterventionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "use-current" => Ok(Self::UseCurrent),
            "use-template" => Ok(Self::UseTemplate),
            "manual" => Ok(Self::Manual),
            other => Err(InterventionError::InvalidResponse(other.to_string())),
        }
    }
}

/// Answers every prompt without asking anyone
///
/// Physical ids resolve to the top-ranked candidate; every other prompt takes
/// its declared default, else its first option. Used for dry runs and
/// auto-approved runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutomatedIntervention;

impl AutomatedIntervention {
    fn choose(prompt: &InterventionPrompt) -> Result<String, InterventionError> {
        prompt
            .automatic_choice()
            .map(str::to_string)
            .ok_or_else(|| {
                InterventionError::skipped(
                    prompt
                        .resource_id
                        .clone()
                        .unwrap_or_else(|| prompt.message.clone()),
                )
            })
    }
}

#[async_trait]
impl InterventionPort for AutomatedIntervention {
    async fn prompt_for_physical_id(
        &self,
        logical_id: &str,
        resource_type: &ResourceType,
        candidates: &[MatchCandidate],
    ) -> Result<String, InterventionError> {
        let prompt = InterventionPrompt::physical_id(logical_id, resource_type, candidates);
        let choice = Self::choose(&prompt)?;
        tracing::info!(logical_id, physical_id = %choice, "automatically selected top candidate");
        Ok(choice)
    }

    async fn confirm_critical_difference(
        &self,
        resource_id: &str,
        differences: &[PropertyDifference],
    ) -> Result<CriticalDecision, InterventionError> {
        Self::choose(&InterventionPrompt::critical_difference(resource_id, differences))?.parse()
    }

    async fn resolve_drift(
        &self,
        resource_id: &str,
        drift: &DriftReport,
    ) -> Result<DriftDecision, InterventionError> {
        Self::choose(&InterventionPrompt::drift(resource_id, drift))?.parse()
    }

    async fn prompt(
        &self,
        prompt: &InterventionPrompt,
    ) -> Result<InterventionResponse, InterventionError> {
        let choice = Self::choose(prompt)?;
        Ok(InterventionResponse::select(prompt, choice))
    }
}
