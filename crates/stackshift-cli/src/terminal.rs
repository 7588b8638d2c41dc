//! Operator prompts on the terminal

use dialoguer::{FuzzySelect, Input, Select};
use stackshift_model::{DriftReport, PropertyDifference, ResourceType};
use stackshift_resolve::{
    CriticalDecision, DriftDecision, InterventionError, InterventionPort, InterventionPrompt,
    InterventionResponse, MatchCandidate, PromptKind,
};

/// Intervention port backed by dialoguer
///
/// Esc (or an empty answer) skips the prompt. Checkpoints treat a skip as
/// pause; resolution treats it as a failure for that resource.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TerminalIntervention;

impl TerminalIntervention {
    /// Ask on a blocking thread; `None` when skipped
    async fn ask(prompt: &InterventionPrompt) -> Result<Option<String>, InterventionError> {
        let prompt = prompt.clone();
        tokio::task::spawn_blocking(move || ask_blocking(&prompt))
            .await
            .map_err(|e| InterventionError::Unavailable(e.to_string()))?
            .map_err(|e| InterventionError::Unavailable(e.to_string()))
    }

    async fn require(prompt: &InterventionPrompt) -> Result<String, InterventionError> {
        Self::ask(prompt).await?.ok_or_else(|| {
            InterventionError::skipped(
                prompt
                    .resource_id
                    .clone()
                    .unwrap_or_else(|| prompt.message.clone()),
            )
        })
    }
}

fn ask_blocking(prompt: &InterventionPrompt) -> Result<Option<String>, dialoguer::Error> {
    if prompt.options.is_empty() {
        let value: String = Input::new()
            .with_prompt(format!("{} (empty to skip)", prompt.message))
            .allow_empty(true)
            .interact_text()?;
        let value = value.trim().to_string();
        return Ok((!value.is_empty()).then_some(value));
    }

    let labels: Vec<&str> = prompt.options.iter().map(|o| o.label.as_str()).collect();
    let default = prompt
        .default
        .as_deref()
        .and_then(|d| prompt.options.iter().position(|o| o.value == d))
        .unwrap_or(0);

    // Candidate lists can be long
    let index = if prompt.kind == PromptKind::PhysicalId {
        FuzzySelect::new()
            .with_prompt(prompt.message.clone())
            .items(&labels)
            .default(default)
            .interact_opt()?
    } else {
        Select::new()
            .with_prompt(prompt.message.clone())
            .items(&labels)
            .default(default)
            .interact_opt()?
    };
    Ok(index.and_then(|i| prompt.options.get(i)).map(|o| o.value.clone()))
}

#[async_trait::async_trait]
impl InterventionPort for TerminalIntervention {
    async fn prompt_for_physical_id(
        &self,
        logical_id: &str,
        resource_type: &ResourceType,
        candidates: &[MatchCandidate],
    ) -> Result<String, InterventionError> {
        let prompt = InterventionPrompt::physical_id(logical_id, resource_type, candidates);
        Self::require(&prompt).await
    }

    async fn confirm_critical_difference(
        &self,
        resource_id: &str,
        differences: &[PropertyDifference],
    ) -> Result<CriticalDecision, InterventionError> {
        let prompt = InterventionPrompt::critical_difference(resource_id, differences);
        Self::require(&prompt).await?.parse()
    }

    async fn resolve_drift(
        &self,
        resource_id: &str,
        drift: &DriftReport,
    ) -> Result<DriftDecision, InterventionError> {
        let prompt = InterventionPrompt::drift(resource_id, drift);
        Self::require(&prompt).await?.parse()
    }

    async fn prompt(
        &self,
        prompt: &InterventionPrompt,
    ) -> Result<InterventionResponse, InterventionError> {
        let value = Self::require(prompt).await?;
        Ok(InterventionResponse::select(prompt, value))
    }
}
