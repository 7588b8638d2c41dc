//! Migration orchestrator
//!
//! Drives a [`MigrationState`] through the registered step executors, one step
//! at a time, persisting after every boundary. A fresh orchestrator over the
//! same [`StateStore`] can resume any persisted migration.

use crate::audit::AuditLog;
use crate::checkpoint::{AuditingIntervention, CheckpointManager};
use crate::config::MigrationConfig;
use crate::drift::DriftDetector;
use crate::error::MigrationError;
use crate::executor::{StepContext, StepExecutor, ValidationCheck};
use crate::state::{MigrationState, StepResult};
use crate::state_machine::{calculate_progress, execution_blocker, next_step, validate_transition};
use crate::step::{MigrationStatus, MigrationStep, StepStatus};
use crate::steps::default_steps;
use crate::store::StateStore;
use chrono::Utc;
use stackshift_discovery::DiscoveryPort;
use stackshift_resolve::{AutomatedIntervention, InterventionPort, PhysicalIdResolver, ResourceMatcher};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Result of executing one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    /// Execution or an error-severity validation check failed
    Failed(String),
    /// A checkpoint asked to pause; the step is pending again
    Paused(String),
    /// An operator aborted the migration
    Aborted(String),
}

/// Request a pause at the next step boundary
///
/// Cloned handles share one flag.
#[derive(Debug, Clone, Default)]
pub struct PauseHandle(Arc<AtomicBool>);

impl PauseHandle {
    /// Ask the running migration to stop after the current step
    pub fn request_pause(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Consume a pending request
    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Runs migrations step by step
pub struct MigrationOrchestrator {
    store: Arc<dyn StateStore>,
    audit: Arc<dyn AuditLog>,
    discovery: Arc<dyn DiscoveryPort>,
    intervention: Arc<dyn InterventionPort>,
    drift: Option<Arc<dyn DriftDetector>>,
    executors: BTreeMap<MigrationStep, Arc<dyn StepExecutor>>,
    pause: PauseHandle,
}

impl fmt::Debug for MigrationOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationOrchestrator")
            .field("store", &self.store)
            .field("audit", &self.audit)
            .field("discovery", &self.discovery)
            .field("drift", &self.drift)
            .field("steps", &self.executors.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl MigrationOrchestrator {
    /// Create orchestrator without step executors
    #[must_use]
    pub fn new(
        store: Arc<dyn StateStore>,
        audit: Arc<dyn AuditLog>,
        discovery: Arc<dyn DiscoveryPort>,
        intervention: Arc<dyn InterventionPort>,
    ) -> Self {
        Self {
            store,
            audit,
            discovery,
            intervention,
            drift: None,
            executors: BTreeMap::new(),
            pause: PauseHandle::default(),
        }
    }

    /// Register an executor, replacing any for the same step
    #[must_use]
    pub fn with_step(mut self, executor: Arc<dyn StepExecutor>) -> Self {
        self.executors.insert(executor.step(), executor);
        self
    }

    /// Register the built-in executors
    #[must_use]
    pub fn with_default_steps(self) -> Self {
        default_steps()
            .into_iter()
            .fold(self, MigrationOrchestrator::with_step)
    }

    /// With drift detector used during verification
    #[must_use]
    pub fn with_drift_detector(mut self, detector: Arc<dyn DriftDetector>) -> Self {
        self.drift = Some(detector);
        self
    }

    /// Handle that pauses the running migration at the next step boundary
    #[must_use]
    pub fn pause_handle(&self) -> PauseHandle {
        self.pause.clone()
    }

    /// Create, persist and run a new migration
    ///
    /// # Errors
    /// Invalid configuration, persistence failures, refused steps and
    /// rollback failures. A failed step is not an error: the returned state
    /// carries the status and the reason.
    pub async fn start(&self, config: MigrationConfig) -> Result<MigrationState, MigrationError> {
        config.validate()?;
        let mut state = MigrationState::new(config);
        tracing::info!(migration_id = %state.id, "starting migration");
        self.persist(&mut state).await?;
        self.run(&mut state).await?;
        Ok(state)
    }

    /// Reload a persisted migration and continue from its current step
    ///
    /// A step left in progress by an interrupted process is marked failed and
    /// executed again.
    ///
    /// # Errors
    /// `MigrationError::NotFound` for unknown ids, plus everything [`Self::run`]
    /// returns.
    pub async fn resume(&self, id: &str) -> Result<MigrationState, MigrationError> {
        let mut state = self.status(id).await?;
        if !state.status.is_resumable() {
            tracing::info!(migration_id = %id, status = %state.status, "migration already finished");
            return Ok(state);
        }

        if let Some(result) = state
            .step_results
            .get_mut(&state.current_step)
            .filter(|r| r.status == StepStatus::InProgress)
        {
            tracing::warn!(migration_id = %id, step = %result.step, "step was interrupted");
            result.fail("interrupted");
        }

        tracing::info!(migration_id = %id, step = %state.current_step, "resuming migration");
        self.run(&mut state).await?;
        Ok(state)
    }

    /// Load a persisted migration
    ///
    /// # Errors
    /// `MigrationError::NotFound` for unknown ids.
    pub async fn status(&self, id: &str) -> Result<MigrationState, MigrationError> {
        self.store
            .load(id)
            .await?
            .ok_or_else(|| MigrationError::NotFound(id.to_string()))
    }

    /// Run from `current_step` until completion, failure or pause
    ///
    /// # Errors
    /// Persistence failures, refused steps and rollback failures.
    pub async fn run(&self, state: &mut MigrationState) -> Result<MigrationStatus, MigrationError> {
        if state.status == MigrationStatus::Completed {
            return Ok(state.status);
        }
        state.status = MigrationStatus::InProgress;
        state.error = None;
        self.persist(state).await?;

        loop {
            if self.pause.take() {
                tracing::info!(migration_id = %state.id, step = %state.current_step, "paused at step boundary");
                state.status = MigrationStatus::Paused;
                self.persist(state).await?;
                return Ok(state.status);
            }

            let step = state.current_step;
            let outcome = match self.execute_step(state, step).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    state.status = MigrationStatus::Failed;
                    state.error = Some(e.to_string());
                    self.persist(state).await?;
                    return Err(e);
                }
            };

            match outcome {
                StepOutcome::Completed => {
                    let Some(next) = next_step(step) else {
                        state.status = MigrationStatus::Completed;
                        state.completed_at = Some(Utc::now());
                        self.persist(state).await?;
                        tracing::info!(migration_id = %state.id, "migration completed");
                        return Ok(state.status);
                    };
                    validate_transition(step, next)?;
                    state.current_step = next;
                    self.persist(state).await?;
                }
                StepOutcome::Paused(reason) => {
                    tracing::info!(migration_id = %state.id, %step, %reason, "migration paused");
                    state.status = MigrationStatus::Paused;
                    self.persist(state).await?;
                    return Ok(state.status);
                }
                StepOutcome::Aborted(reason) => {
                    tracing::warn!(migration_id = %state.id, %step, %reason, "migration aborted");
                    state.status = MigrationStatus::Failed;
                    state.error = Some(reason);
                    self.persist(state).await?;
                    return Ok(state.status);
                }
                StepOutcome::Failed(reason) => {
                    tracing::error!(migration_id = %state.id, %step, %reason, "step failed");
                    state.status = MigrationStatus::Failed;
                    state.error = Some(reason);
                    self.persist(state).await?;
                    if state.config.auto_rollback {
                        self.rollback(state).await?;
                    }
                    return Ok(state.status);
                }
            }
        }
    }

    /// Execute one step
    ///
    /// # Workflow
    /// 1. Ask the state machine whether `step` may run now
    /// 2. Check the executor's prerequisites (no side effects on failure)
    /// 3. Mark the step in progress, persist, execute
    /// 4. Run validation checks; a failed error-severity check fails the step
    /// 5. Persist the result whatever the outcome
    ///
    /// # Errors
    /// `StepNotExecutable`, `MissingExecutor` and `StepPrerequisiteNotMet`
    /// before anything runs; persistence failures afterwards.
    pub async fn execute_step(
        &self,
        state: &mut MigrationState,
        step: MigrationStep,
    ) -> Result<StepOutcome, MigrationError> {
        if let Some(reason) = execution_blocker(state, step) {
            return Err(MigrationError::StepNotExecutable {
                step,
                current: state.current_step,
                reason,
            });
        }
        let executor = self
            .executors
            .get(&step)
            .cloned()
            .ok_or(MigrationError::MissingExecutor(step))?;
        if !executor.validate_prerequisites(state) {
            return Err(MigrationError::StepPrerequisiteNotMet {
                step,
                reason: "executor prerequisites not satisfied".to_string(),
            });
        }

        tracing::info!(
            migration_id = %state.id,
            %step,
            progress = calculate_progress(step),
            "executing step"
        );
        let mut result = StepResult::started(step);
        state.step_results.insert(step, result.clone());
        self.persist(state).await?;

        let ctx = self.context(state, step);
        let outcome = match executor.execute_step(state, &ctx).await {
            Ok(data) => {
                let checks = executor.run_validation_checks(state, &data);
                let blocking: Vec<String> = checks
                    .iter()
                    .filter(|c| c.is_blocking())
                    .map(|c| c.name.clone())
                    .collect();
                log_checks(step, &checks);
                if blocking.is_empty() {
                    result.complete(data, checks);
                    StepOutcome::Completed
                } else {
                    let error = MigrationError::ValidationCheckFailed {
                        step,
                        checks: blocking,
                    };
                    result.fail(error.to_string());
                    result.validation = checks;
                    StepOutcome::Failed(error.to_string())
                }
            }
            Err(e) if e.is_pause() => {
                // Nothing completed; the step runs again on resume
                state.step_results.remove(&step);
                self.persist(state).await?;
                return Ok(StepOutcome::Paused(e.to_string()));
            }
            Err(e) if e.is_abort() => {
                result.fail(e.to_string());
                StepOutcome::Aborted(e.to_string())
            }
            Err(e) => {
                result.fail(e.to_string());
                StepOutcome::Failed(e.to_string())
            }
        };

        state.step_results.insert(step, result);
        self.persist(state).await?;
        Ok(outcome)
    }

    /// Roll back the failed step and every completed step, latest first
    ///
    /// Stops at the first rollback failure; the state then stays `FAILED`
    /// and needs manual remediation.
    ///
    /// # Errors
    /// `MigrationError::RollbackFailure` naming the step that could not be
    /// rolled back; persistence failures.
    pub async fn rollback(&self, state: &mut MigrationState) -> Result<(), MigrationError> {
        let candidates = state.rollback_candidates();
        tracing::info!(migration_id = %state.id, steps = candidates.len(), "rolling back");

        let mut earliest = None;
        for step in candidates {
            let rolled_back = match self.executors.get(&step) {
                Some(executor) => {
                    let ctx = self.context(state, step);
                    executor
                        .execute_rollback(state, &ctx)
                        .await
                        .map_err(|e| e.to_string())
                }
                None => Err(format!("no executor registered for {step}")),
            };

            if let Err(reason) = rolled_back {
                let error = MigrationError::RollbackFailure { step, reason };
                tracing::error!(migration_id = %state.id, %step, error = %error, "rollback failed");
                state.status = MigrationStatus::Failed;
                state.error = Some(error.to_string());
                self.persist(state).await?;
                return Err(error);
            }

            if let Some(result) = state.step_results.get_mut(&step) {
                result.roll_back();
            }
            tracing::info!(migration_id = %state.id, %step, "step rolled back");
            earliest = Some(step);
            self.persist(state).await?;
        }

        if let Some(step) = earliest {
            state.current_step = step;
        }
        state.status = MigrationStatus::RolledBack;
        self.persist(state).await
    }

    /// Collaborators for one step, with audited intervention
    fn context(&self, state: &MigrationState, step: MigrationStep) -> StepContext {
        let base: Arc<dyn InterventionPort> = if state.config.interaction.is_automated() {
            Arc::new(AutomatedIntervention)
        } else {
            self.intervention.clone()
        };
        let intervention: Arc<dyn InterventionPort> = Arc::new(AuditingIntervention::new(
            base,
            self.audit.clone(),
            state.id.clone(),
            step,
        ));
        let resolver = PhysicalIdResolver::new(
            self.discovery.clone(),
            ResourceMatcher::new(state.config.matcher_config()),
        )
        .with_config(state.config.resolver_config())
        .with_intervention(intervention.clone());

        StepContext {
            migration_id: state.id.clone(),
            step,
            discovery: self.discovery.clone(),
            resolver: Arc::new(resolver),
            intervention: intervention.clone(),
            checkpoints: CheckpointManager::new(intervention),
            drift: self.drift.clone(),
        }
    }

    async fn persist(&self, state: &mut MigrationState) -> Result<(), MigrationError> {
        state.touch();
        self.store.save(state).await?;
        Ok(())
    }
}

fn log_checks(step: MigrationStep, checks: &[ValidationCheck]) {
    for check in checks.iter().filter(|c| !c.passed) {
        tracing::warn!(
            %step,
            check = %check.name,
            severity = ?check.severity,
            message = %check.message,
            "validation check failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_requests_are_consumed_once() {
        let handle = PauseHandle::default();
        let shared = handle.clone();
        shared.request_pause();
        assert!(handle.is_requested());
        assert!(handle.take());
        assert!(!handle.take());
        assert!(!shared.is_requested());
    }
}
