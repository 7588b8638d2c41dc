//! Migration step sequencing
//!
//! Pure functions over [`MigrationStep`] and [`MigrationState`]. Steps run
//! strictly in order; no step may be skipped, and going backwards requires
//! the migration to have been rolled back.

use crate::error::MigrationError;
use crate::state::MigrationState;
use crate::step::{MigrationStatus, MigrationStep, StepStatus};

/// Step after `step`; `None` after the final step
#[inline]
#[must_use]
pub fn next_step(step: MigrationStep) -> Option<MigrationStep> {
    MigrationStep::from_index(step.index() + 1)
}

/// Step before `step`; `None` before the first step
#[inline]
#[must_use]
pub fn previous_step(step: MigrationStep) -> Option<MigrationStep> {
    step.index().checked_sub(1).and_then(MigrationStep::from_index)
}

/// Steps reachable from `from` in one transition
#[must_use]
pub fn allowed_transitions(from: MigrationStep) -> Vec<MigrationStep> {
    next_step(from).into_iter().collect()
}

/// Validates a step transition
///
/// Only the immediate successor is a legal target.
///
/// # Errors
/// `MigrationError::IllegalTransition` otherwise.
pub fn validate_transition(from: MigrationStep, to: MigrationStep) -> Result<(), MigrationError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(MigrationError::IllegalTransition { from, to })
    }
}

/// Why `step` cannot execute now, or `None` when it can
#[must_use]
pub fn execution_blocker(state: &MigrationState, step: MigrationStep) -> Option<String> {
    let current = state.current_step;

    if step < current && state.status != MigrationStatus::RolledBack {
        return Some("step is behind the current step".to_string());
    }
    if step.index() > current.index() + 1 {
        return Some("steps cannot be skipped".to_string());
    }
    if let Some(pending) = MigrationStep::ALL[..step.index()]
        .iter()
        .find(|earlier| !state.is_completed(**earlier))
    {
        return Some(format!("{pending} has not completed"));
    }
    match state.step_status(step) {
        StepStatus::InProgress => Some("step is already in progress".to_string()),
        StepStatus::Completed => Some("step already completed; roll back first".to_string()),
        _ => None,
    }
}

/// Whether `step` may execute now
#[inline]
#[must_use]
pub fn can_execute_step(state: &MigrationState, step: MigrationStep) -> bool {
    execution_blocker(state, step).is_none()
}

/// Progress percentage at `step`: `round(index / (total - 1) * 100)`
#[must_use]
pub fn calculate_progress(step: MigrationStep) -> u8 {
    let last = MigrationStep::ALL.len() - 1;
    let percent = (step.index() * 200 + last) / (2 * last);
    u8::try_from(percent).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MigrationConfig;
    use crate::state::StepResult;
    use proptest::prelude::*;
    use serde_json::json;

    fn state_at(current: MigrationStep) -> MigrationState {
        let mut state = MigrationState::new(MigrationConfig::default());
        for step in &MigrationStep::ALL[..current.index()] {
            let mut r = StepResult::started(*step);
            r.complete(json!(null), Vec::new());
            state.step_results.insert(*step, r);
        }
        state.current_step = current;
        state.status = MigrationStatus::InProgress;
        state
    }

    #[test]
    fn boundaries_have_no_neighbours() {
        assert_eq!(next_step(MigrationStep::Complete), None);
        assert_eq!(previous_step(MigrationStep::InitialScan), None);
        assert_eq!(next_step(MigrationStep::InitialScan), Some(MigrationStep::Discovery));
        assert_eq!(
            previous_step(MigrationStep::Complete),
            Some(MigrationStep::Verification)
        );
    }

    #[test]
    fn only_successor_is_a_legal_transition() {
        assert!(validate_transition(MigrationStep::Discovery, MigrationStep::Classification).is_ok());
        assert!(validate_transition(MigrationStep::Discovery, MigrationStep::Comparison).is_err());
        assert!(validate_transition(MigrationStep::Discovery, MigrationStep::InitialScan).is_err());
        assert!(allowed_transitions(MigrationStep::Complete).is_empty());
    }

    #[test]
    fn progress_endpoints() {
        assert_eq!(calculate_progress(MigrationStep::InitialScan), 0);
        assert_eq!(calculate_progress(MigrationStep::TemplateModification), 50);
        assert_eq!(calculate_progress(MigrationStep::Discovery), 13);
        assert_eq!(calculate_progress(MigrationStep::Complete), 100);
    }

    #[test]
    fn current_step_is_executable() {
        let state = state_at(MigrationStep::Comparison);
        assert!(can_execute_step(&state, MigrationStep::Comparison));
    }

    #[test]
    fn cannot_skip_ahead() {
        let state = state_at(MigrationStep::Comparison);
        // Comparison itself has not completed
        assert!(!can_execute_step(&state, MigrationStep::TemplateModification));
        assert!(!can_execute_step(&state, MigrationStep::CodeGeneration));
    }

    #[test]
    fn cannot_go_back_unless_rolled_back() {
        let mut state = state_at(MigrationStep::Comparison);
        assert!(!can_execute_step(&state, MigrationStep::Discovery));

        state.status = MigrationStatus::RolledBack;
        state
            .step_results
            .get_mut(&MigrationStep::Discovery)
            .unwrap()
            .roll_back();
        state
            .step_results
            .get_mut(&MigrationStep::Classification)
            .unwrap()
            .roll_back();
        assert!(can_execute_step(&state, MigrationStep::Discovery));
    }

    #[test]
    fn in_progress_blocks_reentry() {
        let mut state = state_at(MigrationStep::Discovery);
        state
            .step_results
            .insert(MigrationStep::Discovery, StepResult::started(MigrationStep::Discovery));
        assert_eq!(
            execution_blocker(&state, MigrationStep::Discovery).as_deref(),
            Some("step is already in progress")
        );
    }

    #[test]
    fn failed_step_can_be_retried() {
        let mut state = state_at(MigrationStep::Discovery);
        let mut failed = StepResult::started(MigrationStep::Discovery);
        failed.fail("throttled");
        state.step_results.insert(MigrationStep::Discovery, failed);
        assert!(can_execute_step(&state, MigrationStep::Discovery));
    }

    proptest! {
        #[test]
        fn never_more_than_one_ahead(current in 0usize..9, target in 0usize..9) {
            let current = MigrationStep::from_index(current).unwrap();
            let target = MigrationStep::from_index(target).unwrap();
            let state = state_at(current);
            let allowed = can_execute_step(&state, target);

            if target.index() > current.index() + 1 || target < current {
                prop_assert!(!allowed);
            }
            if target == current {
                prop_assert!(allowed);
            }
        }

        #[test]
        fn progress_is_monotonic(a in 0usize..9, b in 0usize..9) {
            let (a, b) = (MigrationStep::from_index(a).unwrap(), MigrationStep::from_index(b).unwrap());
            if a < b {
                prop_assert!(calculate_progress(a) < calculate_progress(b));
            }
            prop_assert!(calculate_progress(a) <= 100);
        }
    }
}
