use pretty_assertions::assert_eq;
use stackshift_core::{
    MemoryAuditLog, MemoryStateStore, MigrationConfig, MigrationError, MigrationOrchestrator,
    MigrationStatus, MigrationStep, StateStore, StepExecutor, StepResult, StepStatus,
};
use stackshift_test_utils::{Behavior, CountingDiscovery, EventLog, RecordingStep, ScriptedIntervention};
use std::sync::Arc;

fn orchestrator(
    store: &Arc<MemoryStateStore>,
    steps: Vec<Arc<dyn StepExecutor>>,
) -> MigrationOrchestrator {
    steps.into_iter().fold(
        MigrationOrchestrator::new(
            store.clone(),
            Arc::new(MemoryAuditLog::new()),
            Arc::new(CountingDiscovery::default()),
            Arc::new(ScriptedIntervention::new()),
        ),
        MigrationOrchestrator::with_step,
    )
}

fn config() -> MigrationConfig {
    MigrationConfig::new("template.json")
}

fn events(log: &EventLog) -> Vec<String> {
    log.lock().clone()
}

fn executed(steps: &[MigrationStep]) -> Vec<String> {
    steps.iter().map(|s| format!("execute:{s}")).collect()
}

#[tokio::test]
async fn test_runs_every_step_in_order() {
    let log = EventLog::default();
    let store = Arc::new(MemoryStateStore::new());
    let orchestrator = orchestrator(&store, RecordingStep::all(&log, &[]));

    let state = orchestrator.start(config()).await.unwrap();

    assert_eq!(state.status, MigrationStatus::Completed);
    assert_eq!(state.current_step, MigrationStep::Complete);
    assert!(state.completed_at.is_some());
    assert_eq!(events(&log), executed(&MigrationStep::ALL));
    assert!(MigrationStep::ALL.iter().all(|s| state.is_completed(*s)));

    // Warnings are kept but never block
    let scan = state.result(MigrationStep::InitialScan).unwrap();
    assert_eq!(scan.validation.len(), 2);

    let persisted = store.load(&state.id).await.unwrap().unwrap();
    assert_eq!(persisted, state);
}

#[tokio::test]
async fn test_failure_rolls_back_in_reverse_order() {
    let log = EventLog::default();
    let store = Arc::new(MemoryStateStore::new());
    let orchestrator = orchestrator(
        &store,
        RecordingStep::all(&log, &[(MigrationStep::TemplateModification, Behavior::FailExecution)]),
    );

    let state = orchestrator.start(config()).await.unwrap();

    let mut expected = executed(&MigrationStep::ALL[..5]);
    expected.extend(
        [
            "rollback:template-modification",
            "rollback:comparison",
            "rollback:classification",
            "rollback:discovery",
            "rollback:initial-scan",
        ]
        .map(String::from),
    );
    assert_eq!(events(&log), expected);
    assert_eq!(state.status, MigrationStatus::RolledBack);
    assert_eq!(state.current_step, MigrationStep::InitialScan);
    for step in &MigrationStep::ALL[..5] {
        assert_eq!(state.step_status(*step), StepStatus::RolledBack);
    }
    assert_eq!(state.step_status(MigrationStep::CodeGeneration), StepStatus::Pending);
}

#[tokio::test]
async fn test_rollback_stops_at_first_failure() {
    let log = EventLog::default();
    let store = Arc::new(MemoryStateStore::new());
    let orchestrator = orchestrator(
        &store,
        RecordingStep::all(
            &log,
            &[
                (MigrationStep::TemplateModification, Behavior::FailExecution),
                (MigrationStep::Discovery, Behavior::FailRollback),
            ],
        ),
    );

    let err = orchestrator.start(config()).await.unwrap_err();
    assert!(matches!(
        err,
        MigrationError::RollbackFailure {
            step: MigrationStep::Discovery,
            ..
        }
    ));
    assert!(err.requires_manual_remediation());

    let rollbacks: Vec<String> = events(&log)
        .into_iter()
        .filter(|e| e.starts_with("rollback:"))
        .collect();
    assert_eq!(
        rollbacks,
        vec![
            "rollback:template-modification",
            "rollback:comparison",
            "rollback:classification",
            "rollback:discovery",
        ]
    );

    let ids = store.list().await.unwrap();
    let state = store.load(&ids[0]).await.unwrap().unwrap();
    assert_eq!(state.status, MigrationStatus::Failed);
    assert_eq!(state.step_status(MigrationStep::Classification), StepStatus::RolledBack);
    assert_eq!(state.step_status(MigrationStep::Discovery), StepStatus::Completed);
    assert_eq!(state.step_status(MigrationStep::InitialScan), StepStatus::Completed);
    assert!(state.error.unwrap().contains("manual remediation"));
}

#[tokio::test]
async fn test_failed_validation_fails_the_step() {
    let log = EventLog::default();
    let store = Arc::new(MemoryStateStore::new());
    let orchestrator = orchestrator(
        &store,
        RecordingStep::all(&log, &[(MigrationStep::Classification, Behavior::FailValidation)]),
    );

    let state = orchestrator
        .start(config().with_auto_rollback(false))
        .await
        .unwrap();

    assert_eq!(state.status, MigrationStatus::Failed);
    assert_eq!(state.current_step, MigrationStep::Classification);
    assert_eq!(events(&log), executed(&MigrationStep::ALL[..3]));
    let result = state.result(MigrationStep::Classification).unwrap();
    assert_eq!(result.status, StepStatus::Failed);
    assert_eq!(result.validation.len(), 2);
    assert_eq!(
        state.error.as_deref(),
        Some("validation failed for classification: scripted")
    );
}

#[tokio::test]
async fn test_abort_skips_rollback() {
    let log = EventLog::default();
    let store = Arc::new(MemoryStateStore::new());
    let orchestrator = orchestrator(
        &store,
        RecordingStep::all(&log, &[(MigrationStep::Comparison, Behavior::Abort)]),
    );

    let state = orchestrator.start(config()).await.unwrap();

    assert_eq!(state.status, MigrationStatus::Failed);
    assert!(events(&log).iter().all(|e| e.starts_with("execute:")));
    assert_eq!(state.step_status(MigrationStep::Comparison), StepStatus::Failed);
    assert_eq!(state.error.as_deref(), Some("aborted: scripted abort"));
}

#[tokio::test]
async fn test_checkpoint_pause_then_resume_in_fresh_orchestrator() {
    let log = EventLog::default();
    let store = Arc::new(MemoryStateStore::new());
    let first = orchestrator(
        &store,
        RecordingStep::all(&log, &[(MigrationStep::Comparison, Behavior::Pause)]),
    );

    let paused = first.start(config()).await.unwrap();
    assert_eq!(paused.status, MigrationStatus::Paused);
    assert_eq!(paused.current_step, MigrationStep::Comparison);
    assert_eq!(paused.step_status(MigrationStep::Comparison), StepStatus::Pending);
    drop(first);

    let second = orchestrator(&store, RecordingStep::all(&log, &[]));
    let resumed = second.resume(&paused.id).await.unwrap();

    assert_eq!(resumed.status, MigrationStatus::Completed);
    let comparisons = events(&log)
        .iter()
        .filter(|e| *e == "execute:comparison")
        .count();
    assert_eq!(comparisons, 2);
    assert_eq!(
        events(&log).iter().filter(|e| *e == "execute:discovery").count(),
        1
    );
}

#[tokio::test]
async fn test_pause_handle_stops_at_step_boundary() {
    let log = EventLog::default();
    let store = Arc::new(MemoryStateStore::new());
    let orchestrator = orchestrator(&store, RecordingStep::all(&log, &[]));

    orchestrator.pause_handle().request_pause();
    let paused = orchestrator.start(config()).await.unwrap();
    assert_eq!(paused.status, MigrationStatus::Paused);
    assert_eq!(paused.current_step, MigrationStep::InitialScan);
    assert!(events(&log).is_empty());

    let resumed = orchestrator.resume(&paused.id).await.unwrap();
    assert_eq!(resumed.status, MigrationStatus::Completed);
    assert_eq!(events(&log), executed(&MigrationStep::ALL));
}

#[tokio::test]
async fn test_interrupted_step_is_executed_again() {
    let log = EventLog::default();
    let store = Arc::new(MemoryStateStore::new());
    let first = orchestrator(
        &store,
        RecordingStep::all(&log, &[(MigrationStep::Discovery, Behavior::Pause)]),
    );
    let paused = first.start(config()).await.unwrap();

    // Simulate a crash in the middle of discovery
    let mut crashed = paused.clone();
    crashed.status = MigrationStatus::InProgress;
    crashed
        .step_results
        .insert(MigrationStep::Discovery, StepResult::started(MigrationStep::Discovery));
    store.save(&crashed).await.unwrap();

    let second = orchestrator(&store, RecordingStep::all(&log, &[]));
    let resumed = second.resume(&paused.id).await.unwrap();
    assert_eq!(resumed.status, MigrationStatus::Completed);
    assert!(resumed.is_completed(MigrationStep::Discovery));
}

#[tokio::test]
async fn test_resume_of_completed_migration_is_a_no_op() {
    let log = EventLog::default();
    let store = Arc::new(MemoryStateStore::new());
    let orchestrator = orchestrator(&store, RecordingStep::all(&log, &[]));
    let done = orchestrator.start(config()).await.unwrap();
    log.lock().clear();

    let again = orchestrator.resume(&done.id).await.unwrap();
    assert_eq!(again.status, MigrationStatus::Completed);
    assert!(events(&log).is_empty());
}

#[tokio::test]
async fn test_unknown_migration_is_not_found() {
    let store = Arc::new(MemoryStateStore::new());
    let orchestrator = orchestrator(&store, Vec::new());
    assert!(matches!(
        orchestrator.resume("missing").await,
        Err(MigrationError::NotFound(_))
    ));
    assert!(matches!(
        orchestrator.status("missing").await,
        Err(MigrationError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_steps_cannot_be_skipped() {
    let log = EventLog::default();
    let store = Arc::new(MemoryStateStore::new());
    let orchestrator = orchestrator(&store, RecordingStep::all(&log, &[]));
    let mut state = stackshift_core::MigrationState::new(config());

    let err = orchestrator
        .execute_step(&mut state, MigrationStep::Classification)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::StepNotExecutable { .. }));
    assert!(events(&log).is_empty());
    assert!(state.step_results.is_empty());
}

#[tokio::test]
async fn test_missing_executor_fails_migration() {
    let store = Arc::new(MemoryStateStore::new());
    let orchestrator = orchestrator(&store, Vec::new());

    let err = orchestrator.start(config()).await.unwrap_err();
    assert!(matches!(
        err,
        MigrationError::MissingExecutor(MigrationStep::InitialScan)
    ));
    let ids = store.list().await.unwrap();
    let state = store.load(&ids[0]).await.unwrap().unwrap();
    assert_eq!(state.status, MigrationStatus::Failed);
}

#[tokio::test]
async fn test_rolled_back_migration_can_run_again() {
    let log = EventLog::default();
    let store = Arc::new(MemoryStateStore::new());
    let failing = orchestrator(
        &store,
        RecordingStep::all(&log, &[(MigrationStep::Verification, Behavior::FailExecution)]),
    );
    let rolled_back = failing.start(config()).await.unwrap();
    assert_eq!(rolled_back.status, MigrationStatus::RolledBack);

    let fixed = orchestrator(&store, RecordingStep::all(&log, &[]));
    let state = fixed.resume(&rolled_back.id).await.unwrap();
    assert_eq!(state.status, MigrationStatus::Completed);
}
