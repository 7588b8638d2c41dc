//! Testing utilities for stackshift workspace
//!
//! Shared fakes and fixtures: counting discovery, scripted intervention and
//! recording step executors.

#![allow(missing_docs)]

use parking_lot::Mutex;
use serde_json::{json, Value};
use stackshift_core::{MigrationError, MigrationState, MigrationStep, StepContext, StepExecutor};
use stackshift_discovery::{DiscoveryError, DiscoveryOptions, DiscoveryPort, ProviderError};
use stackshift_model::{DiscoveredResource, DriftReport, PropertyDifference, ResourceType};
use stackshift_resolve::{
    CriticalDecision, DriftDecision, InterventionError, InterventionPort, InterventionPrompt,
    InterventionResponse, MatchCandidate,
};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Template with an explicitly named table, an unnamed table, a bucket and a
/// stateless function
pub fn sample_template() -> Value {
    json!({
        "Resources": {
            "OrdersTable": {
                "Type": "AWS::DynamoDB::Table",
                "DeletionPolicy": "Retain",
                "Properties": {
                    "TableName": "orders-dev",
                    "BillingMode": "PAY_PER_REQUEST"
                }
            },
            "UsersTable": {
                "Type": "AWS::DynamoDB::Table",
                "Properties": {
                    "BillingMode": "PAY_PER_REQUEST"
                }
            },
            "AssetsBucket": {
                "Type": "AWS::S3::Bucket",
                "Properties": {
                    "BucketName": "assets-dev"
                }
            },
            "HandlerFunction": {
                "Type": "AWS::Lambda::Function",
                "Properties": {
                    "FunctionName": "handler",
                    "Runtime": "nodejs20.x"
                }
            }
        }
    })
}

/// Write [`sample_template`] into `dir`
pub fn write_sample_template(dir: &Path) -> PathBuf {
    let path = dir.join("template.json");
    std::fs::write(&path, sample_template().to_string()).unwrap();
    path
}

/// Live DynamoDB table
pub fn table(id: &str) -> DiscoveredResource {
    DiscoveredResource::builder(id, ResourceType::dynamodb_table())
        .region("us-east-1")
        .arn(format!("arn:aws:dynamodb:us-east-1:123456789012:table/{id}"))
        .metadata("BillingMode", json!("PAY_PER_REQUEST"))
        .build()
}

/// Live S3 bucket
pub fn bucket(id: &str) -> DiscoveredResource {
    DiscoveredResource::builder(id, ResourceType::s3_bucket())
        .region("us-east-1")
        .arn(format!("arn:aws:s3:::{id}"))
        .build()
}

/// Inventory matching [`sample_template`], with decoys for `UsersTable`
pub fn sample_inventory() -> Vec<DiscoveredResource> {
    vec![
        table("orders-dev"),
        table("users-legacy"),
        table("user-profiles"),
        table("user-data"),
        bucket("assets-dev"),
    ]
}

/// Discovery over a fixed inventory that counts calls
#[derive(Debug, Default)]
pub struct CountingDiscovery {
    resources: Mutex<Vec<DiscoveredResource>>,
    calls: AtomicUsize,
    failing: Mutex<Option<ResourceType>>,
}

impl CountingDiscovery {
    pub fn new(resources: Vec<DiscoveredResource>) -> Self {
        Self {
            resources: Mutex::new(resources),
            ..Self::default()
        }
    }

    /// Number of discovery calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Drop a resource from the inventory
    pub fn remove(&self, physical_id: &str) {
        self.resources.lock().retain(|r| r.physical_id() != physical_id);
    }

    /// Make discovery of one type fail with a provider error
    pub fn fail_on(&self, resource_type: ResourceType) {
        *self.failing.lock() = Some(resource_type);
    }
}

#[async_trait::async_trait]
impl DiscoveryPort for CountingDiscovery {
    async fn discover_resource_type(
        &self,
        resource_type: &ResourceType,
        _region: Option<&str>,
        _options: DiscoveryOptions,
    ) -> Result<Vec<DiscoveredResource>, DiscoveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !resource_type.is_supported() {
            return Err(DiscoveryError::UnsupportedResourceType(resource_type.clone()));
        }
        if self.failing.lock().as_ref() == Some(resource_type) {
            return Err(ProviderError::new("ThrottlingException", "rate exceeded").into());
        }
        Ok(self
            .resources
            .lock()
            .iter()
            .filter(|r| r.resource_type() == resource_type)
            .cloned()
            .collect())
    }
}

/// Intervention answering from a script
///
/// Physical ids come from a per-logical-id map (missing entries skip);
/// generic prompts pop queued answers, falling back to the prompt's default.
#[derive(Debug)]
pub struct ScriptedIntervention {
    physical_ids: Mutex<BTreeMap<String, String>>,
    answers: Mutex<VecDeque<String>>,
    critical: CriticalDecision,
    drift: DriftDecision,
    prompts: Mutex<Vec<InterventionPrompt>>,
}

impl Default for ScriptedIntervention {
    fn default() -> Self {
        Self {
            physical_ids: Mutex::new(BTreeMap::new()),
            answers: Mutex::new(VecDeque::new()),
            critical: CriticalDecision::Proceed,
            drift: DriftDecision::UseCurrent,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedIntervention {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer physical-id prompts for `logical_id` with `physical_id`
    pub fn with_physical_id(self, logical_id: &str, physical_id: &str) -> Self {
        self.physical_ids
            .lock()
            .insert(logical_id.to_string(), physical_id.to_string());
        self
    }

    /// Queue an answer for the next generic prompt
    pub fn with_answer(self, value: &str) -> Self {
        self.answers.lock().push_back(value.to_string());
        self
    }

    pub fn with_critical_decision(mut self, decision: CriticalDecision) -> Self {
        self.critical = decision;
        self
    }

    pub fn with_drift_decision(mut self, decision: DriftDecision) -> Self {
        self.drift = decision;
        self
    }

    /// Generic prompts seen so far
    pub fn prompts(&self) -> Vec<InterventionPrompt> {
        self.prompts.lock().clone()
    }
}

#[async_trait::async_trait]
impl InterventionPort for ScriptedIntervention {
    async fn prompt_for_physical_id(
        &self,
        logical_id: &str,
        _resource_type: &ResourceType,
        _candidates: &[MatchCandidate],
    ) -> Result<String, InterventionError> {
        self.physical_ids
            .lock()
            .get(logical_id)
            .cloned()
            .ok_or_else(|| InterventionError::skipped(logical_id))
    }

    async fn confirm_critical_difference(
        &self,
        _resource_id: &str,
        _differences: &[PropertyDifference],
    ) -> Result<CriticalDecision, InterventionError> {
        Ok(self.critical)
    }

    async fn resolve_drift(
        &self,
        _resource_id: &str,
        _drift: &DriftReport,
    ) -> Result<DriftDecision, InterventionError> {
        Ok(self.drift)
    }

    async fn prompt(
        &self,
        prompt: &InterventionPrompt,
    ) -> Result<InterventionResponse, InterventionError> {
        self.prompts.lock().push(prompt.clone());
        let value = self
            .answers
            .lock()
            .pop_front()
            .or_else(|| prompt.automatic_choice().map(str::to_string))
            .ok_or_else(|| InterventionError::skipped(prompt.message.clone()))?;
        Ok(InterventionResponse::select(prompt, value))
    }
}

/// Ordered `execute:<step>` / `rollback:<step>` events shared by
/// [`RecordingStep`]s
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// How a [`RecordingStep`] behaves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Behavior {
    #[default]
    Succeed,
    FailExecution,
    FailValidation,
    FailRollback,
    Pause,
    Abort,
}

/// Step executor that records what it was asked to do
#[derive(Debug)]
pub struct RecordingStep {
    step: MigrationStep,
    events: EventLog,
    behavior: Behavior,
}

impl RecordingStep {
    pub fn new(step: MigrationStep, events: EventLog) -> Self {
        Self {
            step,
            events,
            behavior: Behavior::Succeed,
        }
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// One succeeding executor per step, except those in `overrides`
    pub fn all(events: &EventLog, overrides: &[(MigrationStep, Behavior)]) -> Vec<Arc<dyn StepExecutor>> {
        MigrationStep::ALL
            .iter()
            .map(|step| {
                let behavior = overrides
                    .iter()
                    .find(|(s, _)| s == step)
                    .map(|(_, b)| *b)
                    .unwrap_or_default();
                Arc::new(Self::new(*step, events.clone()).with_behavior(behavior))
                    as Arc<dyn StepExecutor>
            })
            .collect()
    }

    fn record(&self, event: &str) {
        self.events.lock().push(format!("{event}:{}", self.step));
    }
}

#[async_trait::async_trait]
impl StepExecutor for RecordingStep {
    fn step(&self) -> MigrationStep {
        self.step
    }

    async fn execute_step(
        &self,
        _state: &MigrationState,
        _ctx: &StepContext,
    ) -> Result<Value, MigrationError> {
        self.record("execute");
        match self.behavior {
            Behavior::FailExecution => Err(MigrationError::StepFailed {
                step: self.step,
                reason: "scripted failure".to_string(),
            }),
            Behavior::Pause => Err(MigrationError::Paused("scripted pause".to_string())),
            Behavior::Abort => Err(MigrationError::Aborted("scripted abort".to_string())),
            _ => Ok(json!({ "step": self.step.as_str() })),
        }
    }

    fn run_validation_checks(
        &self,
        _state: &MigrationState,
        _data: &Value,
    ) -> Vec<stackshift_core::ValidationCheck> {
        let passed = self.behavior != Behavior::FailValidation;
        vec![
            stackshift_core::ValidationCheck::error("scripted", passed, "scripted check"),
            stackshift_core::ValidationCheck::warning("advisory", false, "never blocks"),
        ]
    }

    async fn execute_rollback(
        &self,
        _state: &MigrationState,
        _ctx: &StepContext,
    ) -> Result<(), MigrationError> {
        self.record("rollback");
        if self.behavior == Behavior::FailRollback {
            return Err(MigrationError::StepFailed {
                step: self.step,
                reason: "scripted rollback failure".to_string(),
            });
        }
        Ok(())
    }
}

/// Temporary directory holding [`sample_template`]
pub fn template_dir() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample_template(dir.path());
    (dir, path)
}
