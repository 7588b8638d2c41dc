//! stackshift Core
//!
//! Resumable, rollback-capable migration of stateful resources between
//! infrastructure stacks.
//!
//! # Architecture
//!
//! ```text
//! MigrationConfig → MigrationOrchestrator ──→ StepExecutor × 9 (steps::*)
//!                        │    │                   │
//!                        │    │                   ├─ PhysicalIdResolver (resolve)
//!                        │    │                   ├─ DiscoveryPort      (discovery)
//!                        │    │                   └─ CheckpointManager → AuditingIntervention → AuditLog
//!                        │    └─ state_machine (pure ordering rules)
//!                        └─ StateStore (persisted after every step boundary)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use stackshift_core::prelude::*;
//!
//! # async fn example(discovery: Arc<dyn DiscoveryPort>) -> Result<(), MigrationError> {
//! let orchestrator = MigrationOrchestrator::new(
//!     Arc::new(FileStateStore::new(".stackshift")),
//!     Arc::new(FileAuditLog::new(".stackshift")),
//!     discovery,
//!     Arc::new(AutomatedIntervention),
//! )
//! .with_default_steps();
//!
//! let config = MigrationConfig::new("template.json").with_interaction(InteractionMode::DryRun);
//! let state = orchestrator.start(config).await?;
//! println!("{} is {}", state.id, state.status);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod audit;
pub mod checkpoint;
pub mod comparison;
pub mod config;
pub mod drift;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod polling;
pub mod state;
pub mod state_machine;
pub mod step;
pub mod steps;
pub mod store;

pub use audit::{AuditContext, AuditEntry, AuditLog, AuditRecord, FileAuditLog, MemoryAuditLog};
pub use checkpoint::{AuditingIntervention, CheckpointManager, CheckpointOutcome};
pub use comparison::{compare_properties, correlate_drift, score_confidence, CorrelatedDifference};
pub use config::{CommandSpec, InteractionMode, MigrationConfig};
pub use drift::{DriftDetector, InventoryDriftDetector};
pub use error::{AuditError, MigrationError, StoreError};
pub use executor::{CheckSeverity, StepContext, StepExecutor, ValidationCheck};
pub use orchestrator::{MigrationOrchestrator, PauseHandle, StepOutcome};
pub use state::{MigrationState, StepResult};
pub use step::{MigrationStatus, MigrationStep, StepStatus};
pub use store::{FileStateStore, MemoryStateStore, StateStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running migrations
    pub use crate::audit::{AuditLog, FileAuditLog, MemoryAuditLog};
    pub use crate::config::{InteractionMode, MigrationConfig};
    pub use crate::error::MigrationError;
    pub use crate::orchestrator::{MigrationOrchestrator, PauseHandle};
    pub use crate::state::MigrationState;
    pub use crate::step::{MigrationStatus, MigrationStep};
    pub use crate::store::{FileStateStore, MemoryStateStore, StateStore};
    pub use stackshift_discovery::DiscoveryPort;
    pub use stackshift_resolve::{AutomatedIntervention, InterventionPort};
    pub use std::sync::Arc;
}
