//! stackshift Resolve
//!
//! Maps template logical ids to live physical ids.
//!
//! # Architecture
//!
//! ```text
//! ResolutionRequest → PhysicalIdResolver
//!                       ├─ explicit          (template physical name)
//!                       ├─ auto-discovery    (DiscoveryPort + ResourceMatcher)
//!                       └─ human-intervention (InterventionPort)
//! ```
//!
//! Strategies run in order; the first answer wins. When all fail the error
//! lists every strategy's reason.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod intervention;
pub mod matcher;
pub mod similarity;
pub mod strategy;
pub mod resolver;

pub use error::ResolveError;
pub use intervention::{
    AutomatedIntervention, CriticalDecision, DriftDecision, InterventionError, InterventionPort,
    InterventionPrompt, InterventionResponse, PromptKind, PromptOption, ResponseAction,
};
pub use matcher::{MatchCandidate, MatchResult, MatcherConfig, ResourceMatcher};
pub use resolver::{PhysicalIdResolver, Resolution, ResolutionRequest, ResolverConfig};
pub use strategy::{ResolutionStrategy, StrategyFailure};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for resolution
    pub use crate::error::ResolveError;
    pub use crate::intervention::{
        AutomatedIntervention, CriticalDecision, DriftDecision, InterventionError,
        InterventionPort,
    };
    pub use crate::matcher::{MatcherConfig, ResourceMatcher};
    pub use crate::resolver::{PhysicalIdResolver, Resolution, ResolutionRequest, ResolverConfig};
    pub use std::sync::Arc;
}
