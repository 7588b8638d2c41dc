//! Resolution strategies, tried in order until one yields a physical id
//!
//! 1. `explicit`: the template names the resource statically
//! 2. `auto-discovery`: discovery plus matching finds a confident candidate
//! 3. `human-intervention`: an operator picks among ranked candidates

use crate::intervention::InterventionError;
use crate::resolver::{PhysicalIdResolver, Resolution, ResolutionRequest};
use serde::Serialize;
use stackshift_discovery::DiscoveryError;
use std::fmt::{self, Display, Formatter};

/// One step of the resolution cascade
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolutionStrategy {
    /// Statically resolvable physical-name property
    Explicit,
    /// Discovery and matching, accepted above `threshold`
    AutoDiscovery {
        /// Minimum best-match confidence
        threshold: f64,
    },
    /// Operator choice
    HumanIntervention,
}

impl ResolutionStrategy {
    /// Stable strategy name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::AutoDiscovery { .. } => "auto-discovery",
            Self::HumanIntervention => "human-intervention",
        }
    }

    /// Confidence the strategy declares for its answers
    #[inline]
    #[must_use]
    pub fn confidence(&self) -> f64 {
        match self {
            Self::Explicit | Self::HumanIntervention => 1.0,
            Self::AutoDiscovery { threshold } => *threshold,
        }
    }

    /// Run this strategy for one request
    pub(crate) async fn execute(
        &self,
        resolver: &PhysicalIdResolver,
        request: &ResolutionRequest,
    ) -> Result<Resolution, StrategyError> {
        match self {
            Self::Explicit => {
                let property = request
                    .resource_type
                    .physical_name_property()
                    .ok_or(StrategyError::NoExplicitName)?;
                let value = request
                    .properties
                    .get(property)
                    .ok_or(StrategyError::NoExplicitName)?;
                let physical_id = value.resolve_static().ok_or(StrategyError::NotStatic {
                    property: property.to_string(),
                })?;
                Ok(Resolution::new(request, physical_id, self.name(), self.confidence()))
            }
            Self::AutoDiscovery { threshold } => {
                let result = resolver.discover_and_match(request).await?;
                match result.best_match {
                    Some(best) if best.confidence >= *threshold => Ok(Resolution::new(
                        request,
                        best.physical_id,
                        self.name(),
                        best.confidence,
                    )),
                    _ => Err(StrategyError::NoConfidentMatch {
                        best: result.matches.first().map(|m| m.confidence),
                        threshold: *threshold,
                    }),
                }
            }
            Self::HumanIntervention => {
                let port = resolver
                    .intervention
                    .as_ref()
                    .ok_or(StrategyError::NoOperator)?;
                let result = resolver.discover_and_match(request).await?;
                let physical_id = port
                    .prompt_for_physical_id(
                        &request.logical_id,
                        &request.resource_type,
                        &result.matches,
                    )
                    .await?;
                if physical_id.trim().is_empty() {
                    return Err(InterventionError::InvalidResponse(
                        "empty physical id".to_string(),
                    )
                    .into());
                }
                Ok(Resolution::new(request, physical_id, self.name(), self.confidence()))
            }
        }
    }
}

/// Why a single strategy produced no answer
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("template has no physical name")]
    NoExplicitName,

    #[error("{property} is not statically resolvable")]
    NotStatic { property: String },

    #[error("no candidate reached {threshold:.2} (best {})", best.map_or_else(|| "none".to_string(), |b| format!("{b:.2}")))]
    NoConfidentMatch { best: Option<f64>, threshold: f64 },

    #[error("no intervention adapter configured")]
    NoOperator,

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Intervention(#[from] InterventionError),
}

/// Record of a failed strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyFailure {
    pub strategy: &'static str,
    pub reason: String,
    /// Failure was an operator skip or abort
    pub cancelled: bool,
}

impl StrategyFailure {
    /// Create failure record
    #[must_use]
    pub fn new(strategy: &'static str, reason: impl Into<String>) -> Self {
        Self {
            strategy,
            reason: reason.into(),
            cancelled: false,
        }
    }

    pub(crate) fn from_error(strategy: &'static str, error: &StrategyError) -> Self {
        Self {
            strategy,
            reason: error.to_string(),
            cancelled: matches!(error, StrategyError::Intervention(e) if e.is_cancellation()),
        }
    }
}

impl Display for StrategyFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.reason)
    }
}
