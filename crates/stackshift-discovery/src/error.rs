//! Error types for discovery

use stackshift_model::ResourceType;
use std::path::PathBuf;

/// Error reported by the underlying cloud provider
///
/// Carried through discovery unchanged so callers see the provider's own
/// code and message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("provider error {code}: {message}")]
pub struct ProviderError {
    /// Provider error code, e.g. `AccessDenied`
    pub code: String,
    /// Provider message
    pub message: String,
}

impl ProviderError {
    /// Create provider error
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Errors during resource discovery
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// Type outside the supported set; caller error, never retried
    #[error("unsupported resource type: {0}")]
    UnsupportedResourceType(ResourceType),

    /// Provider failure for a supported type
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Discovery context was disposed
    #[error("discovery context has been disposed")]
    Disposed,

    /// Inventory snapshot could not be loaded
    #[error("failed to load inventory {path}: {reason}")]
    Inventory {
        /// Snapshot path
        path: PathBuf,
        /// What went wrong
        reason: String,
    },
}

impl DiscoveryError {
    /// Whether a retry could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}
