//! stackshift Discovery
//!
//! Boundary between the cloud provider and the resolution engine.
//!
//! # Architecture
//!
//! ```text
//! ResourceProvider (cloud API) → DiscoveryContext → DiscoveryPort → resolver / steps
//!                                      ↑_______↓
//!                     moka cache keyed by (resource_type, region), TTL
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use stackshift_discovery::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = StaticResourceProvider::load("inventory.json").await?;
//! let discovery = DiscoveryContext::new(Arc::new(provider), DiscoveryConfig::new("us-east-1"));
//!
//! let tables = discovery
//!     .discover_resource_type(&ResourceType::dynamodb_table(), None, DiscoveryOptions::default())
//!     .await?;
//! discovery.dispose();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod context;
pub mod error;
pub mod port;
pub mod provider;

pub use context::{DiscoveryConfig, DiscoveryContext};
pub use error::{DiscoveryError, ProviderError};
pub use port::{DiscoveryOptions, DiscoveryPort};
pub use provider::{ResourceProvider, StaticResourceProvider};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with discovery
    pub use crate::context::{DiscoveryConfig, DiscoveryContext};
    pub use crate::error::{DiscoveryError, ProviderError};
    pub use crate::port::{DiscoveryOptions, DiscoveryPort};
    pub use crate::provider::{ResourceProvider, StaticResourceProvider};
    pub use stackshift_model::{DiscoveredResource, ResourceType};
    pub use std::sync::Arc;
}
