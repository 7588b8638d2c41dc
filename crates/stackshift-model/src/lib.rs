//! stackshift Model
//!
//! Shared data types for stateful infrastructure migration.
//!
//! # Core Concepts
//!
//! - [`ResourceType`]: Provider resource type with its static rule table
//!   (physical-name property, configuration property, statefulness)
//! - [`DiscoveredResource`]: Immutable snapshot of a live resource
//! - [`PropertyValue`]: Closed union over template intrinsic forms
//! - [`Template`]: Parsed `Resources` section of a source template
//! - [`ClassifiedResource`]: Template entry tagged stateful / needs-import
//! - [`PropertyDifference`] and [`DriftReport`]: comparison output
//!
//! # Example
//!
//! ```rust,ignore
//! use stackshift_model::{Template, classify_template};
//!
//! let template = Template::from_json_str(source)?;
//! for resource in classify_template(&template) {
//!     if resource.requires_resolution() {
//!         println!("{} must be imported", resource.logical_id);
//!     }
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod classified;
mod diff;
mod error;
mod property;
mod resource;
mod resource_type;
mod template;

pub use classified::{classify, classify_template, ClassifiedResource};
pub use diff::{values_equivalent, DifferenceSeverity, DriftReport, DriftStatus, PropertyDifference};
pub use error::ModelError;
pub use property::{parse_properties, template_tags, PropertyValue, TemplateProperties};
pub use resource::{DiscoveredResource, DiscoveredResourceBuilder, TAGS_UNAVAILABLE};
pub use resource_type::{ResourceType, TypeRules};
pub use template::{DeletionPolicy, Template, TemplateResource};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
