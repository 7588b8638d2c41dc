//! Classification of template resources
//!
//! A resource is stateful when its type is stateful in the rule table or when
//! the template retains it on deletion. Stateful resources are imported into
//! the target stack rather than recreated.

use crate::property::TemplateProperties;
use crate::resource_type::ResourceType;
use crate::template::{Template, TemplateResource};
use serde::{Deserialize, Serialize};

/// Template resource tagged with migration handling flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedResource {
    pub logical_id: String,
    pub resource_type: ResourceType,
    pub properties: TemplateProperties,
    pub is_stateful: bool,
    pub needs_import: bool,
}

impl ClassifiedResource {
    /// Whether a physical id must be resolved for this resource
    #[inline]
    #[must_use]
    pub fn requires_resolution(&self) -> bool {
        self.needs_import
    }
}

/// Classify a single template resource
#[must_use]
pub fn classify(resource: &TemplateResource) -> ClassifiedResource {
    let retained = resource
        .deletion_policy
        .is_some_and(|p| p.preserves_resource());
    let is_stateful = resource.resource_type.is_stateful() || retained;

    ClassifiedResource {
        logical_id: resource.logical_id.clone(),
        resource_type: resource.resource_type.clone(),
        properties: resource.properties.clone(),
        is_stateful,
        // Unsupported types cannot be discovered, so they cannot be imported
        needs_import: is_stateful && resource.resource_type.is_supported(),
    }
}

/// Classify every resource in a template, in document order
#[must_use]
pub fn classify_template(template: &Template) -> Vec<ClassifiedResource> {
    template.resources().map(classify).collect()
}
