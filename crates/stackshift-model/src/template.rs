//! Source template model
//!
//! Only the `Resources` section matters for migration. Resource order from
//! the source document is preserved.

use crate::error::ModelError;
use crate::property::{parse_properties, TemplateProperties};
use crate::resource_type::ResourceType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// `DeletionPolicy` attribute of a template resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
    RetainExceptOnCreate,
}

impl DeletionPolicy {
    /// Whether the live resource survives stack deletion
    #[inline]
    #[must_use]
    pub fn preserves_resource(self) -> bool {
        !matches!(self, Self::Delete)
    }
}

/// One entry in the template's `Resources` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResource {
    pub logical_id: String,
    pub resource_type: ResourceType,
    pub properties: TemplateProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl TemplateResource {
    /// Statically known physical name, if the template declares one
    #[must_use]
    pub fn explicit_physical_name(&self) -> Option<String> {
        let property = self.resource_type.physical_name_property()?;
        self.properties.get(property)?.resolve_static()
    }

    /// Logical ids referenced from properties plus explicit `DependsOn`
    #[must_use]
    pub fn dependencies(&self) -> BTreeSet<String> {
        self.properties
            .values()
            .flat_map(|v| v.referenced_logical_ids())
            .chain(self.depends_on.iter().cloned())
            .filter(|id| id != &self.logical_id)
            .collect()
    }
}

/// Parsed template
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Template {
    resources: IndexMap<String, TemplateResource>,
}

#[derive(Debug, Deserialize)]
struct RawTemplate {
    #[serde(rename = "Resources", default)]
    resources: IndexMap<String, RawResource>,
}

#[derive(Debug, Deserialize)]
struct RawResource {
    #[serde(rename = "Type")]
    resource_type: String,
    #[serde(rename = "Properties", default)]
    properties: Map<String, Value>,
    #[serde(rename = "DeletionPolicy", default)]
    deletion_policy: Option<DeletionPolicy>,
    #[serde(rename = "DependsOn", default)]
    depends_on: Option<Value>,
}

impl Template {
    /// Parse a template from JSON text
    ///
    /// # Errors
    /// JSON syntax errors, malformed intrinsics, or a malformed `DependsOn`.
    pub fn from_json_str(source: &str) -> Result<Self, ModelError> {
        let raw: RawTemplate = serde_json::from_str(source)?;
        Self::from_raw(raw)
    }

    /// Parse a template from a JSON value
    ///
    /// # Errors
    /// Same as [`Template::from_json_str`].
    pub fn from_value(value: Value) -> Result<Self, ModelError> {
        let raw: RawTemplate = serde_json::from_value(value)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawTemplate) -> Result<Self, ModelError> {
        let mut resources = IndexMap::with_capacity(raw.resources.len());
        for (logical_id, resource) in raw.resources {
            let depends_on = match resource.depends_on {
                None => Vec::new(),
                Some(Value::String(one)) => vec![one],
                Some(Value::Array(many)) => many
                    .into_iter()
                    .map(|v| match v {
                        Value::String(s) => Ok(s),
                        other => Err(ModelError::InvalidTemplate(format!(
                            "{logical_id}: DependsOn entry {other} is not a string"
                        ))),
                    })
                    .collect::<Result<_, _>>()?,
                Some(other) => {
                    return Err(ModelError::InvalidTemplate(format!(
                        "{logical_id}: DependsOn must be a string or array, got {other}"
                    )))
                }
            };

            let properties = parse_properties(&resource.properties).map_err(|e| {
                ModelError::InvalidTemplate(format!("{logical_id}: {e}"))
            })?;

            resources.insert(
                logical_id.clone(),
                TemplateResource {
                    logical_id,
                    resource_type: ResourceType::new(resource.resource_type),
                    properties,
                    deletion_policy: resource.deletion_policy,
                    depends_on,
                },
            );
        }
        Ok(Self { resources })
    }

    /// Resources in document order
    pub fn resources(&self) -> impl Iterator<Item = &TemplateResource> {
        self.resources.values()
    }

    /// Look up a resource by logical id
    #[inline]
    #[must_use]
    pub fn get(&self, logical_id: &str) -> Option<&TemplateResource> {
        self.resources.get(logical_id)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Distinct resource types used by the template
    #[must_use]
    pub fn resource_types(&self) -> BTreeSet<ResourceType> {
        self.resources
            .values()
            .map(|r| r.resource_type.clone())
            .collect()
    }
}
