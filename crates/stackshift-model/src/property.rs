//! Template property values
//!
//! Template property bags mix plain JSON with intrinsic-function objects.
//! [`PropertyValue`] is a closed union over the forms the migration cares
//! about, so callers match exhaustively instead of probing for keys.
//! Intrinsics outside this set (`Fn::If`, `Fn::ImportValue`, ...) are kept
//! verbatim as literals and never resolve to a static name.

use crate::error::ModelError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Property bag of a template resource, keyed by property name
pub type TemplateProperties = BTreeMap<String, PropertyValue>;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid"));

/// One template property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PropertyValue {
    /// Plain JSON value
    Literal { value: Value },
    /// `{"Ref": "LogicalId"}`
    Reference { logical_id: String },
    /// `{"Fn::GetAtt": ["LogicalId", "Attribute"]}`
    Attribute {
        logical_id: String,
        attribute: String,
    },
    /// `{"Fn::Join": ["-", [..]]}`
    Join {
        delimiter: String,
        parts: Vec<PropertyValue>,
    },
    /// `{"Fn::Sub": "..."}` or `{"Fn::Sub": ["...", {..}]}`
    Substitution {
        template: String,
        variables: BTreeMap<String, PropertyValue>,
    },
    /// `{"Fn::Select": [0, [..]]}`
    Select {
        index: usize,
        options: Vec<PropertyValue>,
    },
}

impl PropertyValue {
    /// Literal string value
    #[inline]
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal {
            value: Value::String(value.into()),
        }
    }

    /// Literal JSON value
    #[inline]
    #[must_use]
    pub fn literal(value: Value) -> Self {
        Self::Literal { value }
    }

    /// Parse a JSON template value
    ///
    /// # Errors
    /// `ModelError::InvalidIntrinsic` when a recognised intrinsic has the wrong shape.
    pub fn from_json(value: &Value) -> Result<Self, ModelError> {
        let Value::Object(map) = value else {
            return Ok(Self::literal(value.clone()));
        };
        if map.len() != 1 {
            return Ok(Self::literal(value.clone()));
        }
        let Some((key, arg)) = map.iter().next() else {
            return Ok(Self::literal(value.clone()));
        };

        match key.as_str() {
            "Ref" => parse_ref(arg),
            "Fn::GetAtt" => parse_get_att(arg),
            "Fn::Join" => parse_join(arg),
            "Fn::Sub" => parse_sub(arg),
            "Fn::Select" => parse_select(arg),
            _ => Ok(Self::literal(value.clone())),
        }
    }

    /// Resolve to a string without any live lookups
    ///
    /// Literals resolve to themselves, joins and substitutions resolve when
    /// every piece does, selects resolve their chosen option. References and
    /// attributes never resolve.
    #[must_use]
    pub fn resolve_static(&self) -> Option<String> {
        match self {
            Self::Literal { value } => match value {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            },
            Self::Reference { .. } | Self::Attribute { .. } => None,
            Self::Join { delimiter, parts } => parts
                .iter()
                .map(PropertyValue::resolve_static)
                .collect::<Option<Vec<_>>>()
                .map(|resolved| resolved.join(delimiter)),
            Self::Substitution {
                template,
                variables,
            } => substitute(template, variables),
            Self::Select { index, options } => {
                options.get(*index).and_then(PropertyValue::resolve_static)
            }
        }
    }

    /// Literal JSON payload, if this is a literal
    #[inline]
    #[must_use]
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Self::Literal { value } => Some(value),
            _ => None,
        }
    }

    /// Logical ids this value depends on
    #[must_use]
    pub fn referenced_logical_ids(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out.sort();
        out.dedup();
        out
    }

    fn collect_references(&self, out: &mut Vec<String>) {
        match self {
            Self::Literal { .. } => {}
            Self::Reference { logical_id } | Self::Attribute { logical_id, .. } => {
                if !logical_id.starts_with("AWS::") {
                    out.push(logical_id.clone());
                }
            }
            Self::Join { parts, .. } => parts.iter().for_each(|p| p.collect_references(out)),
            Self::Substitution {
                template,
                variables,
            } => {
                for caps in PLACEHOLDER.captures_iter(template) {
                    let name = &caps[1];
                    if name.starts_with('!') || name.starts_with("AWS::") {
                        continue;
                    }
                    if variables.contains_key(name) {
                        continue;
                    }
                    let logical_id = name.split('.').next().unwrap_or(name);
                    out.push(logical_id.to_string());
                }
                variables.values().for_each(|v| v.collect_references(out));
            }
            Self::Select { options, .. } => {
                options.iter().for_each(|p| p.collect_references(out));
            }
        }
    }
}

/// Parse a raw JSON property object into a property bag
///
/// # Errors
/// Propagates intrinsic shape errors, naming the offending property.
pub fn parse_properties(raw: &Map<String, Value>) -> Result<TemplateProperties, ModelError> {
    raw.iter()
        .map(|(name, value)| {
            PropertyValue::from_json(value)
                .map(|parsed| (name.clone(), parsed))
                .map_err(|e| match e {
                    ModelError::InvalidIntrinsic { function, reason } => {
                        ModelError::invalid_intrinsic(function, format!("{name}: {reason}"))
                    }
                    other => other,
                })
        })
        .collect()
}

/// Extract literal `Tags` (`[{Key, Value}]`) from a property bag
///
/// Entries whose value is not a static string are skipped.
#[must_use]
pub fn template_tags(properties: &TemplateProperties) -> BTreeMap<String, String> {
    let Some(Value::Array(entries)) = properties.get("Tags").and_then(PropertyValue::as_literal)
    else {
        return BTreeMap::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let key = entry.get("Key")?.as_str()?;
            let value = entry.get("Value")?.as_str()?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

fn parse_ref(arg: &Value) -> Result<PropertyValue, ModelError> {
    let logical_id = arg
        .as_str()
        .ok_or_else(|| ModelError::invalid_intrinsic("Ref", "expected string"))?;
    Ok(PropertyValue::Reference {
        logical_id: logical_id.to_string(),
    })
}

fn parse_get_att(arg: &Value) -> Result<PropertyValue, ModelError> {
    let (logical_id, attribute) = match arg {
        Value::Array(items) if items.len() == 2 => match (items[0].as_str(), items[1].as_str()) {
            (Some(id), Some(attr)) => (id.to_string(), attr.to_string()),
            _ => {
                return Err(ModelError::invalid_intrinsic(
                    "Fn::GetAtt",
                    "expected two strings",
                ))
            }
        },
        Value::String(dotted) => match dotted.split_once('.') {
            Some((id, attr)) => (id.to_string(), attr.to_string()),
            None => {
                return Err(ModelError::invalid_intrinsic(
                    "Fn::GetAtt",
                    "expected LogicalId.Attribute",
                ))
            }
        },
        _ => {
            return Err(ModelError::invalid_intrinsic(
                "Fn::GetAtt",
                "expected array or dotted string",
            ))
        }
    };
    Ok(PropertyValue::Attribute {
        logical_id,
        attribute,
    })
}

fn parse_join(arg: &Value) -> Result<PropertyValue, ModelError> {
    let Value::Array(items) = arg else {
        return Err(ModelError::invalid_intrinsic("Fn::Join", "expected array"));
    };
    let [delimiter, parts] = items.as_slice() else {
        return Err(ModelError::invalid_intrinsic(
            "Fn::Join",
            "expected [delimiter, parts]",
        ));
    };
    let delimiter = delimiter
        .as_str()
        .ok_or_else(|| ModelError::invalid_intrinsic("Fn::Join", "delimiter must be a string"))?;
    let Value::Array(parts) = parts else {
        return Err(ModelError::invalid_intrinsic(
            "Fn::Join",
            "parts must be an array",
        ));
    };
    Ok(PropertyValue::Join {
        delimiter: delimiter.to_string(),
        parts: parts
            .iter()
            .map(PropertyValue::from_json)
            .collect::<Result<_, _>>()?,
    })
}

fn parse_sub(arg: &Value) -> Result<PropertyValue, ModelError> {
    match arg {
        Value::String(template) => Ok(PropertyValue::Substitution {
            template: template.clone(),
            variables: BTreeMap::new(),
        }),
        Value::Array(items) => {
            let [template, variables] = items.as_slice() else {
                return Err(ModelError::invalid_intrinsic(
                    "Fn::Sub",
                    "expected [template, variables]",
                ));
            };
            let template = template
                .as_str()
                .ok_or_else(|| ModelError::invalid_intrinsic("Fn::Sub", "template must be a string"))?;
            let Value::Object(variables) = variables else {
                return Err(ModelError::invalid_intrinsic(
                    "Fn::Sub",
                    "variables must be an object",
                ));
            };
            Ok(PropertyValue::Substitution {
                template: template.to_string(),
                variables: parse_properties(variables)?,
            })
        }
        _ => Err(ModelError::invalid_intrinsic(
            "Fn::Sub",
            "expected string or array",
        )),
    }
}

fn parse_select(arg: &Value) -> Result<PropertyValue, ModelError> {
    let Value::Array(items) = arg else {
        return Err(ModelError::invalid_intrinsic("Fn::Select", "expected array"));
    };
    let [index, list] = items.as_slice() else {
        return Err(ModelError::invalid_intrinsic(
            "Fn::Select",
            "expected [index, list]",
        ));
    };
    let index = match index {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse::<u64>().ok(),
        _ => None,
    }
    .and_then(|i| usize::try_from(i).ok())
    .ok_or_else(|| ModelError::invalid_intrinsic("Fn::Select", "index must be a non-negative integer"))?;

    match list {
        Value::Array(options) => Ok(PropertyValue::Select {
            index,
            options: options
                .iter()
                .map(PropertyValue::from_json)
                .collect::<Result<_, _>>()?,
        }),
        // Fn::Select over Fn::GetAZs / Fn::Split has no static options
        other => Ok(PropertyValue::literal(serde_json::json!({
            "Fn::Select": [index, other]
        }))),
    }
}

fn substitute(template: &str, variables: &BTreeMap<String, PropertyValue>) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let whole = caps.get(0)?;
        let name = &caps[1];
        out.push_str(&template[last..whole.start()]);
        if let Some(escaped) = name.strip_prefix('!') {
            out.push_str("${");
            out.push_str(escaped);
            out.push('}');
        } else {
            out.push_str(&variables.get(name)?.resolve_static()?);
        }
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Some(out)
}
