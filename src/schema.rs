//! Generic JSON-schema surface for tool parameters, plus a validator and a
//! total DSL→schema converter.
//!
//! [`ToolSchema`] is the crate's own schema shape — deliberately simpler
//! than full JSON Schema — that every `Tool` declares and every provider
//! adapter translates into its vendor's function-calling format. The
//! [`Validator`] checks a parsed argument object against a `ToolSchema`
//! before a tool is invoked; the [`SchemaSource`] trait lets integrators
//! hand in a richer DSL (a Zod-like builder, a derive macro output, …) and
//! have it converted into the same generic shape without this crate
//! depending on that DSL.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The declared parameter/result shape of a [`crate::tool::Tool`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: ObjectSchema,
}

/// An object-typed schema: `{ type: "object", properties: {...}, required: [...] }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ObjectSchema {
    pub properties: HashMap<String, ParameterSchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ObjectSchema {
    pub fn empty() -> Self {
        ObjectSchema {
            properties: HashMap::new(),
            required: Vec::new(),
        }
    }
}

/// The declared type and constraints of a single tool parameter.
///
/// One variant per JSON Schema primitive this crate validates against
/// (`string|number|integer|boolean|array|object`) plus the shared optional
/// fields every variant may carry (`description`, `enum`, `default`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParameterSchema {
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        r#enum: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<serde_json::Value>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<serde_json::Value>,
    },
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<serde_json::Value>,
    },
    Boolean {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<serde_json::Value>,
    },
    Array {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        items: Box<ParameterSchema>,
    },
    Object {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default)]
        properties: HashMap<String, ParameterSchema>,
        #[serde(default)]
        required: Vec<String>,
    },
}

impl ParameterSchema {
    pub fn description(&self) -> Option<&str> {
        match self {
            ParameterSchema::String { description, .. }
            | ParameterSchema::Number { description, .. }
            | ParameterSchema::Integer { description, .. }
            | ParameterSchema::Boolean { description, .. }
            | ParameterSchema::Array { description, .. }
            | ParameterSchema::Object { description, .. } => description.as_deref(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ParameterSchema::String { .. } => "string",
            ParameterSchema::Number { .. } => "number",
            ParameterSchema::Integer { .. } => "integer",
            ParameterSchema::Boolean { .. } => "boolean",
            ParameterSchema::Array { .. } => "array",
            ParameterSchema::Object { .. } => "object",
        }
    }

    fn matches_json_type(&self, value: &serde_json::Value) -> bool {
        match self {
            ParameterSchema::String { .. } => value.is_string(),
            ParameterSchema::Number { .. } => value.is_number(),
            ParameterSchema::Integer { .. } => value.is_i64() || value.is_u64(),
            ParameterSchema::Boolean { .. } => value.is_boolean(),
            ParameterSchema::Array { .. } => value.is_array(),
            ParameterSchema::Object { .. } => value.is_object(),
        }
    }
}

/// A single validation failure, carrying the field path it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// The result of validating a parsed argument object against a [`ToolSchema`].
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub errors: Vec<ValidationError>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validates JSON argument objects against [`ObjectSchema`]/[`ParameterSchema`].
///
/// Strict mode (the default, per spec §4.4) rejects unknown keys; non-strict
/// mode ignores them. The validator never panics on malformed input — it
/// only ever returns structured [`ValidationError`]s.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    strict: bool,
}

impl Default for Validator {
    fn default() -> Self {
        Validator { strict: true }
    }
}

impl Validator {
    pub fn new(strict: bool) -> Self {
        Validator { strict }
    }

    /// Validate a parsed JSON object against a tool's declared parameter schema.
    pub fn validate(&self, schema: &ObjectSchema, params: &serde_json::Value) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();
        let Some(obj) = params.as_object() else {
            outcome.errors.push(ValidationError {
                path: "$".to_string(),
                message: "expected a JSON object".to_string(),
            });
            return outcome;
        };

        for required_key in &schema.required {
            if !obj.contains_key(required_key) {
                outcome.errors.push(ValidationError {
                    path: required_key.clone(),
                    message: "required property missing".to_string(),
                });
            }
        }

        for (key, value) in obj {
            match schema.properties.get(key) {
                Some(prop_schema) => {
                    self.validate_value(key, prop_schema, value, &mut outcome);
                }
                None if self.strict => {
                    outcome.errors.push(ValidationError {
                        path: key.clone(),
                        message: "unknown property".to_string(),
                    });
                }
                None => {}
            }
        }

        outcome
    }

    fn validate_value(
        &self,
        path: &str,
        schema: &ParameterSchema,
        value: &serde_json::Value,
        outcome: &mut ValidationOutcome,
    ) {
        if !schema.matches_json_type(value) {
            outcome.errors.push(ValidationError {
                path: path.to_string(),
                message: format!("expected type {}", schema.type_name()),
            });
            return;
        }

        match schema {
            ParameterSchema::String { r#enum: Some(allowed), .. } => {
                if let Some(s) = value.as_str() {
                    if !allowed.iter().any(|a| a == s) {
                        outcome.errors.push(ValidationError {
                            path: path.to_string(),
                            message: format!("value not in enum {:?}", allowed),
                        });
                    }
                }
            }
            ParameterSchema::Number { minimum, maximum, .. }
            | ParameterSchema::Integer { minimum, maximum, .. } => {
                if let Some(n) = value.as_f64() {
                    if let Some(min) = minimum {
                        if n < *min {
                            outcome.errors.push(ValidationError {
                                path: path.to_string(),
                                message: format!("value below minimum {}", min),
                            });
                        }
                    }
                    if let Some(max) = maximum {
                        if n > *max {
                            outcome.errors.push(ValidationError {
                                path: path.to_string(),
                                message: format!("value above maximum {}", max),
                            });
                        }
                    }
                }
            }
            ParameterSchema::Array { items, .. } => {
                if let Some(arr) = value.as_array() {
                    for (i, item) in arr.iter().enumerate() {
                        self.validate_value(&format!("{}[{}]", path, i), items, item, outcome);
                    }
                }
            }
            ParameterSchema::Object { properties, required, .. } => {
                if let Some(nested) = value.as_object() {
                    for required_key in required {
                        if !nested.contains_key(required_key) {
                            outcome.errors.push(ValidationError {
                                path: format!("{}.{}", path, required_key),
                                message: "required property missing".to_string(),
                            });
                        }
                    }
                    for (key, val) in nested {
                        if let Some(prop_schema) = properties.get(key) {
                            self.validate_value(&format!("{}.{}", path, key), prop_schema, val, outcome);
                        } else if self.strict {
                            outcome.errors.push(ValidationError {
                                path: format!("{}.{}", path, key),
                                message: "unknown property".to_string(),
                            });
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// A richer, caller-defined schema node that can be converted into the
/// crate's generic [`ParameterSchema`]. Implement this over your own DSL
/// (a Zod-like builder, a derive-macro output, …) to register tools without
/// this crate depending on that DSL directly.
///
/// The conversion is total per spec §4.4/§9: it never panics or returns an
/// error, falling back to `string` (preserving any description it can find)
/// when a node is unrecognized.
pub trait SchemaSource {
    /// Convert this node into the crate's generic parameter schema.
    fn to_parameter_schema(&self) -> ParameterSchema;
}

/// Converts a DSL-shaped root node into a full [`ToolSchema`]'s parameters.
///
/// `shape` is the DSL's object-like field map (the Zod-style `shape()`
/// call); each entry's `SchemaSource::to_parameter_schema` is used verbatim,
/// and a field is marked required unless the DSL node reports itself as
/// `optional`/`nullable`/carrying a `default` (tracked by the caller via
/// `optional_fields`, since "optional" is a DSL-specific wrapper this crate
/// does not model directly).
pub fn convert_object_shape<S: SchemaSource>(
    shape: &HashMap<String, S>,
    optional_fields: &[&str],
) -> ObjectSchema {
    let mut properties = HashMap::new();
    let mut required = Vec::new();

    for (name, node) in shape {
        properties.insert(name.clone(), node.to_parameter_schema());
        if !optional_fields.contains(&name.as_str()) {
            required.push(name.clone());
        }
    }
    required.sort();

    ObjectSchema { properties, required }
}

/// Fallback used by [`SchemaSource`] implementations for a DSL node type
/// they don't recognize: always `string`, preserving whatever description
/// text is available. Never fails.
pub fn unrecognized_node_fallback(description: Option<String>) -> ParameterSchema {
    ParameterSchema::String {
        description,
        r#enum: None,
        pattern: None,
        format: None,
        default: None,
    }
}
