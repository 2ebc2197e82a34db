//! Schema validation.
//!
//! Checks a configuration `serde_json::Value` against a [`Schema`]: presence
//! of required attributes, value types, nested block cardinality, and the
//! per-attribute [`Constraint`]s.
//!
//! # Example
//!
//! ```
//! use tekton_pipeline_provider::schema::{Attribute, Constraint, Schema};
//! use tekton_pipeline_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0().with_attribute(
//!     "type",
//!     Attribute::optional_string().with_constraint(Constraint::allowed(["TEXT", "SECURE"])),
//! );
//!
//! assert!(validate(&schema, &json!({"type": "SECURE"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"type": "PASSWORD"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("type".to_string()));
//! ```

use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Constraint, Diagnostic, NestedBlock, Schema,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

// Compiled constraint patterns, keyed by pattern text.
static PATTERNS: Lazy<RwLock<HashMap<String, Regex>>> = Lazy::new(Default::default);

/// Compile `pattern` once and reuse it on later calls.
fn compiled(pattern: &str) -> Result<Regex, regex::Error> {
    if let Some(re) = PATTERNS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(pattern)
    {
        return Ok(re.clone());
    }

    let re = Regex::new(pattern)?;
    PATTERNS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(pattern.to_string(), re.clone());
    Ok(re)
}

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Computed-only attributes are skipped (provider sets these)
/// - Attribute types must match the schema
/// - String constraints are checked on present string values
/// - Nested blocks are validated recursively with min/max item constraints
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Validate a JSON value against a schema, returning Ok if valid or Err with diagnostics.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            let mut diag =
                Diagnostic::error("Expected object").with_detail(format!("Got {}", value_type_name(value)));
            if !path.is_empty() {
                diag = diag.with_attribute(path);
            }
            diagnostics.push(diag);
            return;
        },
    };

    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
    }

    for (name, nested_block) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested_block, obj.get(name), &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if !attr.flags.is_configurable() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            let before = diagnostics.len();
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            if diagnostics.len() == before {
                if let Some(s) = v.as_str() {
                    for constraint in &attr.constraints {
                        check_constraint(constraint, s, path, diagnostics);
                    }
                }
            }
        },
    }
}

fn check_constraint(
    constraint: &Constraint,
    value: &str,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match constraint {
        Constraint::RegexLen {
            pattern,
            min_len,
            max_len,
        } => {
            let len = value.chars().count();
            if len < *min_len || len > *max_len {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid length for attribute '{}'", path))
                        .with_detail(format!(
                            "Length must be between {} and {} characters, got {}",
                            min_len, max_len, len
                        ))
                        .with_attribute(path),
                );
                return;
            }

            match compiled(pattern) {
                Ok(re) if re.is_match(value) => {},
                Ok(_) => diagnostics.push(
                    Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                        .with_detail(format!("Value must match the pattern {}", pattern))
                        .with_attribute(path),
                ),
                Err(e) => diagnostics.push(
                    Diagnostic::error(format!("Invalid pattern for attribute '{}'", path))
                        .with_detail(e.to_string())
                        .with_attribute(path),
                ),
            }
        },
        Constraint::AllowedValues(allowed) => {
            if !allowed.iter().any(|a| a == value) {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                        .with_detail(format!(
                            "Got '{}', allowed values: {}",
                            value,
                            allowed.join(", ")
                        ))
                        .with_attribute(path),
                );
            }
        },
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "list", value));
            }
        },
        AttributeType::Map(value_type) => {
            if let Some(obj) = value.as_object() {
                for (key, val) in obj {
                    let key_path = format!("{}.{}", path, key);
                    validate_attribute_type(value_type, val, &key_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "map", value));
            }
        },
        AttributeType::Object(attrs) => {
            if let Some(obj) = value.as_object() {
                validate_object_type(attrs, obj, path, diagnostics);
            } else {
                diagnostics.push(type_error(path, "object", value));
            }
        },
        AttributeType::Dynamic => {},
    }
}

fn validate_object_type(
    attrs: &HashMap<String, AttributeType>,
    obj: &serde_json::Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, attr_type) in attrs {
        if let Some(value) = obj.get(name) {
            let attr_path = join_path(path, name);
            validate_attribute_type(attr_type, value, &attr_path, diagnostics);
        }
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let items: Vec<(String, &Value)> = match (nested.nesting_mode, value) {
        (_, None) | (_, Some(Value::Null)) => Vec::new(),
        (BlockNestingMode::Single, Some(v)) => vec![(path.to_string(), v)],
        (BlockNestingMode::List, Some(Value::Array(arr))) => arr
            .iter()
            .enumerate()
            .map(|(i, item)| (format!("{}.{}", path, i), item))
            .collect(),
        (BlockNestingMode::List, Some(v)) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
            return;
        },
    };

    let len = items.len() as u32;
    if len < nested.min_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' requires at least {} item(s), got {}",
                path, nested.min_items, len
            ))
            .with_attribute(path),
        );
    }
    if nested.max_items > 0 && len > nested.max_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' allows at most {} item(s), got {}",
                path, nested.max_items, len
            ))
            .with_attribute(path),
        );
    }

    for (item_path, item) in items {
        validate_block(&nested.block, item, &item_path, diagnostics);
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64()
                || n.as_f64()
                    .is_some_and(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
        },
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeFlags, Block, NestedBlock, Schema};
    use serde_json::json;

    const UUID: &str = "94619026-912b-4d92-8f51-6c74f0692d90";

    #[test]
    fn test_patterns_compile_once() {
        let pattern = "^[a-z]{3}-cached$";
        let schema = Schema::v0().with_attribute(
            "tag",
            Attribute::optional_string().with_constraint(Constraint::regex_len(pattern, 1, 32)),
        );

        assert!(validate(&schema, &json!({"tag": "abc-cached"})).is_empty());
        assert!(PATTERNS.read().unwrap().contains_key(pattern));

        let first = compiled(pattern).unwrap();
        let second = compiled(pattern).unwrap();
        assert_eq!(first.as_str(), second.as_str());
        assert_eq!(validate(&schema, &json!({"tag": "ABC-cached"})).len(), 1);

        assert!(compiled("(unclosed").is_err());
        assert!(!PATTERNS.read().unwrap().contains_key("(unclosed"));
    }

    fn pipeline_id_attr() -> Attribute {
        Attribute::required_string().with_constraint(Constraint::regex_len("^[-0-9a-z]+$", 36, 36))
    }

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(validate(&schema, &json!({"name": "test"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));

        assert_eq!(validate(&schema, &json!({"name": null})).len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let schema = Schema::v0().with_attribute("status", Attribute::computed_string());

        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"status": 123})).is_empty());
    }

    #[test]
    fn test_regex_len_constraint() {
        let schema = Schema::v0().with_attribute("pipeline_id", pipeline_id_attr());

        assert!(validate(&schema, &json!({"pipeline_id": UUID})).is_empty());

        let diagnostics = validate(&schema, &json!({"pipeline_id": "short"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid length"));

        let upper = UUID.to_uppercase();
        let diagnostics = validate(&schema, &json!({"pipeline_id": upper}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid value"));
    }

    #[test]
    fn test_regex_is_unanchored() {
        let schema = Schema::v0().with_attribute(
            "value",
            Attribute::optional_string().with_constraint(Constraint::regex_len(".", 1, 4096)),
        );

        assert!(validate(&schema, &json!({"value": "\nx"})).is_empty());
        assert_eq!(validate(&schema, &json!({"value": ""})).len(), 1);
        assert_eq!(validate(&schema, &json!({"value": "x".repeat(4097)})).len(), 1);
        // Length is counted in characters
        assert!(validate(&schema, &json!({"value": "é".repeat(4096)})).is_empty());
    }

    #[test]
    fn test_allowed_values_constraint() {
        let schema = Schema::v0().with_attribute(
            "type",
            Attribute::optional_string().with_constraint(Constraint::allowed([
                "INTEGRATION",
                "SECURE",
                "SINGLE_SELECT",
                "TEXT",
            ])),
        );

        assert!(validate(&schema, &json!({"type": "SECURE"})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());

        let diagnostics = validate(&schema, &json!({"type": "APPCONFIG"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].detail.as_ref().unwrap().contains("SINGLE_SELECT"));
    }

    #[test]
    fn test_constraints_skipped_on_type_error() {
        let schema = Schema::v0().with_attribute("pipeline_id", pipeline_id_attr());

        let diagnostics = validate(&schema, &json!({"pipeline_id": 7}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_invalid_pattern_reported() {
        let schema = Schema::v0().with_attribute(
            "name",
            Attribute::optional_string().with_constraint(Constraint::regex_len("([", 0, 10)),
        );

        let diagnostics = validate(&schema, &json!({"name": "x"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid pattern"));
    }

    #[test]
    fn test_validate_int64() {
        let schema = Schema::v0().with_attribute(
            "max_concurrent_runs",
            Attribute::new(AttributeType::Int64, AttributeFlags::required()),
        );

        assert!(validate(&schema, &json!({"max_concurrent_runs": 4})).is_empty());
        assert!(validate(&schema, &json!({"max_concurrent_runs": 4.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"max_concurrent_runs": 4.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"max_concurrent_runs": "4"})).len(), 1);
    }

    #[test]
    fn test_validate_list_and_map() {
        let schema = Schema::v0()
            .with_attribute("enum", Attribute::optional_string_list())
            .with_attribute("options", Attribute::optional_string_map());

        assert!(validate(
            &schema,
            &json!({"enum": ["a", "b"], "options": {"prod": "Production"}})
        )
        .is_empty());

        let diagnostics = validate(&schema, &json!({"enum": ["a", 1]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("enum.1".to_string()));

        let diagnostics = validate(&schema, &json!({"options": {"prod": true}}));
        assert_eq!(diagnostics[0].attribute, Some("options.prod".to_string()));
    }

    #[test]
    fn test_validate_object_type() {
        let schema = Schema::v0().with_attribute(
            "toolchain",
            Attribute::new(
                AttributeType::object([
                    ("id", AttributeType::String),
                    ("crn", AttributeType::String),
                ]),
                AttributeFlags::optional(),
            ),
        );

        assert!(validate(&schema, &json!({"toolchain": {"id": UUID, "crn": "crn:v1"}})).is_empty());

        let diagnostics = validate(&schema, &json!({"toolchain": {"id": 1}}));
        assert_eq!(diagnostics[0].attribute, Some("toolchain.id".to_string()));
    }

    #[test]
    fn test_validate_single_block() {
        let schema = Schema::v0().with_block(
            "worker",
            NestedBlock::single(Block::new().with_attribute("id", Attribute::required_string())),
        );

        assert!(validate(&schema, &json!({"worker": {"id": "public"}})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());

        let diagnostics = validate(&schema, &json!({"worker": {}}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("worker.id".to_string()));
    }

    #[test]
    fn test_validate_list_block_cardinality() {
        let schema = Schema::v0().with_block(
            "worker",
            NestedBlock::list(Block::new().with_attribute("id", Attribute::required_string()))
                .with_min_items(1)
                .with_max_items(1),
        );

        assert!(validate(&schema, &json!({"worker": [{"id": "public"}]})).is_empty());

        let diagnostics = validate(&schema, &json!({"worker": []}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at least 1"));

        let diagnostics = validate(&schema, &json!({"worker": [{"id": "a"}, {"id": "b"}]}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 1"));

        let diagnostics = validate(&schema, &json!({"worker": {"id": "a"}}));
        assert!(diagnostics[0].summary.contains("Expected list"));

        let diagnostics = validate(&schema, &json!({"worker": [{"id": 9}]}));
        assert_eq!(diagnostics[0].attribute, Some("worker.0.id".to_string()));
    }

    #[test]
    fn test_helpers() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(is_valid(&schema, &json!({"name": "test"})));
        assert!(!is_valid(&schema, &json!({})));
        assert!(validate_result(&schema, &json!({"name": "test"})).is_ok());
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 1);
    }

    #[test]
    fn test_validate_root_not_object() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
        assert!(diagnostics[0].attribute.is_none());
    }
}
