//! Resource and data source implementations.
//!
//! Each module owns one remote object kind: its schemas, the mapping between
//! service models and state objects, and the CRUD calls against
//! [`PipelineApi`](crate::api::PipelineApi).

pub mod pipeline;
pub mod pipeline_property;
pub mod trigger_property;

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{ApiError, ProviderError};
use crate::schema::Constraint;

/// Resource type of a Tekton pipeline.
pub const PIPELINE: &str = "ibm_tekton_pipeline";

/// Resource and data source type of a pipeline property.
pub const PIPELINE_PROPERTY: &str = "ibm_tekton_pipeline_property";

/// Resource and data source type of a trigger property.
pub const TRIGGER_PROPERTY: &str = "ibm_tekton_pipeline_trigger_property";

/// Service-assigned ids: lowercase hex and dashes, 36 characters.
pub(crate) fn id_constraint() -> Constraint {
    Constraint::regex_len("^[-0-9a-z]+$", 36, 36)
}

pub(crate) fn property_name_constraint() -> Constraint {
    Constraint::regex_len("^[-0-9a-zA-Z_.]{1,234}$", 1, 253)
}

/// Free text up to 4096 characters, used by values and paths.
pub(crate) fn text_constraint() -> Constraint {
    Constraint::regex_len(".", 1, 4096)
}

/// A string attribute of a state object, if present and non-null.
pub(crate) fn get_str<'a>(state: &'a Value, key: &str) -> Option<&'a str> {
    state.get(key).and_then(Value::as_str)
}

/// A string attribute that must be present.
pub(crate) fn require_str<'a>(state: &'a Value, key: &str) -> Result<&'a str, ProviderError> {
    get_str(state, key)
        .ok_or_else(|| ProviderError::Validation(format!("missing required attribute '{}'", key)))
}

pub(crate) fn opt_string(state: &Value, key: &str) -> Option<String> {
    get_str(state, key).map(str::to_string)
}

pub(crate) fn opt_string_list(state: &Value, key: &str) -> Option<Vec<String>> {
    let items = state.get(key)?.as_array()?;
    Some(items.iter().filter_map(Value::as_str).map(str::to_string).collect())
}

pub(crate) fn opt_string_map(state: &Value, key: &str) -> Option<BTreeMap<String, String>> {
    let entries = state.get(key)?.as_object()?;
    Some(
        entries
            .iter()
            .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
            .collect(),
    )
}

pub(crate) fn string_map_value(map: &BTreeMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// Whether an attribute differs between two states, treating absent as null.
pub(crate) fn has_change(prior: &Value, planned: &Value, key: &str) -> bool {
    prior.get(key).unwrap_or(&Value::Null) != planned.get(key).unwrap_or(&Value::Null)
}

/// Refuse an in-place update of an attribute that forces replacement.
pub(crate) fn ensure_unchanged(
    prior: &Value,
    planned: &Value,
    key: &str,
) -> Result<(), ProviderError> {
    if has_change(prior, planned, key) {
        return Err(ProviderError::FailedPrecondition(format!(
            "cannot update attribute '{}' in place; the resource must be re-created",
            key
        )));
    }
    Ok(())
}

/// Turn a read result into `None` when the remote object is gone.
pub(crate) fn found<T>(result: Result<T, ApiError>, id: &str) -> Result<Option<T>, ProviderError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => {
            warn!(id, operation = %err.operation, "remote object not found, dropping from state");
            Ok(None)
        },
        Err(err) => Err(err.into()),
    }
}

/// Insert `value` under `key` unless it is `None`, in which case insert null.
pub(crate) fn set_opt<T: Into<Value>>(map: &mut Map<String, Value>, key: &str, value: Option<T>) {
    map.insert(key.to_string(), value.map(Into::into).unwrap_or(Value::Null));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_has_change() {
        let prior = json!({"a": "x", "b": null});
        assert!(!has_change(&prior, &json!({"a": "x"}), "a"));
        assert!(!has_change(&prior, &json!({"a": "x"}), "b"));
        assert!(has_change(&prior, &json!({"a": "y"}), "a"));
        assert!(has_change(&prior, &json!({}), "a"));
    }

    #[test]
    fn test_ensure_unchanged() {
        let prior = json!({"pipeline_id": "p1"});
        assert!(ensure_unchanged(&prior, &json!({"pipeline_id": "p1"}), "pipeline_id").is_ok());

        let err = ensure_unchanged(&prior, &json!({"pipeline_id": "p2"}), "pipeline_id").unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
        assert!(err.message().contains("pipeline_id"));
    }

    #[test]
    fn test_found() {
        assert_eq!(found(Ok::<_, ApiError>(1), "x").unwrap(), Some(1));
        assert_eq!(
            found(Err::<i32, _>(ApiError::not_found("Get", "gone")), "x").unwrap(),
            None
        );
        let err = found(Err::<i32, _>(ApiError::new(500, "Get", "boom")), "x").unwrap_err();
        assert!(matches!(err, ProviderError::Api(_)));
    }

    #[test]
    fn test_require_str() {
        let state = json!({"name": "env", "count": 1});
        assert_eq!(require_str(&state, "name").unwrap(), "env");
        assert!(require_str(&state, "count").is_err());
        assert!(require_str(&state, "missing").is_err());
    }

    #[test]
    fn test_collection_helpers() {
        let state = json!({"enum": ["dev", "prod", 3], "options": {"a": "1", "b": 2}});
        assert_eq!(opt_string_list(&state, "enum").unwrap(), ["dev", "prod"]);
        assert!(opt_string_list(&state, "missing").is_none());

        let options = opt_string_map(&state, "options").unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(string_map_value(&options), json!({"a": "1"}));
    }

    #[test]
    fn test_set_opt() {
        let mut map = Map::new();
        set_opt(&mut map, "a", Some("x"));
        set_opt::<String>(&mut map, "b", None);
        assert_eq!(Value::Object(map), json!({"a": "x", "b": null}));
    }
}
