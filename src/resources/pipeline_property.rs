//! `ibm_tekton_pipeline_property`: a pipeline-level environment property.
//!
//! Addressed as `<pipeline_id>/<name>`. SECURE values come back from the
//! service as digest records.

use serde_json::{Map, Value};
use tracing::info;

use super::{
    ensure_unchanged, found, get_str, has_change, id_constraint, opt_string, opt_string_map,
    property_name_constraint, require_str, set_opt, string_map_value, text_constraint,
};
use crate::api::{PipelineApi, Property, PropertyRequest};
use crate::error::ProviderError;
use crate::id::{join_id, split_id};
use crate::schema::{Attribute, AttributeType, Constraint, Schema, SecretDigestRule};
use crate::secret::PropertyType;

const ID_PARTS: usize = 2;

/// Property types accepted on pipelines; APPCONFIG is trigger-only.
pub const PIPELINE_PROPERTY_TYPES: [PropertyType; 4] = [
    PropertyType::Integration,
    PropertyType::Secure,
    PropertyType::SingleSelect,
    PropertyType::Text,
];

/// Resource schema.
///
/// The digest key for SECURE values is assumed to be `pipeline_id.name`, the
/// two-part analogue of the trigger property key. The service does not
/// document a key for pipeline properties; if its records use another key the
/// comparison never matches and every apply resends the value.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("An environment property of a Tekton pipeline.")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "pipeline_id",
            Attribute::required_string()
                .with_force_new()
                .with_constraint(id_constraint())
                .with_description("The tekton pipeline ID."),
        )
        .with_attribute(
            "name",
            Attribute::optional_string()
                .with_constraint(property_name_constraint())
                .with_description("Property name."),
        )
        .with_attribute(
            "value",
            Attribute::optional_string()
                .sensitive()
                .with_constraint(text_constraint())
                .with_secret_digest(SecretDigestRule::new("type", ["pipeline_id", "name"]))
                .with_description("String format property value."),
        )
        .with_attribute(
            "options",
            Attribute::optional_string_map()
                .with_description("Options for SINGLE_SELECT property type."),
        )
        .with_attribute(
            "type",
            Attribute::optional_string()
                .with_constraint(Constraint::allowed(
                    PIPELINE_PROPERTY_TYPES.iter().map(|t| t.as_str()),
                ))
                .with_description("Property type."),
        )
        .with_attribute(
            "path",
            Attribute::optional_string()
                .with_constraint(text_constraint())
                .with_description("property path for INTEGRATION type properties."),
        )
}

/// Data source schema.
pub fn data_source_schema() -> Schema {
    Schema::v0()
        .with_description("Look up an environment property of a Tekton pipeline.")
        .with_attribute(
            "pipeline_id",
            Attribute::required_string().with_description("The tekton pipeline ID."),
        )
        .with_attribute(
            "property_name",
            Attribute::required_string().with_description("The property's name."),
        )
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::computed_string())
        .with_attribute("value", Attribute::computed_string().sensitive())
        .with_attribute(
            "options",
            Attribute::computed(AttributeType::map(AttributeType::String)),
        )
        .with_attribute("type", Attribute::computed_string())
        .with_attribute("path", Attribute::computed_string())
}

fn to_state(pipeline_id: &str, property: &Property) -> Value {
    let mut map = Map::new();
    map.insert(
        "id".to_string(),
        Value::String(join_id(&[pipeline_id, property.name.as_str()])),
    );
    map.insert("pipeline_id".to_string(), Value::String(pipeline_id.to_string()));
    map.insert("name".to_string(), Value::String(property.name.clone()));
    set_opt(&mut map, "value", property.value.clone());
    set_opt(&mut map, "options", property.options.as_ref().map(string_map_value));
    map.insert(
        "type".to_string(),
        Value::String(property.property_type.as_str().to_string()),
    );
    set_opt(&mut map, "path", property.path.clone());
    Value::Object(map)
}

fn property_type(state: &Value) -> Result<Option<PropertyType>, ProviderError> {
    get_str(state, "type")
        .map(str::parse::<PropertyType>)
        .transpose()
}

fn state_id(state: &Value) -> Result<String, ProviderError> {
    match get_str(state, "id") {
        Some(id) => Ok(id.to_string()),
        None => Ok(join_id(&[
            require_str(state, "pipeline_id")?,
            require_str(state, "name")?,
        ])),
    }
}

async fn read_by_id(api: &dyn PipelineApi, id: &str) -> Result<Value, ProviderError> {
    let parts = split_id(id, ID_PARTS)?;
    let result = api.get_property(&parts[0], &parts[1]).await;

    Ok(match found(result, id)? {
        Some(property) => to_state(&parts[0], &property),
        None => Value::Null,
    })
}

/// Create the property and return its state as read back.
pub async fn create(api: &dyn PipelineApi, planned: &Value) -> Result<Value, ProviderError> {
    let pipeline_id = require_str(planned, "pipeline_id")?;

    let request = PropertyRequest {
        name: opt_string(planned, "name"),
        value: opt_string(planned, "value"),
        options: opt_string_map(planned, "options"),
        property_type: property_type(planned)?,
        path: opt_string(planned, "path"),
    };

    let created = api.create_property(pipeline_id, request).await?;
    let id = join_id(&[pipeline_id, created.name.as_str()]);
    info!(id = %id, "pipeline property created");

    read_by_id(api, &id).await
}

/// Read the property; [`Value::Null`] when it no longer exists.
pub async fn read(api: &dyn PipelineApi, state: &Value) -> Result<Value, ProviderError> {
    read_by_id(api, &state_id(state)?).await
}

/// Apply the planned changes and return the new state.
///
/// A SINGLE_SELECT property sends its options when they changed; any other
/// property sends its value when it changed.
pub async fn update(
    api: &dyn PipelineApi,
    prior: &Value,
    planned: &Value,
) -> Result<Value, ProviderError> {
    ensure_unchanged(prior, planned, "pipeline_id")?;

    let id = state_id(prior)?;
    let parts = split_id(&id, ID_PARTS)?;
    let (pipeline_id, current_name) = (&parts[0], &parts[1]);

    let name = opt_string(planned, "name").unwrap_or_else(|| current_name.clone());
    let declared_type = property_type(planned)?;
    let mut request = PropertyRequest {
        name: Some(name.clone()),
        property_type: declared_type,
        ..Default::default()
    };

    let mut changed = has_change(prior, planned, "name") || has_change(prior, planned, "type");
    if declared_type == Some(PropertyType::SingleSelect) && has_change(prior, planned, "options") {
        request.options = Some(opt_string_map(planned, "options").unwrap_or_default());
        changed = true;
    } else if has_change(prior, planned, "value") {
        request.value = Some(opt_string(planned, "value").unwrap_or_default());
        changed = true;
    }
    if has_change(prior, planned, "path") {
        request.path = Some(opt_string(planned, "path").unwrap_or_default());
        changed = true;
    }

    if changed {
        api.replace_property(pipeline_id, current_name, request).await?;
        info!(id = %id, "pipeline property updated");
    }

    read_by_id(api, &join_id(&[pipeline_id.as_str(), name.as_str()])).await
}

/// Delete the property. A property that is already gone counts as deleted.
pub async fn delete(api: &dyn PipelineApi, state: &Value) -> Result<(), ProviderError> {
    let id = state_id(state)?;
    let parts = split_id(&id, ID_PARTS)?;
    if found(api.delete_property(&parts[0], &parts[1]).await, &id)?.is_some() {
        info!(id = %id, "pipeline property deleted");
    }
    Ok(())
}

/// Import by `<pipeline_id>/<name>`.
pub async fn import(api: &dyn PipelineApi, id: &str) -> Result<Value, ProviderError> {
    match read_by_id(api, id).await? {
        Value::Null => Err(ProviderError::NotFound(format!(
            "pipeline property '{}' does not exist",
            id
        ))),
        state => Ok(state),
    }
}

/// Read the data source.
pub async fn read_data_source(api: &dyn PipelineApi, config: &Value) -> Result<Value, ProviderError> {
    let pipeline_id = require_str(config, "pipeline_id")?;
    let property_name = require_str(config, "property_name")?;

    let property = api.get_property(pipeline_id, property_name).await?;

    let mut state = to_state(pipeline_id, &property);
    if let Value::Object(map) = &mut state {
        map.insert(
            "property_name".to_string(),
            Value::String(property_name.to_string()),
        );
    }
    Ok(state)
}
