//! `ibm_tekton_pipeline_trigger_property`: a property attached to a trigger.
//!
//! Addressed as `<pipeline_id>/<trigger_id>/<name>`. SECURE values are stored
//! as digest records scoped to `pipeline_id.trigger_id.name`.

use serde_json::{Map, Value};
use tracing::info;

use super::{
    ensure_unchanged, found, get_str, has_change, id_constraint, opt_string, opt_string_list,
    property_name_constraint, require_str, set_opt, text_constraint,
};
use crate::api::{PipelineApi, TriggerProperty, TriggerPropertyRequest};
use crate::error::ProviderError;
use crate::id::{join_id, split_id};
use crate::schema::{Attribute, AttributeType, Constraint, Schema, SecretDigestRule};
use crate::secret::PropertyType;

const ID_PARTS: usize = 3;

/// Resource schema.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("A property of a Tekton pipeline trigger.")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "pipeline_id",
            Attribute::required_string()
                .with_force_new()
                .with_constraint(id_constraint())
                .with_description("The tekton pipeline ID."),
        )
        .with_attribute(
            "trigger_id",
            Attribute::required_string()
                .with_force_new()
                .with_constraint(id_constraint())
                .with_description("The trigger ID."),
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
                .with_secret_digest(SecretDigestRule::new(
                    "type",
                    ["pipeline_id", "trigger_id", "name"],
                ))
                .with_description("String format property value."),
        )
        .with_attribute(
            "enum",
            Attribute::optional_string_list()
                .with_description("Options for SINGLE_SELECT property type."),
        )
        .with_attribute(
            "default",
            Attribute::optional_string()
                .with_description("Default option for SINGLE_SELECT property type."),
        )
        .with_attribute(
            "type",
            Attribute::optional_string()
                .with_constraint(Constraint::allowed(PropertyType::ALL.iter().map(|t| t.as_str())))
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
        .with_description("Look up a property of a Tekton pipeline trigger.")
        .with_attribute(
            "pipeline_id",
            Attribute::required_string().with_description("The tekton pipeline ID."),
        )
        .with_attribute(
            "trigger_id",
            Attribute::required_string().with_description("The trigger ID."),
        )
        .with_attribute(
            "property_name",
            Attribute::required_string().with_description("The property's name."),
        )
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::computed_string())
        .with_attribute("value", Attribute::computed_string().sensitive())
        .with_attribute(
            "enum",
            Attribute::computed(AttributeType::list(AttributeType::String)),
        )
        .with_attribute("default", Attribute::computed_string())
        .with_attribute("type", Attribute::computed_string())
        .with_attribute("path", Attribute::computed_string())
}

fn to_state(pipeline_id: &str, trigger_id: &str, property: &TriggerProperty) -> Value {
    let mut map = Map::new();
    map.insert(
        "id".to_string(),
        Value::String(join_id(&[pipeline_id, trigger_id, property.name.as_str()])),
    );
    map.insert("pipeline_id".to_string(), Value::String(pipeline_id.to_string()));
    map.insert("trigger_id".to_string(), Value::String(trigger_id.to_string()));
    map.insert("name".to_string(), Value::String(property.name.clone()));
    set_opt(&mut map, "value", property.value.clone());
    set_opt(&mut map, "enum", property.enum_values.clone());
    set_opt(&mut map, "default", property.default.clone());
    map.insert(
        "type".to_string(),
        Value::String(property.property_type.as_str().to_string()),
    );
    set_opt(&mut map, "path", property.path.clone());
    Value::Object(map)
}

fn property_type(state: &Value) -> Result<Option<PropertyType>, ProviderError> {
    get_str(state, "type").map(str::parse::<PropertyType>).transpose()
}

/// The composite id of a state, derived from its parts when not yet set.
fn state_id(state: &Value) -> Result<String, ProviderError> {
    if let Some(id) = get_str(state, "id") {
        return Ok(id.to_string());
    }
    Ok(join_id(&[
        require_str(state, "pipeline_id")?,
        require_str(state, "trigger_id")?,
        require_str(state, "name")?,
    ]))
}

async fn read_by_id(api: &dyn PipelineApi, id: &str) -> Result<Value, ProviderError> {
    let parts = split_id(id, ID_PARTS)?;
    let result = api
        .get_trigger_property(&parts[0], &parts[1], &parts[2])
        .await;

    Ok(match found(result, id)? {
        Some(property) => to_state(&parts[0], &parts[1], &property),
        None => Value::Null,
    })
}

/// Create the property and return its state as read back.
pub async fn create(api: &dyn PipelineApi, planned: &Value) -> Result<Value, ProviderError> {
    let pipeline_id = require_str(planned, "pipeline_id")?;
    let trigger_id = require_str(planned, "trigger_id")?;

    let request = TriggerPropertyRequest {
        name: opt_string(planned, "name"),
        value: opt_string(planned, "value"),
        enum_values: opt_string_list(planned, "enum"),
        default: opt_string(planned, "default"),
        property_type: property_type(planned)?,
        path: opt_string(planned, "path"),
    };

    let created = api
        .create_trigger_property(pipeline_id, trigger_id, request)
        .await?;
    let id = join_id(&[pipeline_id, trigger_id, created.name.as_str()]);
    info!(id = %id, "trigger property created");

    read_by_id(api, &id).await
}

/// Read the property; [`Value::Null`] when it no longer exists.
pub async fn read(api: &dyn PipelineApi, state: &Value) -> Result<Value, ProviderError> {
    read_by_id(api, &state_id(state)?).await
}

/// Apply the planned changes and return the new state.
///
/// Only attributes that differ from the prior state are sent; when nothing
/// differs no request is made.
pub async fn update(
    api: &dyn PipelineApi,
    prior: &Value,
    planned: &Value,
) -> Result<Value, ProviderError> {
    ensure_unchanged(prior, planned, "pipeline_id")?;
    ensure_unchanged(prior, planned, "trigger_id")?;

    let id = state_id(prior)?;
    let parts = split_id(&id, ID_PARTS)?;
    let (pipeline_id, trigger_id, current_name) = (&parts[0], &parts[1], &parts[2]);

    let name = opt_string(planned, "name").unwrap_or_else(|| current_name.clone());
    let mut request = TriggerPropertyRequest {
        name: Some(name.clone()),
        property_type: property_type(planned)?,
        ..Default::default()
    };

    let mut changed = has_change(prior, planned, "name") || has_change(prior, planned, "type");
    if has_change(prior, planned, "enum") {
        request.enum_values = Some(opt_string_list(planned, "enum").unwrap_or_default());
        changed = true;
    }
    if has_change(prior, planned, "default") {
        request.default = Some(opt_string(planned, "default").unwrap_or_default());
        changed = true;
    }
    if has_change(prior, planned, "path") {
        request.path = Some(opt_string(planned, "path").unwrap_or_default());
        changed = true;
    }
    if has_change(prior, planned, "value") {
        request.value = Some(opt_string(planned, "value").unwrap_or_default());
        changed = true;
    }

    if changed {
        api.replace_trigger_property(pipeline_id, trigger_id, current_name, request)
            .await?;
        info!(id = %id, "trigger property updated");
    }

    read_by_id(api, &join_id(&[pipeline_id.as_str(), trigger_id.as_str(), name.as_str()])).await
}

/// Delete the property. A property that is already gone counts as deleted.
pub async fn delete(api: &dyn PipelineApi, state: &Value) -> Result<(), ProviderError> {
    let id = state_id(state)?;
    let parts = split_id(&id, ID_PARTS)?;
    let result = api
        .delete_trigger_property(&parts[0], &parts[1], &parts[2])
        .await;
    if found(result, &id)?.is_some() {
        info!(id = %id, "trigger property deleted");
    }
    Ok(())
}

/// Import by `<pipeline_id>/<trigger_id>/<name>`.
pub async fn import(api: &dyn PipelineApi, id: &str) -> Result<Value, ProviderError> {
    match read_by_id(api, id).await? {
        Value::Null => Err(ProviderError::NotFound(format!(
            "trigger property '{}' does not exist",
            id
        ))),
        state => Ok(state),
    }
}

/// Read the data source.
pub async fn read_data_source(api: &dyn PipelineApi, config: &Value) -> Result<Value, ProviderError> {
    let pipeline_id = require_str(config, "pipeline_id")?;
    let trigger_id = require_str(config, "trigger_id")?;
    let property_name = require_str(config, "property_name")?;

    let property = api
        .get_trigger_property(pipeline_id, trigger_id, property_name)
        .await?;

    let mut state = to_state(pipeline_id, trigger_id, &property);
    if let Value::Object(map) = &mut state {
        map.insert(
            "id".to_string(),
            Value::String(join_id(&[pipeline_id, trigger_id, property_name])),
        );
        map.insert(
            "property_name".to_string(),
            Value::String(property_name.to_string()),
        );
    }
    Ok(state)
}
