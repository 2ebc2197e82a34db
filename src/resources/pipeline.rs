//! `ibm_tekton_pipeline`: a Tekton pipeline of a toolchain.
//!
//! Only the integration instance and the default worker are configurable;
//! everything else, including triggers and environment properties, is
//! reported from the service.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::info;

use super::{found, get_str, has_change, id_constraint, opt_string, require_str};
use crate::api::{PipelineApi, PipelineRequest, TektonPipeline, Trigger, Worker};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Block, NestedBlock, Schema};

/// Resource schema.
pub fn schema() -> Schema {
    let toolchain = AttributeType::object([
        ("id", AttributeType::String),
        ("crn", AttributeType::String),
    ]);
    let definition = AttributeType::object([
        ("id", AttributeType::String),
        ("service_instance_id", AttributeType::String),
        (
            "scm_source",
            AttributeType::object([
                ("url", AttributeType::String),
                ("branch", AttributeType::String),
                ("path", AttributeType::String),
            ]),
        ),
    ]);
    let property = AttributeType::object([
        ("name", AttributeType::String),
        ("value", AttributeType::String),
        ("options", AttributeType::map(AttributeType::String)),
        ("type", AttributeType::String),
        ("path", AttributeType::String),
    ]);
    let pipeline_definition = AttributeType::object([
        ("status", AttributeType::String),
        ("id", AttributeType::String),
    ]);

    Schema::v0()
        .with_description("A Tekton pipeline.")
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "integration_instance_id",
            Attribute::optional_string()
                .with_constraint(id_constraint())
                .with_description("UUID."),
        )
        .with_block(
            "worker",
            NestedBlock::single(
                Block::new()
                    .with_attribute("id", Attribute::required_string().with_description("ID."))
                    .with_description("Worker object with just worker ID."),
            ),
        )
        .with_attribute("name", Attribute::computed_string().with_description("String."))
        .with_attribute(
            "status",
            Attribute::computed_string().with_description("Pipeline status."),
        )
        .with_attribute("resource_group_id", Attribute::computed_string())
        .with_attribute(
            "toolchain",
            Attribute::computed(toolchain).with_description("Toolchain object."),
        )
        .with_attribute(
            "definitions",
            Attribute::computed(AttributeType::list(definition))
                .with_description("Definition list."),
        )
        .with_attribute(
            "env_properties",
            Attribute::computed(AttributeType::list(property))
                .with_description("Tekton pipeline's environment properties."),
        )
        .with_attribute("updated_at", Attribute::computed_string())
        .with_attribute("created", Attribute::computed_string())
        .with_attribute(
            "pipeline_definition",
            Attribute::computed(pipeline_definition)
                .with_description("Tekton pipeline definition document detail object."),
        )
        .with_attribute(
            "triggers",
            Attribute::computed(AttributeType::list(AttributeType::Dynamic))
                .with_description("Tekton pipeline triggers list."),
        )
        .with_attribute(
            "html_url",
            Attribute::computed_string().with_description("Dashboard URL of this pipeline."),
        )
        .with_attribute(
            "build_number",
            Attribute::computed_int64().with_description("The latest pipeline run build number."),
        )
        .with_attribute("enabled", Attribute::computed_bool())
}

fn timestamp(at: &DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn insert_some<T: Serialize>(
    map: &mut Map<String, Value>,
    key: &str,
    value: &Option<T>,
) -> Result<(), ProviderError> {
    if let Some(value) = value {
        map.insert(key.to_string(), serde_json::to_value(value)?);
    }
    Ok(())
}

/// Map a trigger of any kind to its state object.
pub fn trigger_to_state(trigger: &Trigger) -> Result<Value, ProviderError> {
    let base = trigger.base();
    let mut map = Map::new();
    map.insert("type".to_string(), Value::String(trigger.kind().to_string()));
    map.insert("name".to_string(), Value::String(base.name.clone()));
    map.insert(
        "event_listener".to_string(),
        Value::String(base.event_listener.clone()),
    );
    insert_some(&mut map, "id", &base.id)?;
    map.insert("properties".to_string(), serde_json::to_value(&base.properties)?);
    map.insert("tags".to_string(), serde_json::to_value(&base.tags)?);
    insert_some(&mut map, "worker", &base.worker)?;
    insert_some(&mut map, "concurrency", &base.concurrency)?;
    insert_some(&mut map, "disabled", &base.disabled)?;

    match trigger {
        Trigger::Manual(_) => {},
        Trigger::Scm(scm) => {
            insert_some(&mut map, "scm_source", &scm.scm_source)?;
            insert_some(&mut map, "events", &scm.events)?;
            insert_some(&mut map, "service_instance_id", &scm.service_instance_id)?;
        },
        Trigger::Timer(timer) => {
            insert_some(&mut map, "cron", &timer.cron)?;
            insert_some(&mut map, "timezone", &timer.timezone)?;
        },
        Trigger::Generic(generic) => {
            insert_some(&mut map, "secret", &generic.secret)?;
        },
    }

    Ok(Value::Object(map))
}

fn to_state(pipeline: &TektonPipeline) -> Result<Value, ProviderError> {
    let triggers = pipeline
        .triggers
        .iter()
        .map(trigger_to_state)
        .collect::<Result<Vec<_>, _>>()?;

    let mut map = Map::new();
    map.insert("id".to_string(), Value::String(pipeline.id.clone()));
    map.insert(
        "integration_instance_id".to_string(),
        pipeline
            .integration_instance_id
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
    );
    map.insert(
        "worker".to_string(),
        pipeline
            .worker
            .as_ref()
            .map(|w| json!({ "id": w.id.clone() }))
            .unwrap_or(Value::Null),
    );
    map.insert("name".to_string(), Value::String(pipeline.name.clone()));
    map.insert("status".to_string(), Value::String(pipeline.status.clone()));
    map.insert(
        "resource_group_id".to_string(),
        Value::String(pipeline.resource_group_id.clone()),
    );
    map.insert("toolchain".to_string(), serde_json::to_value(&pipeline.toolchain)?);
    map.insert(
        "definitions".to_string(),
        serde_json::to_value(&pipeline.definitions)?,
    );
    map.insert(
        "env_properties".to_string(),
        serde_json::to_value(&pipeline.properties)?,
    );
    map.insert("updated_at".to_string(), timestamp(&pipeline.updated_at));
    map.insert("created".to_string(), timestamp(&pipeline.created));
    map.insert(
        "pipeline_definition".to_string(),
        match &pipeline.pipeline_definition {
            Some(definition) => serde_json::to_value(definition)?,
            None => Value::Null,
        },
    );
    map.insert("triggers".to_string(), Value::Array(triggers));
    map.insert("html_url".to_string(), Value::String(pipeline.html_url.clone()));
    map.insert(
        "build_number".to_string(),
        Value::from(pipeline.build_number.unwrap_or(0)),
    );
    map.insert("enabled".to_string(), Value::Bool(pipeline.enabled));

    Ok(Value::Object(map))
}

fn worker_request(state: &Value) -> Option<Worker> {
    state
        .get("worker")
        .and_then(|w| get_str(w, "id"))
        .map(Worker::with_id)
}

async fn read_by_id(api: &dyn PipelineApi, id: &str) -> Result<Value, ProviderError> {
    match found(api.get_pipeline(id).await, id)? {
        Some(pipeline) => to_state(&pipeline),
        None => Ok(Value::Null),
    }
}

/// Create the pipeline and return its state as read back.
pub async fn create(api: &dyn PipelineApi, planned: &Value) -> Result<Value, ProviderError> {
    let request = PipelineRequest {
        integration_instance_id: opt_string(planned, "integration_instance_id"),
        worker: worker_request(planned),
    };

    let pipeline = api.create_pipeline(request).await?;
    info!(id = %pipeline.id, "pipeline created");

    read_by_id(api, &pipeline.id).await
}

/// Read the pipeline; [`Value::Null`] when it no longer exists.
pub async fn read(api: &dyn PipelineApi, state: &Value) -> Result<Value, ProviderError> {
    read_by_id(api, require_str(state, "id")?).await
}

/// Send changed configurable attributes, then read back.
pub async fn update(
    api: &dyn PipelineApi,
    prior: &Value,
    planned: &Value,
) -> Result<Value, ProviderError> {
    let id = require_str(prior, "id")?;
    let mut request = PipelineRequest::default();
    let mut changed = false;

    if has_change(prior, planned, "integration_instance_id") {
        request.integration_instance_id = opt_string(planned, "integration_instance_id");
        changed = true;
    }
    if has_change(prior, planned, "worker") {
        request.worker = worker_request(planned);
        changed = true;
    }

    if changed {
        api.update_pipeline(id, request).await?;
        info!(id, "pipeline updated");
    }

    read_by_id(api, id).await
}

/// Delete the pipeline. A pipeline that is already gone counts as deleted.
pub async fn delete(api: &dyn PipelineApi, state: &Value) -> Result<(), ProviderError> {
    let id = require_str(state, "id")?;
    if found(api.delete_pipeline(id).await, id)?.is_some() {
        info!(id, "pipeline deleted");
    }
    Ok(())
}

/// Import by pipeline id.
pub async fn import(api: &dyn PipelineApi, id: &str) -> Result<Value, ProviderError> {
    match read_by_id(api, id).await? {
        Value::Null => Err(ProviderError::NotFound(format!(
            "pipeline '{}' does not exist",
            id
        ))),
        state => Ok(state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        Events, GenericSecret, GenericTrigger, InMemoryPipelineApi, ManualTrigger, ScmTrigger,
        TimerTrigger, TriggerBase, TriggerPropertyRequest, TriggerScmSource,
    };
    use crate::secret::{is_digest_record, PropertyType};
    use crate::validation::validate;

    const INSTANCE_ID: &str = "5a0f3e2c-9b8d-4c7e-a6f5-4e3d2c1b0a9f";

    fn config() -> Value {
        json!({
            "integration_instance_id": INSTANCE_ID,
            "worker": {"id": "public"},
        })
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let api = InMemoryPipelineApi::new();
        let state = create(&api, &config()).await.unwrap();

        assert_eq!(state["id"], INSTANCE_ID);
        assert_eq!(state["integration_instance_id"], INSTANCE_ID);
        assert_eq!(state["worker"], json!({"id": "public"}));
        assert_eq!(state["enabled"], true);
        assert_eq!(state["build_number"], 0);
        assert_eq!(state["triggers"], json!([]));
        assert!(state["toolchain"]["crn"].as_str().unwrap().starts_with("crn:v1:"));
        assert!(state["created"].as_str().unwrap().ends_with('Z'));

        assert_eq!(read(&api, &state).await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_update_worker() {
        let api = InMemoryPipelineApi::new();
        let state = create(&api, &config()).await.unwrap();

        let writes = api.write_count();
        update(&api, &state, &state).await.unwrap();
        assert_eq!(api.write_count(), writes);

        let mut planned = state.clone();
        planned["worker"] = json!({"id": "private-worker"});
        let updated = update(&api, &state, &planned).await.unwrap();
        assert_eq!(updated["worker"]["id"], "private-worker");
        assert_eq!(api.write_count(), writes + 1);
    }

    #[tokio::test]
    async fn test_delete_and_import() {
        let api = InMemoryPipelineApi::new();
        let state = create(&api, &config()).await.unwrap();

        let imported = import(&api, INSTANCE_ID).await.unwrap();
        assert_eq!(imported["id"], INSTANCE_ID);

        delete(&api, &state).await.unwrap();
        assert!(read(&api, &state).await.unwrap().is_null());
        assert!(import(&api, INSTANCE_ID).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_triggers_of_every_kind() {
        let api = InMemoryPipelineApi::new();
        let state = create(&api, &config()).await.unwrap();

        let manual = api
            .seed_trigger(
                INSTANCE_ID,
                Trigger::Manual(ManualTrigger {
                    base: TriggerBase::new("manual", "listener"),
                }),
            )
            .await
            .unwrap();
        api.seed_trigger(
            INSTANCE_ID,
            Trigger::Scm(ScmTrigger {
                base: TriggerBase::new("git", "listener"),
                scm_source: Some(TriggerScmSource {
                    url: Some("https://github.com/org/repo".to_string()),
                    branch: Some("main".to_string()),
                    blind_connection: None,
                    hook_id: None,
                }),
                events: Some(Events {
                    push: Some(true),
                    pull_request_closed: None,
                    pull_request: Some(false),
                }),
                service_instance_id: Some("repo-integration".to_string()),
            }),
        )
        .await
        .unwrap();
        api.seed_trigger(
            INSTANCE_ID,
            Trigger::Timer(TimerTrigger {
                base: TriggerBase::new("nightly", "listener"),
                cron: Some("0 2 * * *".to_string()),
                timezone: Some("UTC".to_string()),
            }),
        )
        .await
        .unwrap();
        api.seed_trigger(
            INSTANCE_ID,
            Trigger::Generic(GenericTrigger {
                base: TriggerBase::new("webhook", "listener"),
                secret: Some(GenericSecret {
                    secret_type: Some("token_matches".to_string()),
                    value: None,
                    source: Some("header".to_string()),
                    key_name: Some("X-Token".to_string()),
                    algorithm: None,
                }),
            }),
        )
        .await
        .unwrap();

        api.create_trigger_property(
            INSTANCE_ID,
            &manual,
            TriggerPropertyRequest {
                name: Some("token".to_string()),
                value: Some("s3cret".to_string()),
                property_type: Some(PropertyType::Secure),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let state = read(&api, &state).await.unwrap();
        let triggers = state["triggers"].as_array().unwrap();
        assert_eq!(triggers.len(), 4);

        assert_eq!(triggers[0]["type"], "manual");
        assert_eq!(triggers[0]["id"], manual);
        let token = triggers[0]["properties"][0]["value"].as_str().unwrap();
        assert!(is_digest_record(token));

        assert_eq!(triggers[1]["type"], "scm");
        assert_eq!(triggers[1]["scm_source"]["branch"], "main");
        assert_eq!(triggers[1]["events"], json!({"push": true, "pull_request": false}));
        assert!(triggers[1].get("cron").is_none());

        assert_eq!(triggers[2]["type"], "timer");
        assert_eq!(triggers[2]["cron"], "0 2 * * *");

        assert_eq!(triggers[3]["type"], "generic");
        assert_eq!(triggers[3]["secret"]["key_name"], "X-Token");
        assert!(triggers[3].get("scm_source").is_none());
    }

    #[test]
    fn test_schema_validation() {
        let schema = schema();
        assert!(validate(&schema, &config()).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());

        let diagnostics = validate(&schema, &json!({"integration_instance_id": "nope"}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"worker": {}}));
        assert_eq!(diagnostics.len(), 1);
    }
}
