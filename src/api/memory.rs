//! An in-process pipeline service.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::models::{
    PipelineDefinition, PipelineRequest, Property, PropertyRequest, TektonPipeline, Toolchain,
    Trigger, TriggerProperty, TriggerPropertyRequest,
};
use super::PipelineApi;
use crate::error::ApiError;
use crate::secret::{secure_digest, PropertyType};

/// A [`PipelineApi`] backed by memory.
///
/// Values are kept in plaintext internally. Every response replaces SECURE
/// values with their digest record, the way the hosted service does, so state
/// built from these responses never contains a secret.
///
/// # Example
///
/// ```
/// use tekton_pipeline_provider::api::{InMemoryPipelineApi, PipelineApi, PipelineRequest};
///
/// # tokio_test::block_on(async {
/// let api = InMemoryPipelineApi::new();
/// let pipeline = api.create_pipeline(PipelineRequest::default()).await.unwrap();
/// assert_eq!(api.get_pipeline(&pipeline.id).await.unwrap().id, pipeline.id);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct InMemoryPipelineApi {
    pipelines: RwLock<BTreeMap<String, TektonPipeline>>,
    injected_failure: Mutex<Option<ApiError>>,
    writes: AtomicUsize,
}

impl InMemoryPipelineApi {
    /// Create an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a trigger on a pipeline, assigning an id when it has none.
    ///
    /// Triggers are managed outside this provider; this is how they appear.
    pub async fn seed_trigger(
        &self,
        pipeline_id: &str,
        mut trigger: Trigger,
    ) -> Result<String, ApiError> {
        let mut pipelines = self.pipelines.write().await;
        let pipeline = pipelines
            .get_mut(pipeline_id)
            .ok_or_else(|| missing_pipeline("CreateTektonPipelineTrigger", pipeline_id))?;

        let id = match trigger.id() {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        trigger.base_mut().id = Some(id.clone());
        pipeline.triggers.push(trigger);
        pipeline.updated_at = Utc::now();

        Ok(id)
    }

    /// Make the next call fail with `error`.
    pub async fn inject_failure(&self, error: ApiError) {
        *self.injected_failure.lock().await = Some(error);
    }

    /// Number of mutating calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// The plaintext value of a pipeline property as last written.
    pub async fn stored_property_value(&self, pipeline_id: &str, name: &str) -> Option<String> {
        let pipelines = self.pipelines.read().await;
        pipelines
            .get(pipeline_id)?
            .properties
            .iter()
            .find(|p| p.name == name)?
            .value
            .clone()
    }

    /// The plaintext value of a trigger property as last written.
    pub async fn stored_trigger_property_value(
        &self,
        pipeline_id: &str,
        trigger_id: &str,
        name: &str,
    ) -> Option<String> {
        let pipelines = self.pipelines.read().await;
        pipelines
            .get(pipeline_id)?
            .triggers
            .iter()
            .find(|t| t.id() == Some(trigger_id))?
            .base()
            .properties
            .iter()
            .find(|p| p.name == name)?
            .value
            .clone()
    }

    async fn check_failure(&self) -> Result<(), ApiError> {
        match self.injected_failure.lock().await.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn begin_write(&self) -> Result<(), ApiError> {
        self.check_failure().await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn missing_pipeline(operation: &str, pipeline_id: &str) -> ApiError {
    ApiError::not_found(operation, format!("pipeline '{}' not found", pipeline_id))
}

fn find_trigger<'a>(
    pipeline: &'a mut TektonPipeline,
    trigger_id: &str,
    operation: &str,
) -> Result<&'a mut Trigger, ApiError> {
    pipeline
        .triggers
        .iter_mut()
        .find(|t| t.id() == Some(trigger_id))
        .ok_or_else(|| ApiError::not_found(operation, format!("trigger '{}' not found", trigger_id)))
}

fn redact_value(
    scope: &[&str],
    property_type: PropertyType,
    value: &Option<String>,
) -> Option<String> {
    match (property_type, value) {
        (PropertyType::Secure, Some(plaintext)) => {
            Some(secure_digest(scope, plaintext).to_string())
        },
        _ => value.clone(),
    }
}

fn redact_property(pipeline_id: &str, property: &Property) -> Property {
    Property {
        value: redact_value(
            &[pipeline_id, property.name.as_str()],
            property.property_type,
            &property.value,
        ),
        ..property.clone()
    }
}

fn redact_trigger_property(
    pipeline_id: &str,
    trigger_id: &str,
    property: &TriggerProperty,
) -> TriggerProperty {
    TriggerProperty {
        value: redact_value(
            &[pipeline_id, trigger_id, property.name.as_str()],
            property.property_type,
            &property.value,
        ),
        ..property.clone()
    }
}

fn redact_pipeline(pipeline: &TektonPipeline) -> TektonPipeline {
    let mut out = pipeline.clone();
    out.properties = pipeline
        .properties
        .iter()
        .map(|p| redact_property(&pipeline.id, p))
        .collect();
    for trigger in &mut out.triggers {
        let trigger_id = trigger.id().unwrap_or_default().to_string();
        let base = trigger.base_mut();
        base.properties = base
            .properties
            .iter()
            .map(|p| redact_trigger_property(&pipeline.id, &trigger_id, p))
            .collect();
    }
    out
}

#[async_trait]
impl PipelineApi for InMemoryPipelineApi {
    async fn create_pipeline(&self, request: PipelineRequest) -> Result<TektonPipeline, ApiError> {
        const OP: &str = "CreateTektonPipeline";
        self.begin_write().await?;

        let id = request
            .integration_instance_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut pipelines = self.pipelines.write().await;
        if pipelines.contains_key(&id) {
            return Err(ApiError::conflict(OP, format!("pipeline '{}' already exists", id)));
        }

        let now = Utc::now();
        let toolchain_id = Uuid::new_v4().to_string();
        let pipeline = TektonPipeline {
            id: id.clone(),
            name: format!("pipeline-{}", id.chars().take(8).collect::<String>()),
            status: "configured".to_string(),
            resource_group_id: Uuid::new_v4().simple().to_string(),
            toolchain: Toolchain {
                crn: format!(
                    "crn:v1:bluemix:public:toolchain:us-south:a/{}::toolchain:{}",
                    Uuid::new_v4().simple(),
                    toolchain_id
                ),
                id: toolchain_id,
            },
            definitions: Vec::new(),
            properties: Vec::new(),
            updated_at: now,
            created: now,
            pipeline_definition: Some(PipelineDefinition {
                status: Some("outdated".to_string()),
                id: None,
            }),
            triggers: Vec::new(),
            worker: request.worker,
            integration_instance_id: request.integration_instance_id,
            html_url: format!("https://cloud.ibm.com/devops/pipelines/tekton/{}", id),
            build_number: None,
            enabled: true,
        };

        debug!(pipeline_id = %id, "pipeline created");
        pipelines.insert(id, pipeline.clone());
        Ok(redact_pipeline(&pipeline))
    }

    async fn get_pipeline(&self, pipeline_id: &str) -> Result<TektonPipeline, ApiError> {
        self.check_failure().await?;
        let pipelines = self.pipelines.read().await;
        pipelines
            .get(pipeline_id)
            .map(redact_pipeline)
            .ok_or_else(|| missing_pipeline("GetTektonPipeline", pipeline_id))
    }

    async fn update_pipeline(
        &self,
        pipeline_id: &str,
        request: PipelineRequest,
    ) -> Result<TektonPipeline, ApiError> {
        self.begin_write().await?;
        let mut pipelines = self.pipelines.write().await;
        let pipeline = pipelines
            .get_mut(pipeline_id)
            .ok_or_else(|| missing_pipeline("UpdateTektonPipeline", pipeline_id))?;

        if let Some(worker) = request.worker {
            pipeline.worker = Some(worker);
        }
        if let Some(integration_instance_id) = request.integration_instance_id {
            pipeline.integration_instance_id = Some(integration_instance_id);
        }
        pipeline.updated_at = Utc::now();

        Ok(redact_pipeline(pipeline))
    }

    async fn delete_pipeline(&self, pipeline_id: &str) -> Result<(), ApiError> {
        self.begin_write().await?;
        self.pipelines
            .write()
            .await
            .remove(pipeline_id)
            .map(|_| ())
            .ok_or_else(|| missing_pipeline("DeleteTektonPipeline", pipeline_id))
    }

    async fn create_property(
        &self,
        pipeline_id: &str,
        request: PropertyRequest,
    ) -> Result<Property, ApiError> {
        const OP: &str = "CreateTektonPipelineProperties";
        self.begin_write().await?;

        let (Some(name), Some(property_type)) = (request.name, request.property_type) else {
            return Err(ApiError::bad_request(OP, "property name and type are required"));
        };

        let mut pipelines = self.pipelines.write().await;
        let pipeline = pipelines
            .get_mut(pipeline_id)
            .ok_or_else(|| missing_pipeline(OP, pipeline_id))?;

        if pipeline.properties.iter().any(|p| p.name == name) {
            return Err(ApiError::conflict(OP, format!("property '{}' already exists", name)));
        }

        let property = Property {
            name,
            value: request.value,
            options: request.options,
            property_type,
            path: request.path,
        };
        pipeline.properties.push(property.clone());
        pipeline.updated_at = Utc::now();

        Ok(redact_property(pipeline_id, &property))
    }

    async fn get_property(&self, pipeline_id: &str, name: &str) -> Result<Property, ApiError> {
        const OP: &str = "GetTektonPipelineProperty";
        self.check_failure().await?;

        let pipelines = self.pipelines.read().await;
        let pipeline = pipelines
            .get(pipeline_id)
            .ok_or_else(|| missing_pipeline(OP, pipeline_id))?;

        pipeline
            .properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| redact_property(pipeline_id, p))
            .ok_or_else(|| ApiError::not_found(OP, format!("property '{}' not found", name)))
    }

    async fn replace_property(
        &self,
        pipeline_id: &str,
        name: &str,
        request: PropertyRequest,
    ) -> Result<Property, ApiError> {
        const OP: &str = "ReplaceTektonPipelineProperty";
        self.begin_write().await?;

        let mut pipelines = self.pipelines.write().await;
        let pipeline = pipelines
            .get_mut(pipeline_id)
            .ok_or_else(|| missing_pipeline(OP, pipeline_id))?;

        if let Some(new_name) = request.name.as_deref() {
            if new_name != name && pipeline.properties.iter().any(|p| p.name == new_name) {
                return Err(ApiError::conflict(
                    OP,
                    format!("property '{}' already exists", new_name),
                ));
            }
        }

        let property = pipeline
            .properties
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| ApiError::not_found(OP, format!("property '{}' not found", name)))?;

        if let Some(new_name) = request.name {
            property.name = new_name;
        }
        if let Some(property_type) = request.property_type {
            property.property_type = property_type;
        }
        if request.value.is_some() {
            property.value = request.value;
        }
        if request.options.is_some() {
            property.options = request.options;
        }
        if request.path.is_some() {
            property.path = request.path;
        }

        let replaced = redact_property(pipeline_id, property);
        pipeline.updated_at = Utc::now();
        Ok(replaced)
    }

    async fn delete_property(&self, pipeline_id: &str, name: &str) -> Result<(), ApiError> {
        const OP: &str = "DeleteTektonPipelineProperty";
        self.begin_write().await?;

        let mut pipelines = self.pipelines.write().await;
        let pipeline = pipelines
            .get_mut(pipeline_id)
            .ok_or_else(|| missing_pipeline(OP, pipeline_id))?;

        let before = pipeline.properties.len();
        pipeline.properties.retain(|p| p.name != name);
        if pipeline.properties.len() == before {
            return Err(ApiError::not_found(OP, format!("property '{}' not found", name)));
        }
        pipeline.updated_at = Utc::now();
        Ok(())
    }

    async fn create_trigger_property(
        &self,
        pipeline_id: &str,
        trigger_id: &str,
        request: TriggerPropertyRequest,
    ) -> Result<TriggerProperty, ApiError> {
        const OP: &str = "CreateTektonPipelineTriggerProperties";
        self.begin_write().await?;

        let (Some(name), Some(property_type)) = (request.name, request.property_type) else {
            return Err(ApiError::bad_request(OP, "property name and type are required"));
        };

        let mut pipelines = self.pipelines.write().await;
        let pipeline = pipelines
            .get_mut(pipeline_id)
            .ok_or_else(|| missing_pipeline(OP, pipeline_id))?;
        let base = find_trigger(pipeline, trigger_id, OP)?.base_mut();

        if base.properties.iter().any(|p| p.name == name) {
            return Err(ApiError::conflict(OP, format!("property '{}' already exists", name)));
        }

        let property = TriggerProperty {
            name,
            value: request.value,
            enum_values: request.enum_values,
            default: request.default,
            property_type,
            path: request.path,
        };
        base.properties.push(property.clone());

        Ok(redact_trigger_property(pipeline_id, trigger_id, &property))
    }

    async fn get_trigger_property(
        &self,
        pipeline_id: &str,
        trigger_id: &str,
        name: &str,
    ) -> Result<TriggerProperty, ApiError> {
        const OP: &str = "GetTektonPipelineTriggerProperty";
        self.check_failure().await?;

        let pipelines = self.pipelines.read().await;
        let pipeline = pipelines
            .get(pipeline_id)
            .ok_or_else(|| missing_pipeline(OP, pipeline_id))?;
        let trigger = pipeline
            .triggers
            .iter()
            .find(|t| t.id() == Some(trigger_id))
            .ok_or_else(|| ApiError::not_found(OP, format!("trigger '{}' not found", trigger_id)))?;

        trigger
            .base()
            .properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| redact_trigger_property(pipeline_id, trigger_id, p))
            .ok_or_else(|| ApiError::not_found(OP, format!("property '{}' not found", name)))
    }

    async fn replace_trigger_property(
        &self,
        pipeline_id: &str,
        trigger_id: &str,
        name: &str,
        request: TriggerPropertyRequest,
    ) -> Result<TriggerProperty, ApiError> {
        const OP: &str = "ReplaceTektonPipelineTriggerProperty";
        self.begin_write().await?;

        let mut pipelines = self.pipelines.write().await;
        let pipeline = pipelines
            .get_mut(pipeline_id)
            .ok_or_else(|| missing_pipeline(OP, pipeline_id))?;
        let base = find_trigger(pipeline, trigger_id, OP)?.base_mut();

        if let Some(new_name) = request.name.as_deref() {
            if new_name != name && base.properties.iter().any(|p| p.name == new_name) {
                return Err(ApiError::conflict(
                    OP,
                    format!("property '{}' already exists", new_name),
                ));
            }
        }

        let property = base
            .properties
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| ApiError::not_found(OP, format!("property '{}' not found", name)))?;

        if let Some(new_name) = request.name {
            property.name = new_name;
        }
        if let Some(property_type) = request.property_type {
            property.property_type = property_type;
        }
        if request.value.is_some() {
            property.value = request.value;
        }
        if request.enum_values.is_some() {
            property.enum_values = request.enum_values;
        }
        if request.default.is_some() {
            property.default = request.default;
        }
        if request.path.is_some() {
            property.path = request.path;
        }

        Ok(redact_trigger_property(pipeline_id, trigger_id, property))
    }

    async fn delete_trigger_property(
        &self,
        pipeline_id: &str,
        trigger_id: &str,
        name: &str,
    ) -> Result<(), ApiError> {
        const OP: &str = "DeleteTektonPipelineTriggerProperty";
        self.begin_write().await?;

        let mut pipelines = self.pipelines.write().await;
        let pipeline = pipelines
            .get_mut(pipeline_id)
            .ok_or_else(|| missing_pipeline(OP, pipeline_id))?;
        let base = find_trigger(pipeline, trigger_id, OP)?.base_mut();

        let before = base.properties.len();
        base.properties.retain(|p| p.name != name);
        if base.properties.len() == before {
            return Err(ApiError::not_found(OP, format!("property '{}' not found", name)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ManualTrigger, TriggerBase, Worker};
    use crate::secret::is_digest_record;

    async fn api_with_trigger() -> (InMemoryPipelineApi, String, String) {
        let api = InMemoryPipelineApi::new();
        let pipeline = api.create_pipeline(PipelineRequest::default()).await.unwrap();
        let trigger_id = api
            .seed_trigger(
                &pipeline.id,
                Trigger::Manual(ManualTrigger {
                    base: TriggerBase::new("manual", "listener"),
                }),
            )
            .await
            .unwrap();
        (api, pipeline.id, trigger_id)
    }

    fn secure_request(name: &str, value: &str) -> TriggerPropertyRequest {
        TriggerPropertyRequest {
            name: Some(name.to_string()),
            value: Some(value.to_string()),
            property_type: Some(PropertyType::Secure),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_pipeline_uses_integration_instance_id() {
        let api = InMemoryPipelineApi::new();
        let id = "94619026-912b-4d92-8f51-6c74f0692d90".to_string();
        let pipeline = api
            .create_pipeline(PipelineRequest {
                integration_instance_id: Some(id.clone()),
                worker: Some(Worker::with_id("public")),
            })
            .await
            .unwrap();

        assert_eq!(pipeline.id, id);
        assert!(pipeline.enabled);
        assert_eq!(pipeline.worker.unwrap().id, "public");

        let err = api
            .create_pipeline(PipelineRequest {
                integration_instance_id: Some(id),
                worker: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.status, 409);
    }

    #[tokio::test]
    async fn test_secure_trigger_property_returns_digest() {
        let (api, pipeline_id, trigger_id) = api_with_trigger().await;

        let created = api
            .create_trigger_property(&pipeline_id, &trigger_id, secure_request("token", "s3cret"))
            .await
            .unwrap();
        let expected = secure_digest(&[pipeline_id.as_str(), trigger_id.as_str(), "token"], "s3cret");
        assert_eq!(created.value, Some(expected.to_string()));

        let fetched = api
            .get_trigger_property(&pipeline_id, &trigger_id, "token")
            .await
            .unwrap();
        assert_eq!(fetched, created);

        let pipeline = api.get_pipeline(&pipeline_id).await.unwrap();
        let listed = &pipeline.triggers[0].base().properties[0];
        assert!(is_digest_record(listed.value.as_deref().unwrap()));

        assert_eq!(
            api.stored_trigger_property_value(&pipeline_id, &trigger_id, "token")
                .await
                .as_deref(),
            Some("s3cret")
        );
    }

    #[tokio::test]
    async fn test_secure_pipeline_property_scope() {
        let api = InMemoryPipelineApi::new();
        let pipeline = api.create_pipeline(PipelineRequest::default()).await.unwrap();

        let created = api
            .create_property(
                &pipeline.id,
                PropertyRequest {
                    name: Some("api-key".to_string()),
                    value: Some("abc".to_string()),
                    property_type: Some(PropertyType::Secure),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let expected = secure_digest(&[pipeline.id.as_str(), "api-key"], "abc").to_string();
        assert_eq!(created.value, Some(expected));
    }

    #[tokio::test]
    async fn test_text_values_returned_verbatim() {
        let api = InMemoryPipelineApi::new();
        let pipeline = api.create_pipeline(PipelineRequest::default()).await.unwrap();

        let created = api
            .create_property(
                &pipeline.id,
                PropertyRequest {
                    name: Some("env".to_string()),
                    value: Some("dev".to_string()),
                    property_type: Some(PropertyType::Text),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(created.value.as_deref(), Some("dev"));
    }

    #[tokio::test]
    async fn test_replace_keeps_unset_fields() {
        let (api, pipeline_id, trigger_id) = api_with_trigger().await;
        api.create_trigger_property(&pipeline_id, &trigger_id, secure_request("token", "one"))
            .await
            .unwrap();

        let replaced = api
            .replace_trigger_property(
                &pipeline_id,
                &trigger_id,
                "token",
                TriggerPropertyRequest {
                    name: Some("token".to_string()),
                    property_type: Some(PropertyType::Secure),
                    path: Some("parameters.token".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(replaced.path.as_deref(), Some("parameters.token"));
        assert_eq!(
            api.stored_trigger_property_value(&pipeline_id, &trigger_id, "token")
                .await
                .as_deref(),
            Some("one")
        );
    }

    #[tokio::test]
    async fn test_missing_objects_are_404() {
        let (api, pipeline_id, trigger_id) = api_with_trigger().await;

        let err = api.get_pipeline("nope").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.operation, "GetTektonPipeline");

        let err = api
            .get_trigger_property(&pipeline_id, "nope", "token")
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = api
            .delete_trigger_property(&pipeline_id, &trigger_id, "token")
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = api.get_property(&pipeline_id, "env").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_requires_name_and_type() {
        let (api, pipeline_id, trigger_id) = api_with_trigger().await;
        let err = api
            .create_trigger_property(
                &pipeline_id,
                &trigger_id,
                TriggerPropertyRequest {
                    name: Some("token".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status, 400);
    }

    #[tokio::test]
    async fn test_injected_failure_applies_once() {
        let api = InMemoryPipelineApi::new();
        let pipeline = api.create_pipeline(PipelineRequest::default()).await.unwrap();

        api.inject_failure(ApiError::new(503, "GetTektonPipeline", "maintenance"))
            .await;
        assert_eq!(api.get_pipeline(&pipeline.id).await.unwrap_err().status, 503);
        assert!(api.get_pipeline(&pipeline.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_write_count() {
        let api = InMemoryPipelineApi::new();
        assert_eq!(api.write_count(), 0);
        let pipeline = api.create_pipeline(PipelineRequest::default()).await.unwrap();
        api.get_pipeline(&pipeline.id).await.unwrap();
        assert_eq!(api.write_count(), 1);
        api.delete_pipeline(&pipeline.id).await.unwrap();
        assert_eq!(api.write_count(), 2);
    }
}
