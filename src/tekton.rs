//! The Tekton pipeline provider.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::api::{InMemoryPipelineApi, PipelineApi};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::plan::plan_changes;
use crate::provider::ProviderService;
use crate::resources::{
    pipeline, pipeline_property, trigger_property, PIPELINE, PIPELINE_PROPERTY, TRIGGER_PROPERTY,
};
use crate::schema::{has_errors, Diagnostic, ProviderSchema, Schema};
use crate::types::{ImportedResource, PlanResult};
use crate::validation::validate;

/// Serves the Tekton pipeline resources and data sources over a
/// [`PipelineApi`].
///
/// # Example
///
/// ```
/// use tekton_pipeline_provider::{ProviderService, TektonProvider};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let provider = TektonProvider::in_memory();
/// let diagnostics = provider
///     .configure(json!({"ibmcloud_api_key": "key", "region": "eu-de"}))
///     .await
///     .unwrap();
/// assert!(diagnostics.is_empty());
/// # });
/// ```
pub struct TektonProvider {
    api: Arc<dyn PipelineApi>,
    config: RwLock<Option<ProviderConfig>>,
}

impl TektonProvider {
    /// Create a provider over the given service client.
    pub fn new(api: Arc<dyn PipelineApi>) -> Self {
        Self {
            api,
            config: RwLock::new(None),
        }
    }

    /// Create a provider over a fresh [`InMemoryPipelineApi`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryPipelineApi::new()))
    }

    /// The active configuration, once configured.
    pub async fn config(&self) -> Option<ProviderConfig> {
        self.config.read().await.clone()
    }

    async fn api(&self) -> Result<&dyn PipelineApi, ProviderError> {
        if self.config.read().await.is_none() {
            return Err(ProviderError::Configuration(
                "provider is not configured; call configure first".to_string(),
            ));
        }
        Ok(self.api.as_ref())
    }

    fn resource_schema(resource_type: &str) -> Result<Schema, ProviderError> {
        match resource_type {
            PIPELINE => Ok(pipeline::schema()),
            PIPELINE_PROPERTY => Ok(pipeline_property::schema()),
            TRIGGER_PROPERTY => Ok(trigger_property::schema()),
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    }

    fn data_source_schema(data_source_type: &str) -> Result<Schema, ProviderError> {
        match data_source_type {
            PIPELINE_PROPERTY => Ok(pipeline_property::data_source_schema()),
            TRIGGER_PROPERTY => Ok(trigger_property::data_source_schema()),
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    }

    fn check_provider_config(config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validate(&ProviderConfig::schema(), config);
        if !has_errors(&diagnostics) {
            if let Ok(parsed) = ProviderConfig::from_value(config.clone()) {
                diagnostics.extend(parsed.validate());
            }
        }
        diagnostics
    }
}

#[async_trait::async_trait]
impl ProviderService for TektonProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(ProviderConfig::schema())
            .with_resource(PIPELINE, pipeline::schema())
            .with_resource(PIPELINE_PROPERTY, pipeline_property::schema())
            .with_resource(TRIGGER_PROPERTY, trigger_property::schema())
            .with_data_source(PIPELINE_PROPERTY, pipeline_property::data_source_schema())
            .with_data_source(TRIGGER_PROPERTY, trigger_property::data_source_schema())
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(Self::check_provider_config(&config))
    }

    #[instrument(skip_all, name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = Self::check_provider_config(&config);
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let parsed = ProviderConfig::from_value(config)?;
        info!(
            region = %parsed.region,
            endpoint = %parsed.endpoint_url(),
            "Provider configured"
        );
        *self.config.write().await = Some(parsed);
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        info!("Provider stopping");
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&Self::resource_schema(resource_type)?, &config))
    }

    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let schema = Self::resource_schema(resource_type)?;
        if version < 0 || version as u64 > schema.version {
            return Err(ProviderError::FailedPrecondition(format!(
                "cannot upgrade {} state from version {} (current version {})",
                resource_type, version, schema.version
            )));
        }
        Ok(state)
    }

    #[instrument(skip(self, prior_state, proposed_state, _config), name = "provider.plan")]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let schema = Self::resource_schema(resource_type)?;
        let result = plan_changes(&schema, prior_state.as_ref(), &proposed_state);
        debug!(
            changes = result.changes.len(),
            requires_replace = result.requires_replace,
            "Plan completed"
        );
        Ok(result)
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let api = self.api().await?;
        match resource_type {
            PIPELINE => pipeline::create(api, &planned_state).await,
            PIPELINE_PROPERTY => pipeline_property::create(api, &planned_state).await,
            TRIGGER_PROPERTY => trigger_property::create(api, &planned_state).await,
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    }

    #[instrument(skip(self, current_state), name = "provider.read")]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let api = self.api().await?;
        match resource_type {
            PIPELINE => pipeline::read(api, &current_state).await,
            PIPELINE_PROPERTY => pipeline_property::read(api, &current_state).await,
            TRIGGER_PROPERTY => trigger_property::read(api, &current_state).await,
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    }

    #[instrument(skip(self, prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let api = self.api().await?;
        match resource_type {
            PIPELINE => pipeline::update(api, &prior_state, &planned_state).await,
            PIPELINE_PROPERTY => pipeline_property::update(api, &prior_state, &planned_state).await,
            TRIGGER_PROPERTY => trigger_property::update(api, &prior_state, &planned_state).await,
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    }

    #[instrument(skip(self, current_state), name = "provider.delete")]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let api = self.api().await?;
        match resource_type {
            PIPELINE => pipeline::delete(api, &current_state).await,
            PIPELINE_PROPERTY => pipeline_property::delete(api, &current_state).await,
            TRIGGER_PROPERTY => trigger_property::delete(api, &current_state).await,
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    }

    #[instrument(skip(self), name = "provider.import")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let api = self.api().await?;
        let state = match resource_type {
            PIPELINE => pipeline::import(api, id).await?,
            PIPELINE_PROPERTY => pipeline_property::import(api, id).await?,
            TRIGGER_PROPERTY => trigger_property::import(api, id).await?,
            other => return Err(ProviderError::UnknownResource(other.to_string())),
        };
        info!("Import completed");
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&Self::data_source_schema(data_source_type)?, &config))
    }

    #[instrument(skip(self, config), name = "provider.read_data_source")]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let api = self.api().await?;
        match data_source_type {
            PIPELINE_PROPERTY => pipeline_property::read_data_source(api, &config).await,
            TRIGGER_PROPERTY => trigger_property::read_data_source(api, &config).await,
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PipelineRequest;
    use serde_json::json;

    fn configured_config() -> Value {
        json!({"ibmcloud_api_key": "key"})
    }

    #[test]
    fn test_schema_and_metadata() {
        let provider = TektonProvider::in_memory();
        let metadata = provider.metadata();
        assert_eq!(
            metadata.resources,
            [PIPELINE, PIPELINE_PROPERTY, TRIGGER_PROPERTY]
        );
        assert_eq!(metadata.data_sources, [PIPELINE_PROPERTY, TRIGGER_PROPERTY]);
        assert!(provider
            .schema()
            .provider
            .attribute("ibmcloud_api_key")
            .is_some());
    }

    #[tokio::test]
    async fn test_operations_require_configure() {
        let provider = TektonProvider::in_memory();
        let err = provider
            .read(PIPELINE, json!({"id": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(provider.config().await.is_none());
    }

    #[tokio::test]
    async fn test_configure() {
        let provider = TektonProvider::in_memory();

        let diagnostics = provider
            .configure(json!({"ibmcloud_api_key": "key", "region": "mars-1"}))
            .await
            .unwrap();
        assert!(has_errors(&diagnostics));
        assert!(provider.config().await.is_none());

        let diagnostics = provider.configure(configured_config()).await.unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(provider.config().await.unwrap().region, "us-south");
    }

    #[tokio::test]
    async fn test_unknown_types() {
        let provider = TektonProvider::in_memory();
        provider.configure(configured_config()).await.unwrap();

        let err = provider
            .create("ibm_cd_toolchain", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));

        let err = provider
            .plan("ibm_cd_toolchain", None, json!({}), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));

        let err = provider
            .read_data_source(PIPELINE, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_upgrade_resource_state() {
        let provider = TektonProvider::in_memory();
        let state = json!({"id": "p1/env"});
        assert_eq!(
            provider
                .upgrade_resource_state(PIPELINE_PROPERTY, 0, state.clone())
                .await
                .unwrap(),
            state
        );
        assert!(provider
            .upgrade_resource_state(PIPELINE_PROPERTY, 3, state)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_shared_api() {
        let api = Arc::new(InMemoryPipelineApi::new());
        let pipeline = api.create_pipeline(PipelineRequest::default()).await.unwrap();

        let provider = TektonProvider::new(api.clone());
        provider.configure(configured_config()).await.unwrap();

        let imported = provider.import_resource(PIPELINE, &pipeline.id).await.unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].resource_type, PIPELINE);
        assert_eq!(imported[0].state["id"], pipeline.id);
    }
}
