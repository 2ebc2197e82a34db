//! The provider operations trait.
//!
//! A host drives a provider through [`ProviderService`]: schema discovery,
//! configuration, then plan/create/read/update/delete/import for resources and
//! reads for data sources. States and configurations travel as
//! [`serde_json::Value`] objects shaped by the provider's schemas.

use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata};

/// Operations a provider serves.
///
/// # Example
///
/// ```
/// use tekton_pipeline_provider::{ProviderError, PlanResult, ProviderSchema, ProviderService};
/// use tekton_pipeline_provider::schema::{Attribute, Diagnostic, Schema};
/// use serde_json::Value;
///
/// struct EchoProvider;
///
/// #[async_trait::async_trait]
/// impl ProviderService for EchoProvider {
///     fn schema(&self) -> ProviderSchema {
///         ProviderSchema::new().with_resource(
///             "echo",
///             Schema::v0().with_attribute("name", Attribute::required_string()),
///         )
///     }
///
///     async fn configure(&self, _config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
///         Ok(vec![])
///     }
///
///     async fn plan(
///         &self,
///         _resource_type: &str,
///         _prior_state: Option<Value>,
///         proposed_state: Value,
///         _config: Value,
///     ) -> Result<PlanResult, ProviderError> {
///         Ok(PlanResult::no_change(proposed_state))
///     }
///
///     async fn create(&self, _resource_type: &str, planned: Value) -> Result<Value, ProviderError> {
///         Ok(planned)
///     }
///
///     async fn read(&self, _resource_type: &str, current: Value) -> Result<Value, ProviderError> {
///         Ok(current)
///     }
///
///     async fn update(
///         &self,
///         _resource_type: &str,
///         _prior: Value,
///         planned: Value,
///     ) -> Result<Value, ProviderError> {
///         Ok(planned)
///     }
///
///     async fn delete(&self, _resource_type: &str, _current: Value) -> Result<(), ProviderError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Return the resource and data source type names, sorted.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        let mut resources: Vec<String> = schema.resources.keys().cloned().collect();
        let mut data_sources: Vec<String> = schema.data_sources.keys().cloned().collect();
        resources.sort();
        data_sources.sort();
        ProviderMetadata {
            resources,
            data_sources,
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider gracefully.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Upgrade resource state from an older schema version.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (resource_type, version);
        Ok(state)
    }

    /// Plan changes for a resource.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource and return its state.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Read the current state of a resource.
    ///
    /// Returns [`Value::Null`] when the remote object no longer exists.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    /// Update an existing resource and return its new state.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Bring an existing remote object under management by id.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::Unimplemented(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source's configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    /// Read data from a data source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        _config: Value,
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::UnknownResource(format!(
            "Unknown data source type: {}",
            data_source_type
        )))
    }
}
