//! The continuous delivery pipeline service seam.
//!
//! Resources talk to the service only through [`PipelineApi`]. A client for the
//! hosted service implements it over HTTP; [`InMemoryPipelineApi`] implements
//! it in process and behaves like the service does towards SECURE values:
//! plaintext goes in, digest records come out.

mod memory;
mod models;

pub use memory::InMemoryPipelineApi;
pub use models::{
    Concurrency, Definition, DefinitionScmSource, Events, GenericSecret, GenericTrigger,
    ManualTrigger, PipelineDefinition, PipelineRequest, Property, PropertyRequest, ScmTrigger,
    TektonPipeline, TimerTrigger, Toolchain, Trigger, TriggerBase, TriggerProperty,
    TriggerPropertyRequest, TriggerScmSource, Worker,
};

use async_trait::async_trait;

use crate::error::ApiError;

/// Operations of the pipeline service used by this provider.
///
/// Every call reports failures as an [`ApiError`] carrying the HTTP status, so
/// callers can tell a missing object (404) from other failures.
#[async_trait]
pub trait PipelineApi: Send + Sync + 'static {
    /// Create a pipeline for a toolchain integration.
    async fn create_pipeline(&self, request: PipelineRequest) -> Result<TektonPipeline, ApiError>;

    /// Fetch a pipeline.
    async fn get_pipeline(&self, pipeline_id: &str) -> Result<TektonPipeline, ApiError>;

    /// Update a pipeline; unset request fields are left unchanged.
    async fn update_pipeline(
        &self,
        pipeline_id: &str,
        request: PipelineRequest,
    ) -> Result<TektonPipeline, ApiError>;

    /// Delete a pipeline with its properties and triggers.
    async fn delete_pipeline(&self, pipeline_id: &str) -> Result<(), ApiError>;

    /// Create a pipeline property.
    async fn create_property(
        &self,
        pipeline_id: &str,
        request: PropertyRequest,
    ) -> Result<Property, ApiError>;

    /// Fetch a pipeline property.
    async fn get_property(&self, pipeline_id: &str, name: &str) -> Result<Property, ApiError>;

    /// Replace the pipeline property currently named `name`.
    async fn replace_property(
        &self,
        pipeline_id: &str,
        name: &str,
        request: PropertyRequest,
    ) -> Result<Property, ApiError>;

    /// Delete a pipeline property.
    async fn delete_property(&self, pipeline_id: &str, name: &str) -> Result<(), ApiError>;

    /// Create a trigger property.
    async fn create_trigger_property(
        &self,
        pipeline_id: &str,
        trigger_id: &str,
        request: TriggerPropertyRequest,
    ) -> Result<TriggerProperty, ApiError>;

    /// Fetch a trigger property.
    async fn get_trigger_property(
        &self,
        pipeline_id: &str,
        trigger_id: &str,
        name: &str,
    ) -> Result<TriggerProperty, ApiError>;

    /// Replace the trigger property currently named `name`.
    async fn replace_trigger_property(
        &self,
        pipeline_id: &str,
        trigger_id: &str,
        name: &str,
        request: TriggerPropertyRequest,
    ) -> Result<TriggerProperty, ApiError>;

    /// Delete a trigger property.
    async fn delete_trigger_property(
        &self,
        pipeline_id: &str,
        trigger_id: &str,
        name: &str,
    ) -> Result<(), ApiError>;
}
