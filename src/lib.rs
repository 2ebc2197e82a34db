//! Tekton Pipeline Provider
//!
//! A provider for IBM Cloud continuous delivery Tekton pipelines and their
//! properties, with secret-aware plan diffing.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **Secret digests**: [`secret`] derives the keyed SHA3-512 digest records
//!   the pipeline service returns in place of SECURE property values, and
//!   decides whether a configured value matches a stored record
//! - **Planning**: [`plan`] diffs prior state against configuration, treating a
//!   secret that matches its stored digest as unchanged
//! - **Resources**: `ibm_tekton_pipeline`, `ibm_tekton_pipeline_property` and
//!   `ibm_tekton_pipeline_trigger_property`, plus data sources for both
//!   property kinds
//! - **ProviderService trait**: the operations a host drives, implemented by
//!   [`TektonProvider`]
//! - **Service client**: the [`api::PipelineApi`] trait and an in-memory
//!   implementation
//! - **Logging**: Integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```
//! use tekton_pipeline_provider::{ProviderService, TektonProvider};
//! use tekton_pipeline_provider::api::{InMemoryPipelineApi, PipelineApi, PipelineRequest};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let api = Arc::new(InMemoryPipelineApi::new());
//! let pipeline = api.create_pipeline(PipelineRequest::default()).await.unwrap();
//!
//! let provider = TektonProvider::new(api);
//! provider.configure(json!({"ibmcloud_api_key": "key"})).await.unwrap();
//!
//! let config = json!({
//!     "pipeline_id": pipeline.id,
//!     "name": "api-key",
//!     "type": "SECURE",
//!     "value": "s3cret",
//! });
//! let plan = provider
//!     .plan("ibm_tekton_pipeline_property", None, config.clone(), config.clone())
//!     .await
//!     .unwrap();
//! let state = provider
//!     .create("ibm_tekton_pipeline_property", plan.planned_state)
//!     .await
//!     .unwrap();
//! assert!(state["value"].as_str().unwrap().starts_with("hash:SHA3-512:"));
//!
//! // The same secret plans as unchanged against its digest.
//! let plan = provider
//!     .plan("ibm_tekton_pipeline_property", Some(state), config.clone(), config)
//!     .await
//!     .unwrap();
//! assert!(!plan.has_changes());
//! # });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod error;
pub mod id;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod secret;
pub mod tekton;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use config::ProviderConfig;
pub use error::{ApiError, ProviderError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use plan::plan_changes;
pub use provider::ProviderService;
pub use schema::ProviderSchema;
pub use secret::{secure_digest, should_suppress_diff, PropertyType, SecretDescriptor, StoredDigest};
pub use tekton::TektonProvider;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
