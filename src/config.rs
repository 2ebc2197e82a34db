//! Provider configuration.
//!
//! Parsed from the JSON handed to `configure`:
//!
//! ```json
//! {
//!   "ibmcloud_api_key": "…",
//!   "region": "eu-de",
//!   "visibility": "private"
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Attribute, Constraint, Diagnostic, Schema};

/// Regions that host the continuous delivery pipeline service.
pub const SUPPORTED_REGIONS: &[&str] = &[
    "au-syd", "br-sao", "ca-tor", "eu-de", "eu-es", "eu-gb", "jp-osa", "jp-tok", "us-east",
    "us-south",
];

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-south";

/// Which network the service endpoint is reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Public endpoints.
    #[default]
    Public,
    /// Private (service network) endpoints.
    Private,
}

/// Settings for talking to the pipeline service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// IAM API key used to obtain tokens.
    pub ibmcloud_api_key: String,
    /// Service region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Explicit endpoint, overriding the region-derived one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Endpoint visibility.
    #[serde(default)]
    pub visibility: Visibility,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("ibmcloud_api_key", &"<redacted>")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("visibility", &self.visibility)
            .finish()
    }
}

impl ProviderConfig {
    /// Create a configuration for the default region.
    pub fn new(ibmcloud_api_key: impl Into<String>) -> Self {
        Self {
            ibmcloud_api_key: ibmcloud_api_key.into(),
            region: default_region(),
            endpoint: None,
            visibility: Visibility::default(),
        }
    }

    /// Set the region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Set an explicit endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Parse the configuration passed to `configure`.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        serde_json::from_value(value)
            .map_err(|e| ProviderError::Configuration(format!("invalid provider configuration: {}", e)))
    }

    /// The schema of the provider configuration block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("IBM Cloud continuous delivery pipeline provider")
            .with_attribute(
                "ibmcloud_api_key",
                Attribute::required_string()
                    .sensitive()
                    .with_description("The IBM Cloud API key."),
            )
            .with_attribute(
                "region",
                Attribute::optional_string()
                    .with_description("The region of the pipeline service.")
                    .with_constraint(Constraint::allowed(SUPPORTED_REGIONS.iter().copied())),
            )
            .with_attribute(
                "endpoint",
                Attribute::optional_string()
                    .with_description("Override for the pipeline service endpoint."),
            )
            .with_attribute(
                "visibility",
                Attribute::optional_string()
                    .with_description("Endpoint visibility, public or private.")
                    .with_constraint(Constraint::allowed(["public", "private"])),
            )
    }

    /// Semantic checks beyond the schema.
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        if self.ibmcloud_api_key.trim().is_empty() {
            diagnostics.push(
                Diagnostic::error("Empty API key")
                    .with_detail("ibmcloud_api_key must not be blank")
                    .with_attribute("ibmcloud_api_key"),
            );
        }

        if self.endpoint.is_none() && !SUPPORTED_REGIONS.contains(&self.region.as_str()) {
            diagnostics.push(
                Diagnostic::error(format!("Unsupported region '{}'", self.region))
                    .with_detail(format!("Supported regions: {}", SUPPORTED_REGIONS.join(", ")))
                    .with_attribute("region"),
            );
        }

        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("https://") {
                diagnostics.push(
                    Diagnostic::warning("Endpoint is not HTTPS")
                        .with_detail(format!("'{}' will send credentials in clear text", endpoint))
                        .with_attribute("endpoint"),
                );
            }
        }

        diagnostics
    }

    /// The base URL of the pipeline service.
    pub fn endpoint_url(&self) -> String {
        if let Some(endpoint) = &self.endpoint {
            return endpoint.trim_end_matches('/').to_string();
        }
        let host_prefix = match self.visibility {
            Visibility::Public => "",
            Visibility::Private => "private.",
        };
        format!(
            "https://api.{}{}.devops.cloud.ibm.com/pipeline/v2",
            host_prefix, self.region
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::has_errors;
    use crate::validation::validate;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::from_value(json!({"ibmcloud_api_key": "k"})).unwrap();
        assert_eq!(config.region, "us-south");
        assert_eq!(config.visibility, Visibility::Public);
        assert!(config.validate().is_empty());
        assert_eq!(
            config.endpoint_url(),
            "https://api.us-south.devops.cloud.ibm.com/pipeline/v2"
        );
    }

    #[test]
    fn test_private_endpoint() {
        let config = ProviderConfig::from_value(json!({
            "ibmcloud_api_key": "k",
            "region": "eu-de",
            "visibility": "private"
        }))
        .unwrap();
        assert_eq!(
            config.endpoint_url(),
            "https://api.private.eu-de.devops.cloud.ibm.com/pipeline/v2"
        );
    }

    #[test]
    fn test_endpoint_override() {
        let config = ProviderConfig::new("k")
            .with_region("nowhere")
            .with_endpoint("https://pipeline.example.test/v2/");
        assert!(config.validate().is_empty());
        assert_eq!(config.endpoint_url(), "https://pipeline.example.test/v2");

        let insecure = ProviderConfig::new("k").with_endpoint("http://localhost:8080");
        let diagnostics = insecure.validate();
        assert_eq!(diagnostics.len(), 1);
        assert!(!has_errors(&diagnostics));
    }

    #[test]
    fn test_semantic_errors() {
        let config = ProviderConfig::new("  ").with_region("mars-1");
        let diagnostics = config.validate();
        assert_eq!(diagnostics.len(), 2);
        assert!(has_errors(&diagnostics));
    }

    #[test]
    fn test_missing_api_key() {
        let err = ProviderConfig::from_value(json!({"region": "us-south"})).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_schema_validation() {
        let schema = ProviderConfig::schema();
        assert!(validate(&schema, &json!({"ibmcloud_api_key": "k", "region": "jp-tok"})).is_empty());
        assert_eq!(validate(&schema, &json!({"region": "jp-tok"})).len(), 1);
        assert_eq!(
            validate(&schema, &json!({"ibmcloud_api_key": "k", "visibility": "hidden"})).len(),
            1
        );
        assert!(schema.attribute("ibmcloud_api_key").unwrap().flags.sensitive);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ProviderConfig::new("super-secret-key");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret-key"));
        assert!(debug.contains("<redacted>"));
    }
}
