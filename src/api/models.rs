//! Pipeline service models.
//!
//! These mirror the JSON documents of the continuous delivery pipeline API.
//! Triggers are a tagged sum type over their four kinds; every kind shares
//! the fields of [`TriggerBase`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::secret::PropertyType;

/// A pipeline-level environment property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    /// Property name.
    pub name: String,
    /// String value; a digest record for SECURE properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Options for SINGLE_SELECT properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<BTreeMap<String, String>>,
    /// Declared type.
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    /// Path into the integration for INTEGRATION properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// A property attached to a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerProperty {
    /// Property name.
    pub name: String,
    /// String value; a digest record for SECURE properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Options for SINGLE_SELECT properties.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    /// Default option for SINGLE_SELECT properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Declared type.
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    /// Path into the integration for INTEGRATION properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Body of a pipeline property create or replace call.
///
/// Unset fields are omitted; on replace the service keeps their current value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PropertyRequest {
    /// Property name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Plaintext value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// SINGLE_SELECT options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<BTreeMap<String, String>>,
    /// Declared type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<PropertyType>,
    /// Integration path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Body of a trigger property create or replace call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TriggerPropertyRequest {
    /// Property name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Plaintext value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// SINGLE_SELECT options.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    /// SINGLE_SELECT default option.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Declared type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<PropertyType>,
    /// Integration path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// A pipeline worker reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    /// Worker id.
    pub id: String,
    /// Worker name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Worker type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub worker_type: Option<String>,
}

impl Worker {
    /// A worker referenced only by id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            worker_type: None,
        }
    }
}

/// The toolchain that owns a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolchain {
    /// Toolchain id.
    pub id: String,
    /// Toolchain CRN.
    pub crn: String,
}

/// Where a definition's YAML lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionScmSource {
    /// Repository URL.
    pub url: String,
    /// Branch.
    pub branch: String,
    /// Path to the definition files.
    pub path: String,
}

/// A pipeline definition source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    /// Definition id.
    pub id: String,
    /// Repository integration instance.
    pub service_instance_id: String,
    /// Repository location.
    pub scm_source: DefinitionScmSource,
}

/// Status of the combined pipeline definition document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Definition status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Definition id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Trigger concurrency limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concurrency {
    /// Maximum number of concurrent runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_runs: Option<i64>,
}

/// Fields shared by every trigger kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerBase {
    /// Trigger id, assigned by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Trigger name.
    pub name: String,
    /// Event listener the trigger fires.
    pub event_listener: String,
    /// Trigger properties.
    #[serde(default)]
    pub properties: Vec<TriggerProperty>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Worker override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<Worker>,
    /// Concurrency limits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<Concurrency>,
    /// Whether the trigger is disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
}

impl TriggerBase {
    /// A base with just a name and event listener.
    pub fn new(name: impl Into<String>, event_listener: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            event_listener: event_listener.into(),
            properties: Vec::new(),
            tags: Vec::new(),
            worker: None,
            concurrency: None,
            disabled: None,
        }
    }
}

/// Repository a git trigger listens to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerScmSource {
    /// Repository URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Whether the repository is reached without a direct connection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blind_connection: Option<bool>,
    /// Webhook id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_id: Option<String>,
}

/// Git events a trigger listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Events {
    /// Push events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push: Option<bool>,
    /// Pull request closed events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request_closed: Option<bool>,
    /// Pull request open/update events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<bool>,
}

/// Secret used to verify generic webhook calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericSecret {
    /// Secret type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub secret_type: Option<String>,
    /// Secret value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Where the secret is carried in the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Header or query key holding the secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    /// Digest algorithm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
}

/// A trigger started by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualTrigger {
    /// Shared trigger fields.
    #[serde(flatten)]
    pub base: TriggerBase,
}

/// A trigger started by git events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScmTrigger {
    /// Shared trigger fields.
    #[serde(flatten)]
    pub base: TriggerBase,
    /// Repository source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scm_source: Option<TriggerScmSource>,
    /// Events listened to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Events>,
    /// Repository integration instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_instance_id: Option<String>,
}

/// A trigger started on a cron schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerTrigger {
    /// Shared trigger fields.
    #[serde(flatten)]
    pub base: TriggerBase,
    /// Cron expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    /// Time zone of the cron expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// A trigger started by a generic webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericTrigger {
    /// Shared trigger fields.
    #[serde(flatten)]
    pub base: TriggerBase,
    /// Webhook secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<GenericSecret>,
}

/// A pipeline trigger of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trigger {
    /// Started by hand.
    Manual(ManualTrigger),
    /// Started by git events.
    Scm(ScmTrigger),
    /// Started on a schedule.
    Timer(TimerTrigger),
    /// Started by a generic webhook.
    Generic(GenericTrigger),
}

impl Trigger {
    /// The wire name of this trigger's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Manual(_) => "manual",
            Self::Scm(_) => "scm",
            Self::Timer(_) => "timer",
            Self::Generic(_) => "generic",
        }
    }

    /// Fields shared by every kind.
    pub fn base(&self) -> &TriggerBase {
        match self {
            Self::Manual(t) => &t.base,
            Self::Scm(t) => &t.base,
            Self::Timer(t) => &t.base,
            Self::Generic(t) => &t.base,
        }
    }

    /// Mutable access to the shared fields.
    pub fn base_mut(&mut self) -> &mut TriggerBase {
        match self {
            Self::Manual(t) => &mut t.base,
            Self::Scm(t) => &mut t.base,
            Self::Timer(t) => &mut t.base,
            Self::Generic(t) => &mut t.base,
        }
    }

    /// The trigger id, once assigned.
    pub fn id(&self) -> Option<&str> {
        self.base().id.as_deref()
    }
}

/// A Tekton pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TektonPipeline {
    /// Pipeline id.
    pub id: String,
    /// Pipeline name.
    pub name: String,
    /// Pipeline status.
    pub status: String,
    /// Resource group id.
    pub resource_group_id: String,
    /// Owning toolchain.
    pub toolchain: Toolchain,
    /// Definition sources.
    #[serde(default)]
    pub definitions: Vec<Definition>,
    /// Pipeline-level environment properties.
    #[serde(default)]
    pub properties: Vec<Property>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Combined definition status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_definition: Option<PipelineDefinition>,
    /// Triggers.
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    /// Default worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<Worker>,
    /// Integration instance id the pipeline was created for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_instance_id: Option<String>,
    /// Dashboard URL.
    pub html_url: String,
    /// Latest run number; absent until the first run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<i64>,
    /// Whether the pipeline is enabled.
    pub enabled: bool,
}

/// Body of a pipeline create or update call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineRequest {
    /// Integration instance the pipeline belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_instance_id: Option<String>,
    /// Default worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<Worker>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trigger_tagged_serialization() {
        let trigger = Trigger::Timer(TimerTrigger {
            base: TriggerBase::new("nightly", "listener"),
            cron: Some("0 2 * * *".to_string()),
            timezone: Some("UTC".to_string()),
        });

        let json = serde_json::to_value(&trigger).unwrap();
        assert_eq!(json["type"], "timer");
        assert_eq!(json["name"], "nightly");
        assert_eq!(json["cron"], "0 2 * * *");

        let back: Trigger = serde_json::from_value(json).unwrap();
        assert_eq!(back, trigger);
    }

    #[test]
    fn test_trigger_deserialize_scm() {
        let trigger: Trigger = serde_json::from_value(json!({
            "type": "scm",
            "id": "t1",
            "name": "on-push",
            "event_listener": "listener",
            "scm_source": {"url": "https://git.example/repo", "branch": "main"},
            "events": {"push": true},
            "properties": [{"name": "token", "type": "SECURE"}]
        }))
        .unwrap();

        assert_eq!(trigger.kind(), "scm");
        assert_eq!(trigger.id(), Some("t1"));
        assert_eq!(trigger.base().properties[0].property_type, PropertyType::Secure);
        match trigger {
            Trigger::Scm(scm) => assert_eq!(scm.events.unwrap().push, Some(true)),
            other => panic!("expected scm trigger, got {}", other.kind()),
        }
    }

    #[test]
    fn test_trigger_property_enum_field() {
        let prop = TriggerProperty {
            name: "env".to_string(),
            value: Some("dev".to_string()),
            enum_values: Some(vec!["dev".to_string(), "prod".to_string()]),
            default: Some("dev".to_string()),
            property_type: PropertyType::SingleSelect,
            path: None,
        };

        let json = serde_json::to_value(&prop).unwrap();
        assert_eq!(json["enum"], json!(["dev", "prod"]));
        assert_eq!(json["type"], "SINGLE_SELECT");
        assert!(json.get("path").is_none());
    }

    #[test]
    fn test_request_omits_unset_fields() {
        let request = PropertyRequest {
            value: Some("v".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({"value": "v"}));
    }
}
