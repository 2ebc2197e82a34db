//! Schema-driven planning.
//!
//! [`plan_changes`] compares prior state with the proposed configuration
//! attribute by attribute. Attributes carrying a
//! [`SecretDigestRule`](crate::schema::SecretDigestRule) are compared through
//! [`should_suppress_diff`], so a configured secret that matches the stored
//! digest record plans as unchanged and the record stays in state.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::schema::{Attribute, Schema, SecretDigestRule};
use crate::secret::{should_suppress_diff, PropertyType, SecretDescriptor, SCOPE_SEPARATOR};
use crate::types::{AttributeChange, PlanResult};

/// Placeholder recorded in plan changes for sensitive attributes.
pub const SENSITIVE_PLACEHOLDER: &str = "(sensitive value)";

/// Plan the transition from `prior` to `proposed` for a resource of `schema`.
///
/// - No prior state plans a create: every non-null configurable attribute is
///   added.
/// - A null proposal plans a delete: every non-null prior attribute is removed.
/// - Otherwise configurable attributes and nested blocks are compared and
///   computed-only attributes are carried over from prior state. A change to a
///   `force_new` attribute marks the plan as requiring replacement.
pub fn plan_changes(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> PlanResult {
    let prior = prior.filter(|p| !p.is_null());

    match (prior, proposed) {
        (None, Value::Null) => PlanResult::no_change(Value::Null),
        (Some(prior), Value::Null) => plan_delete(schema, prior),
        (None, proposed) => plan_create(schema, proposed),
        (Some(prior), proposed) => plan_update(schema, prior, proposed),
    }
}

fn plan_create(schema: &Schema, proposed: &Value) -> PlanResult {
    let mut changes = Vec::new();

    for name in sorted_keys(schema) {
        if let Some(attr) = schema.block.attributes.get(name) {
            if !attr.flags.is_configurable() {
                continue;
            }
            if let Some(value) = non_null(proposed.get(name)) {
                changes.push(AttributeChange::added(name, display_value(attr, value)));
            }
        } else if let Some(value) = non_null(proposed.get(name)) {
            changes.push(AttributeChange::added(name, value.clone()));
        }
    }

    debug!(changes = changes.len(), "planned create");
    PlanResult::with_changes(proposed.clone(), changes, false)
}

fn plan_delete(schema: &Schema, prior: &Value) -> PlanResult {
    let changes: Vec<AttributeChange> = sorted_keys(schema)
        .into_iter()
        .filter_map(|name| {
            let value = non_null(prior.get(name))?;
            let shown = match schema.block.attributes.get(name) {
                Some(attr) => display_value(attr, value),
                None => value.clone(),
            };
            Some(AttributeChange::removed(name, shown))
        })
        .collect();

    debug!(changes = changes.len(), "planned delete");
    PlanResult::with_changes(Value::Null, changes, false)
}

fn plan_update(schema: &Schema, prior: &Value, proposed: &Value) -> PlanResult {
    let mut planned = Map::new();
    let mut changes = Vec::new();
    let mut requires_replace = false;

    for name in sorted_keys(schema) {
        let before = prior.get(name).cloned().unwrap_or(Value::Null);
        let after = proposed.get(name).cloned().unwrap_or(Value::Null);

        let attr = match schema.block.attributes.get(name) {
            Some(attr) => attr,
            None => {
                // Nested blocks compare as whole values
                if before != after {
                    changes.push(change(name, None, &before, &after));
                }
                planned.insert(name.to_string(), after);
                continue;
            },
        };

        if !attr.flags.is_configurable() {
            planned.insert(name.to_string(), before);
            continue;
        }

        if let Some(rule) = &attr.secret_digest {
            if secret_unchanged(name, rule, prior, proposed, &before, &after) {
                planned.insert(name.to_string(), before);
                continue;
            }
        }

        if before != after {
            if attr.force_new {
                requires_replace = true;
            }
            changes.push(change(name, Some(attr), &before, &after));
        }
        planned.insert(name.to_string(), after);
    }

    if changes.is_empty() {
        return PlanResult::no_change(Value::Object(planned));
    }

    debug!(changes = changes.len(), requires_replace, "planned update");
    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

/// Whether a digest-aware attribute is unchanged despite differing text.
fn secret_unchanged(
    name: &str,
    rule: &SecretDigestRule,
    prior: &Value,
    proposed: &Value,
    before: &Value,
    after: &Value,
) -> bool {
    let (Some(stored), Some(candidate)) = (before.as_str(), after.as_str()) else {
        return false;
    };

    let declared_type = match lookup_str(&rule.type_attribute, proposed, prior)
        .and_then(|t| t.parse::<PropertyType>().ok())
    {
        Some(t) => t,
        None => return stored == candidate,
    };

    let mut scope_path = Vec::with_capacity(rule.scope_attributes.len());
    for scope_attr in &rule.scope_attributes {
        match lookup_str(scope_attr, proposed, prior) {
            Some(part) => scope_path.push(part.to_string()),
            None => return stored == candidate,
        }
    }

    if scope_path.iter().any(|part| part.contains(SCOPE_SEPARATOR)) {
        warn!(
            attribute = name,
            "scope component contains '{}'; digests of distinct properties may collide",
            SCOPE_SEPARATOR
        );
    }

    let descriptor = SecretDescriptor::new(declared_type, scope_path);
    let unchanged = should_suppress_diff(&descriptor, candidate, stored);
    if unchanged && declared_type.is_secure() {
        debug!(attribute = name, "secure value matches stored digest");
    }
    unchanged
}

fn lookup_str<'a>(name: &str, proposed: &'a Value, prior: &'a Value) -> Option<&'a str> {
    proposed
        .get(name)
        .and_then(Value::as_str)
        .or_else(|| prior.get(name).and_then(Value::as_str))
}

fn change(name: &str, attr: Option<&Attribute>, before: &Value, after: &Value) -> AttributeChange {
    let shown = |v: &Value| match attr {
        Some(attr) => display_value(attr, v),
        None => v.clone(),
    };
    match (non_null(Some(before)), non_null(Some(after))) {
        (None, Some(a)) => AttributeChange::added(name, shown(a)),
        (Some(b), None) => AttributeChange::removed(name, shown(b)),
        _ => AttributeChange::modified(name, shown(before), shown(after)),
    }
}

fn display_value(attr: &Attribute, value: &Value) -> Value {
    if attr.flags.sensitive {
        Value::String(SENSITIVE_PLACEHOLDER.to_string())
    } else {
        value.clone()
    }
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn sorted_keys(schema: &Schema) -> Vec<&str> {
    let mut keys: Vec<&str> = schema
        .block
        .attributes
        .keys()
        .chain(schema.block.blocks.keys())
        .map(String::as_str)
        .collect();
    keys.sort_unstable();
    keys
}
