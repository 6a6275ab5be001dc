//! Instance records surfaced by the query engine.
//!
//! An [`InstanceRecord`] is built fresh for every query from whatever shape the
//! backing store hands back. Classification into orchestration vs. entity is
//! derived from the instance id alone; the lazily populated fields
//! (`parent_instance_id`, `last_event`) are filled by the status expander.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Synthetic status callers pass to ask for durable entities.
pub const DURABLE_ENTITIES_STATUS: &str = "DurableEntities";

/// Runtime status of an orchestration instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuntimeStatus {
    Running,
    Completed,
    Failed,
    Terminated,
    Pending,
    ContinuedAsNew,
    Suspended,
}

impl RuntimeStatus {
    pub const ALL: [RuntimeStatus; 7] = [
        RuntimeStatus::Running,
        RuntimeStatus::Completed,
        RuntimeStatus::Failed,
        RuntimeStatus::Terminated,
        RuntimeStatus::Pending,
        RuntimeStatus::ContinuedAsNew,
        RuntimeStatus::Suspended,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeStatus::Running => "Running",
            RuntimeStatus::Completed => "Completed",
            RuntimeStatus::Failed => "Failed",
            RuntimeStatus::Terminated => "Terminated",
            RuntimeStatus::Pending => "Pending",
            RuntimeStatus::ContinuedAsNew => "ContinuedAsNew",
            RuntimeStatus::Suspended => "Suspended",
        }
    }

    /// Case-insensitive lookup. Returns `None` for unknown names, including
    /// the synthetic [`DURABLE_ENTITIES_STATUS`].
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|status| status.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a record is a workflow instance or a durable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntityKind {
    #[default]
    Orchestration,
    DurableEntity,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Orchestration => "Orchestration",
            EntityKind::DurableEntity => "DurableEntity",
        }
    }
}

/// Address of a durable entity: `@<name>@<key>` in instance-id form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId {
    pub name: String,
    pub key: String,
}

impl EntityId {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }

    /// Parse an entity id out of an instance id.
    ///
    /// The id must start with `@` and contain a second `@` separating a
    /// non-empty name from the key. Anything else is an orchestration id.
    pub fn parse(instance_id: &str) -> Option<Self> {
        let rest = instance_id.strip_prefix('@')?;
        let (name, key) = rest.split_once('@')?;
        if name.is_empty() {
            return None;
        }
        Some(Self::new(name, key))
    }

    pub fn to_instance_id(&self) -> String {
        format!("@{}@{}", self.name, self.key)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}@{}", self.name, self.key)
    }
}

/// One orchestration instance or entity, as listed by the query engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub instance_id: String,
    pub name: String,
    pub created_time: DateTime<Utc>,
    pub last_updated_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_status: Option<Value>,
    pub runtime_status: RuntimeStatus,
    #[serde(default)]
    pub entity_kind: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event: Option<String>,
}

impl InstanceRecord {
    /// Create a record with no payloads. `last_updated_time` starts equal to
    /// `created_time`.
    pub fn new(
        instance_id: impl Into<String>,
        name: impl Into<String>,
        created_time: DateTime<Utc>,
        runtime_status: RuntimeStatus,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            name: name.into(),
            created_time,
            last_updated_time: created_time,
            input: None,
            output: None,
            custom_status: None,
            runtime_status,
            entity_kind: EntityKind::Orchestration,
            entity_id: None,
            parent_instance_id: None,
            last_event: None,
        }
    }

    pub fn with_last_updated_time(mut self, at: DateTime<Utc>) -> Self {
        self.last_updated_time = at;
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_custom_status(mut self, custom_status: Value) -> Self {
        self.custom_status = Some(custom_status);
        self
    }

    /// Derive `entity_kind`/`entity_id` from the instance id shape.
    ///
    /// Entities always report `Running`; orchestrations never carry an entity id.
    pub fn classify(&mut self) {
        match EntityId::parse(&self.instance_id) {
            Some(entity_id) => {
                self.entity_kind = EntityKind::DurableEntity;
                self.entity_id = Some(entity_id);
                self.runtime_status = RuntimeStatus::Running;
            }
            None => {
                self.entity_kind = EntityKind::Orchestration;
                self.entity_id = None;
            }
        }
    }

    /// Force the record into entity shape regardless of its id.
    ///
    /// Used for records coming from the entity listing, whose ids may already
    /// be in `@name@key` form or may be bare entity names.
    pub fn into_entity(mut self) -> Self {
        let entity_id = EntityId::parse(&self.instance_id)
            .unwrap_or_else(|| EntityId::new(self.name.clone(), self.instance_id.clone()));
        self.instance_id = entity_id.to_instance_id();
        self.entity_kind = EntityKind::DurableEntity;
        self.entity_id = Some(entity_id);
        self.runtime_status = RuntimeStatus::Running;
        self.parent_instance_id = None;
        self
    }

    pub fn is_entity(&self) -> bool {
        self.entity_kind == EntityKind::DurableEntity
    }

    /// Drop payload fields the caller did not ask for.
    pub fn strip_payloads(&mut self) {
        self.input = None;
        self.output = None;
        self.custom_status = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn entity_id_parses_name_and_key() {
        let id = EntityId::parse("@counter@user-42").unwrap();
        assert_eq!(id.name, "counter");
        assert_eq!(id.key, "user-42");
        assert_eq!(id.to_instance_id(), "@counter@user-42");

        // Key may itself contain the separator.
        let id = EntityId::parse("@cart@a@b").unwrap();
        assert_eq!(id.key, "a@b");
    }

    #[test]
    fn non_entity_ids_are_rejected() {
        assert!(EntityId::parse("order-1").is_none());
        assert!(EntityId::parse("@missing-key").is_none());
        assert!(EntityId::parse("@@key").is_none());
        assert!(EntityId::parse("order@1").is_none());
    }

    #[test]
    fn classify_forces_entities_running() {
        let mut rec = InstanceRecord::new("@counter@k", "counter", t0(), RuntimeStatus::Completed);
        rec.classify();
        assert!(rec.is_entity());
        assert_eq!(rec.runtime_status, RuntimeStatus::Running);
        assert_eq!(rec.entity_id, Some(EntityId::new("counter", "k")));

        let mut rec = InstanceRecord::new("order-1", "Order", t0(), RuntimeStatus::Failed);
        rec.entity_id = Some(EntityId::new("bogus", "x"));
        rec.classify();
        assert!(!rec.is_entity());
        assert_eq!(rec.entity_id, None);
        assert_eq!(rec.runtime_status, RuntimeStatus::Failed);
    }

    #[test]
    fn into_entity_builds_instance_id_from_bare_name() {
        let rec = InstanceRecord::new("k1", "counter", t0(), RuntimeStatus::Pending).into_entity();
        assert_eq!(rec.instance_id, "@counter@k1");
        assert_eq!(rec.runtime_status, RuntimeStatus::Running);
        assert_eq!(rec.entity_kind, EntityKind::DurableEntity);
    }

    #[test]
    fn runtime_status_parse_is_case_insensitive() {
        assert_eq!(RuntimeStatus::parse("running"), Some(RuntimeStatus::Running));
        assert_eq!(RuntimeStatus::parse(" ContinuedAsNew "), Some(RuntimeStatus::ContinuedAsNew));
        assert_eq!(RuntimeStatus::parse(DURABLE_ENTITIES_STATUS), None);
    }

    #[test]
    fn record_serializes_camel_case() {
        let rec = InstanceRecord::new("order-1", "Order", t0(), RuntimeStatus::Running);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["instanceId"], "order-1");
        assert_eq!(json["runtimeStatus"], "Running");
        assert_eq!(json["entityKind"], "Orchestration");
        assert!(json.get("parentInstanceId").is_none());
    }
}
