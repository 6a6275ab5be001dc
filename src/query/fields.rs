//! Field access by name.
//!
//! Filters and sort keys arrive as untyped field names. Each record type maps
//! the names it understands to a typed accessor through a closed lookup table
//! ([`Queryable::accessor`]); names outside the table resolve to `None`, which
//! every stage treats as "no-op". Names are matched ignoring ASCII case so a
//! caller can write `createdtime` or `CreatedTime` for `createdTime`.

use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::history::DisplayHistoryEvent;
use crate::model::InstanceRecord;

/// Value of a named field, typed just enough to compare it.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    /// Field has no value on this record.
    Absent,
    Text(&'a str),
    Integer(i64),
    Time(DateTime<Utc>),
    /// A non-primitive value, already rendered to text.
    Structured(String),
}

impl<'a> FieldValue<'a> {
    /// Map an opaque JSON payload onto a field value. JSON strings render
    /// without quotes, `null` is absent, everything else renders as JSON text.
    pub fn from_json(value: Option<&'a Value>) -> Self {
        match value {
            None | Some(Value::Null) => FieldValue::Absent,
            Some(Value::String(s)) => FieldValue::Text(s),
            Some(other) => FieldValue::Structured(other.to_string()),
        }
    }

    pub fn from_opt_str(value: Option<&'a str>) -> Self {
        value.map_or(FieldValue::Absent, FieldValue::Text)
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    /// Text rendering used by the string-coercion fallback.
    pub fn render(&self) -> String {
        match self {
            FieldValue::Absent => String::new(),
            FieldValue::Text(s) => (*s).to_string(),
            FieldValue::Integer(n) => n.to_string(),
            FieldValue::Time(t) => t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            FieldValue::Structured(s) => s.clone(),
        }
    }

    /// Absent values and empty text count as empty for `null` comparisons.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Absent => true,
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Structured(s) => s.is_empty(),
            FieldValue::Integer(_) | FieldValue::Time(_) => false,
        }
    }

    /// Total order used for sorting.
    ///
    /// Absent values sort first. Integers and timestamps compare natively when
    /// both sides have the same type; every other pairing compares the text
    /// renderings.
    pub fn compare(&self, other: &FieldValue<'_>) -> Ordering {
        match (self, other) {
            (FieldValue::Absent, FieldValue::Absent) => Ordering::Equal,
            (FieldValue::Absent, _) => Ordering::Less,
            (_, FieldValue::Absent) => Ordering::Greater,
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a.cmp(b),
            (FieldValue::Time(a), FieldValue::Time(b)) => a.cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
            (a, b) => a.render().cmp(&b.render()),
        }
    }
}

/// Typed accessor for one named field of `T`.
pub type Accessor<T> = for<'r> fn(&'r T) -> FieldValue<'r>;

/// Records that can be filtered and sorted by field name.
pub trait Queryable: Sized {
    /// Resolve `name` to an accessor, or `None` if `T` has no such field.
    fn accessor(name: &str) -> Option<Accessor<Self>>;

    /// Logical field names understood by [`Queryable::accessor`].
    fn field_names() -> &'static [&'static str];

    /// Read a field by name; `None` when the name is unknown.
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        Self::accessor(name).map(|get| get(self))
    }
}

fn canonical(names: &[&'static str], name: &str) -> Option<&'static str> {
    let name = name.trim();
    names.iter().copied().find(|candidate| candidate.eq_ignore_ascii_case(name))
}

const INSTANCE_FIELDS: &[&str] = &[
    "instanceId",
    "name",
    "createdTime",
    "lastUpdatedTime",
    "input",
    "output",
    "customStatus",
    "runtimeStatus",
    "entityType",
    "entityKind",
    "entityId",
    "parentInstanceId",
    "lastEvent",
];

impl Queryable for InstanceRecord {
    fn accessor(name: &str) -> Option<Accessor<Self>> {
        let get: Accessor<Self> = match canonical(INSTANCE_FIELDS, name)? {
            "instanceId" => |r| FieldValue::Text(&r.instance_id),
            "name" => |r| FieldValue::Text(&r.name),
            "createdTime" => |r| FieldValue::Time(r.created_time),
            "lastUpdatedTime" => |r| FieldValue::Time(r.last_updated_time),
            "input" => |r| FieldValue::from_json(r.input.as_ref()),
            "output" => |r| FieldValue::from_json(r.output.as_ref()),
            "customStatus" => |r| FieldValue::from_json(r.custom_status.as_ref()),
            "runtimeStatus" => |r| FieldValue::Text(r.runtime_status.as_str()),
            "entityType" | "entityKind" => |r| FieldValue::Text(r.entity_kind.as_str()),
            "entityId" => |r| match &r.entity_id {
                Some(id) => FieldValue::Structured(id.to_string()),
                None => FieldValue::Absent,
            },
            "parentInstanceId" => |r| FieldValue::from_opt_str(r.parent_instance_id.as_deref()),
            "lastEvent" => |r| FieldValue::from_opt_str(r.last_event.as_deref()),
            _ => return None,
        };
        Some(get)
    }

    fn field_names() -> &'static [&'static str] {
        INSTANCE_FIELDS
    }
}

const HISTORY_FIELDS: &[&str] = &[
    "timestamp",
    "eventType",
    "eventId",
    "name",
    "scheduledTime",
    "result",
    "details",
    "subOrchestrationId",
    "durationInMs",
];

impl Queryable for DisplayHistoryEvent {
    fn accessor(name: &str) -> Option<Accessor<Self>> {
        let get: Accessor<Self> = match canonical(HISTORY_FIELDS, name)? {
            "timestamp" => |e| FieldValue::Time(e.timestamp),
            "eventType" => |e| FieldValue::Text(e.event_type.as_str()),
            "eventId" => |e| e.event_id.map_or(FieldValue::Absent, FieldValue::Integer),
            "name" => |e| FieldValue::from_opt_str(e.name.as_deref()),
            "scheduledTime" => |e| e.scheduled_time.map_or(FieldValue::Absent, FieldValue::Time),
            "result" => |e| FieldValue::from_opt_str(e.result.as_deref()),
            "details" => |e| FieldValue::from_opt_str(e.details.as_deref()),
            "subOrchestrationId" => |e| FieldValue::from_opt_str(e.sub_orchestration_id.as_deref()),
            "durationInMs" => |e| e.duration_in_ms.map_or(FieldValue::Absent, FieldValue::Integer),
            _ => return None,
        };
        Some(get)
    }

    fn field_names() -> &'static [&'static str] {
        HISTORY_FIELDS
    }
}

/// Canonical spelling of `name` if any queryable record type has that field.
pub fn known_field(name: &str) -> Option<&'static str> {
    canonical(INSTANCE_FIELDS, name).or_else(|| canonical(HISTORY_FIELDS, name))
}

/// Whether two caller-supplied field names refer to the same logical field.
pub fn same_field<T: Queryable>(a: &str, b: &str) -> bool {
    match (canonical(T::field_names(), a), canonical(T::field_names(), b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
