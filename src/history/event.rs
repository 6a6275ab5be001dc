//! Raw event-log rows and the display events derived from them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event types the correlator understands. Rows of any other type are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    ExecutionStarted,
    ExecutionCompleted,
    ExecutionFailed,
    ExecutionTerminated,
    TaskScheduled,
    TaskCompleted,
    TaskFailed,
    SubOrchestrationInstanceCreated,
    SubOrchestrationInstanceCompleted,
    SubOrchestrationInstanceFailed,
    ContinueAsNew,
    TimerCreated,
    TimerFired,
    EventRaised,
    EventSent,
}

impl EventType {
    pub const ALL: [EventType; 15] = [
        EventType::ExecutionStarted,
        EventType::ExecutionCompleted,
        EventType::ExecutionFailed,
        EventType::ExecutionTerminated,
        EventType::TaskScheduled,
        EventType::TaskCompleted,
        EventType::TaskFailed,
        EventType::SubOrchestrationInstanceCreated,
        EventType::SubOrchestrationInstanceCompleted,
        EventType::SubOrchestrationInstanceFailed,
        EventType::ContinueAsNew,
        EventType::TimerCreated,
        EventType::TimerFired,
        EventType::EventRaised,
        EventType::EventSent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ExecutionStarted => "ExecutionStarted",
            EventType::ExecutionCompleted => "ExecutionCompleted",
            EventType::ExecutionFailed => "ExecutionFailed",
            EventType::ExecutionTerminated => "ExecutionTerminated",
            EventType::TaskScheduled => "TaskScheduled",
            EventType::TaskCompleted => "TaskCompleted",
            EventType::TaskFailed => "TaskFailed",
            EventType::SubOrchestrationInstanceCreated => "SubOrchestrationInstanceCreated",
            EventType::SubOrchestrationInstanceCompleted => "SubOrchestrationInstanceCompleted",
            EventType::SubOrchestrationInstanceFailed => "SubOrchestrationInstanceFailed",
            EventType::ContinueAsNew => "ContinueAsNew",
            EventType::TimerCreated => "TimerCreated",
            EventType::TimerFired => "TimerFired",
            EventType::EventRaised => "EventRaised",
            EventType::EventSent => "EventSent",
        }
    }

    /// Exact-name lookup; event types in the log are machine written.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Rows that start a unit of work and may be paired with a completion.
    pub fn is_schedule(&self) -> bool {
        matches!(self, EventType::TaskScheduled | EventType::SubOrchestrationInstanceCreated)
    }

    /// Rows that finish a unit of work started by a schedule row.
    pub fn is_completion(&self) -> bool {
        matches!(
            self,
            EventType::TaskCompleted
                | EventType::TaskFailed
                | EventType::SubOrchestrationInstanceCompleted
                | EventType::SubOrchestrationInstanceFailed
        )
    }

    /// Whether `completion` can close a unit of work opened by `self`.
    pub fn is_completed_by(&self, completion: EventType) -> bool {
        match self {
            EventType::TaskScheduled => matches!(completion, EventType::TaskCompleted | EventType::TaskFailed),
            EventType::SubOrchestrationInstanceCreated => matches!(
                completion,
                EventType::SubOrchestrationInstanceCompleted | EventType::SubOrchestrationInstanceFailed
            ),
            _ => false,
        }
    }

    pub fn is_sub_orchestration(&self) -> bool {
        matches!(
            self,
            EventType::SubOrchestrationInstanceCreated
                | EventType::SubOrchestrationInstanceCompleted
                | EventType::SubOrchestrationInstanceFailed
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of an instance's event log.
///
/// `result_payload` and `details_payload` hold payload text the store has
/// already resolved from its external payload references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEventRaw {
    pub instance_id: String,
    pub execution_id: String,
    pub task_hub: String,
    pub task_id: Option<i64>,
    pub sequence_number: u64,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub result_payload: Option<String>,
    #[serde(default)]
    pub details_payload: Option<String>,
    /// Set on `ExecutionStarted` rows of sub-orchestrations.
    #[serde(default)]
    pub parent_instance_id: Option<String>,
}

impl HistoryEventRaw {
    pub fn new(
        instance_id: impl Into<String>,
        execution_id: impl Into<String>,
        sequence_number: u64,
        event_type: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            execution_id: execution_id.into(),
            task_hub: String::new(),
            task_id: None,
            sequence_number,
            event_type: event_type.into(),
            timestamp,
            name: None,
            result_payload: None,
            details_payload: None,
            parent_instance_id: None,
        }
    }

    pub fn with_task_hub(mut self, task_hub: impl Into<String>) -> Self {
        self.task_hub = task_hub.into();
        self
    }

    pub fn with_task_id(mut self, task_id: i64) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result_payload = Some(result.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details_payload = Some(details.into());
        self
    }

    pub fn with_parent_instance_id(mut self, parent: impl Into<String>) -> Self {
        self.parent_instance_id = Some(parent.into());
        self
    }

    /// The recognized event type, or `None` for rows the correlator ignores.
    pub fn kind(&self) -> Option<EventType> {
        EventType::parse(&self.event_type)
    }
}

/// A display-ready history event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayHistoryEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub event_id: Option<i64>,
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_orchestration_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_in_ms: Option<i64>,
}

impl DisplayHistoryEvent {
    /// Copy a raw row as-is; no schedule correlation.
    pub(crate) fn from_row(row: &HistoryEventRaw, event_type: EventType) -> Self {
        Self {
            timestamp: row.timestamp,
            event_type,
            event_id: row.task_id,
            name: row.name.clone(),
            scheduled_time: None,
            result: row.result_payload.clone(),
            details: row.details_payload.clone(),
            sub_orchestration_id: None,
            duration_in_ms: None,
        }
    }

    /// Whether the event originated from a sub-orchestration schedule row and
    /// can be linked to a child instance.
    pub fn wants_sub_orchestration_id(&self) -> bool {
        self.event_type.is_sub_orchestration() && self.event_id.is_some() && self.sub_orchestration_id.is_none()
    }
}
