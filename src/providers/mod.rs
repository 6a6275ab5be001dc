//! Collaborator contract between the query engine and a backing store.
//!
//! The engine owns no persistence. Everything it reads comes through
//! [`InstanceStore`]: lazy streams of instance records, an instance's event
//! log, and the cross-instance lookups used to link parents and children.
//! Store-side filtering is an optimization only; the engine re-applies the
//! caller's filter to whatever comes back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::history::HistoryEventRaw;
use crate::model::{InstanceRecord, RuntimeStatus};

pub mod error;
pub mod in_memory;
pub mod instrumented;

pub use error::ProviderError;

/// Lazily pulled sequence of instance records.
pub type InstanceStream = BoxStream<'static, Result<InstanceRecord, ProviderError>>;

/// Store-level hints for [`InstanceStore::list_instances`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListInstancesRequest {
    /// Only instances created at or after this time.
    pub time_from: Option<DateTime<Utc>>,
    /// Only instances created at or before this time.
    pub time_till: Option<DateTime<Utc>>,
    /// Whether to load `input`, `output` and `custom_status`.
    pub include_input_output: bool,
    /// Only instances in one of these statuses; empty means any.
    pub statuses: Vec<RuntimeStatus>,
}

/// Read-only access to instance state and history.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Stream raw instance records. Records may be returned in any shape the
    /// store has, including entity-shaped ids; the engine classifies them.
    async fn list_instances(&self, request: &ListInstancesRequest) -> Result<InstanceStream, ProviderError>;

    /// Stream durable entities active within the time window.
    ///
    /// # Default
    ///
    /// Returns a permanent "not supported" error.
    async fn list_entities(
        &self,
        _time_from: Option<DateTime<Utc>>,
        _time_till: Option<DateTime<Utc>>,
    ) -> Result<InstanceStream, ProviderError> {
        Err(ProviderError::not_supported("list_entities"))
    }

    /// Read every event-log row of an instance, ordered by sequence number.
    async fn get_history(&self, instance_id: &str) -> Result<Vec<HistoryEventRaw>, ProviderError>;

    /// Look up the instance that started `instance_id` as a sub-orchestration.
    async fn get_parent_instance_id(&self, instance_id: &str) -> Result<Option<String>, ProviderError>;

    /// Find the child started by `parent_instance_id` for schedule task `task_id`.
    ///
    /// # Default
    ///
    /// Returns `Ok(None)` (store cannot link children).
    async fn find_sub_orchestration_id(
        &self,
        _parent_instance_id: &str,
        _task_id: i64,
    ) -> Result<Option<String>, ProviderError> {
        Ok(None)
    }
}
