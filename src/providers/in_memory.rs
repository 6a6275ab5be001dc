use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::Mutex;

use super::{InstanceStore, InstanceStream, ListInstancesRequest, ProviderError};
use crate::history::{EventType, HistoryEventRaw};
use crate::model::InstanceRecord;

fn in_window(at: DateTime<Utc>, from: Option<DateTime<Utc>>, till: Option<DateTime<Utc>>) -> bool {
    from.map_or(true, |from| at >= from) && till.map_or(true, |till| at <= till)
}

/// In-memory store for tests and local tooling.
///
/// Instances and entities are listed in insertion order. History rows are
/// returned in the order they were appended, which callers keep in
/// sequence-number order per execution.
pub struct InMemoryInstanceStore {
    instances: Mutex<Vec<InstanceRecord>>,
    entities: Mutex<Vec<InstanceRecord>>,
    history: Mutex<HashMap<String, Vec<HistoryEventRaw>>>,
    supports_entities: bool,
}

impl Default for InMemoryInstanceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryInstanceStore {
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(Vec::new()),
            entities: Mutex::new(Vec::new()),
            history: Mutex::new(HashMap::new()),
            supports_entities: true,
        }
    }

    /// A store whose `list_entities` fails like one without entity support.
    pub fn without_entities() -> Self {
        Self {
            supports_entities: false,
            ..Self::new()
        }
    }

    pub async fn insert_instance(&self, record: InstanceRecord) {
        self.instances.lock().await.push(record);
    }

    pub async fn insert_entity(&self, record: InstanceRecord) {
        self.entities.lock().await.push(record);
    }

    pub async fn append_history(&self, instance_id: &str, rows: Vec<HistoryEventRaw>) {
        self.history
            .lock()
            .await
            .entry(instance_id.to_string())
            .or_default()
            .extend(rows);
    }

    pub async fn reset(&self) {
        self.instances.lock().await.clear();
        self.entities.lock().await.clear();
        self.history.lock().await.clear();
    }
}

#[async_trait]
impl InstanceStore for InMemoryInstanceStore {
    async fn list_instances(&self, request: &ListInstancesRequest) -> Result<InstanceStream, ProviderError> {
        let g = self.instances.lock().await;
        let snapshot: Vec<InstanceRecord> = g
            .iter()
            .filter(|r| in_window(r.created_time, request.time_from, request.time_till))
            .filter(|r| request.statuses.is_empty() || request.statuses.contains(&r.runtime_status))
            .cloned()
            .map(|mut r| {
                if !request.include_input_output {
                    r.strip_payloads();
                }
                r
            })
            .collect();
        Ok(futures::stream::iter(snapshot.into_iter().map(Ok)).boxed())
    }

    async fn list_entities(
        &self,
        time_from: Option<DateTime<Utc>>,
        time_till: Option<DateTime<Utc>>,
    ) -> Result<InstanceStream, ProviderError> {
        if !self.supports_entities {
            return Err(ProviderError::not_supported("list_entities"));
        }
        let g = self.entities.lock().await;
        let snapshot: Vec<InstanceRecord> = g
            .iter()
            .filter(|r| in_window(r.last_updated_time, time_from, time_till))
            .cloned()
            .collect();
        Ok(futures::stream::iter(snapshot.into_iter().map(Ok)).boxed())
    }

    async fn get_history(&self, instance_id: &str) -> Result<Vec<HistoryEventRaw>, ProviderError> {
        let g = self.history.lock().await;
        Ok(g.get(instance_id).cloned().unwrap_or_default())
    }

    async fn get_parent_instance_id(&self, instance_id: &str) -> Result<Option<String>, ProviderError> {
        let g = self.history.lock().await;
        let parent = g.get(instance_id).and_then(|rows| {
            rows.iter()
                .rev()
                .find(|r| r.kind() == Some(EventType::ExecutionStarted))
                .and_then(|r| r.parent_instance_id.clone())
        });
        Ok(parent)
    }

    async fn find_sub_orchestration_id(
        &self,
        parent_instance_id: &str,
        task_id: i64,
    ) -> Result<Option<String>, ProviderError> {
        let g = self.history.lock().await;
        let child = g.iter().find_map(|(instance_id, rows)| {
            rows.iter()
                .any(|r| {
                    r.kind() == Some(EventType::ExecutionStarted)
                        && r.parent_instance_id.as_deref() == Some(parent_instance_id)
                        && r.task_id == Some(task_id)
                })
                .then(|| instance_id.clone())
        });
        Ok(child)
    }
}
