//! Fault-injecting store wrapper for testing degraded lookups and store
//! failures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duroscope::HistoryEventRaw;
use duroscope::providers::{InstanceStore, InstanceStream, ListInstancesRequest, ProviderError};
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

/// Wraps a store and fails selected calls on demand.
///
/// Every switch stays on until cleared, so a test can show that a later call
/// succeeds once the fault is gone.
pub struct FaultInjectingStore {
    inner: Arc<dyn InstanceStore>,
    fail_list_instances: AtomicBool,
    /// Fail the instance stream after this many records (0 = never).
    fail_list_instances_after: AtomicUsize,
    fail_list_entities: AtomicBool,
    /// Fail the entity stream after this many records (0 = never).
    fail_list_entities_after: AtomicUsize,
    fail_parent_lookup: AtomicBool,
    fail_sub_orchestration_lookup: AtomicBool,
    fail_history_for: Mutex<HashSet<String>>,
    /// Cancelled when history for the named instance is read.
    cancel_on_history: Mutex<Option<(String, CancellationToken)>>,
    cancel_on_sub_orchestration_lookup: Mutex<Option<CancellationToken>>,
}

impl FaultInjectingStore {
    pub fn new(inner: Arc<dyn InstanceStore>) -> Self {
        Self {
            inner,
            fail_list_instances: AtomicBool::new(false),
            fail_list_instances_after: AtomicUsize::new(0),
            fail_list_entities: AtomicBool::new(false),
            fail_list_entities_after: AtomicUsize::new(0),
            fail_parent_lookup: AtomicBool::new(false),
            fail_sub_orchestration_lookup: AtomicBool::new(false),
            fail_history_for: Mutex::new(HashSet::new()),
            cancel_on_history: Mutex::new(None),
            cancel_on_sub_orchestration_lookup: Mutex::new(None),
        }
    }

    pub fn fail_list_instances(&self, on: bool) {
        self.fail_list_instances.store(on, Ordering::SeqCst);
    }

    pub fn fail_list_instances_after(&self, records: usize) {
        self.fail_list_instances_after.store(records, Ordering::SeqCst);
    }

    pub fn fail_list_entities(&self, on: bool) {
        self.fail_list_entities.store(on, Ordering::SeqCst);
    }

    pub fn fail_list_entities_after(&self, records: usize) {
        self.fail_list_entities_after.store(records, Ordering::SeqCst);
    }

    pub fn fail_parent_lookup(&self, on: bool) {
        self.fail_parent_lookup.store(on, Ordering::SeqCst);
    }

    pub fn fail_sub_orchestration_lookup(&self, on: bool) {
        self.fail_sub_orchestration_lookup.store(on, Ordering::SeqCst);
    }

    pub fn fail_history_for(&self, instance_id: &str) {
        self.fail_history_for.lock().unwrap().insert(instance_id.to_string());
    }

    /// Cancel `token` when history for `instance_id` is read. The read itself
    /// still succeeds.
    pub fn cancel_on_history_of(&self, instance_id: &str, token: CancellationToken) {
        *self.cancel_on_history.lock().unwrap() = Some((instance_id.to_string(), token));
    }

    /// Cancel `token` on the next child-id lookup. The lookup itself still
    /// succeeds.
    pub fn cancel_on_sub_orchestration_lookup(&self, token: CancellationToken) {
        *self.cancel_on_sub_orchestration_lookup.lock().unwrap() = Some(token);
    }

    pub fn clear_injections(&self) {
        self.fail_list_instances.store(false, Ordering::SeqCst);
        self.fail_list_instances_after.store(0, Ordering::SeqCst);
        self.fail_list_entities.store(false, Ordering::SeqCst);
        self.fail_list_entities_after.store(0, Ordering::SeqCst);
        self.fail_parent_lookup.store(false, Ordering::SeqCst);
        self.fail_sub_orchestration_lookup.store(false, Ordering::SeqCst);
        self.fail_history_for.lock().unwrap().clear();
        *self.cancel_on_history.lock().unwrap() = None;
        *self.cancel_on_sub_orchestration_lookup.lock().unwrap() = None;
    }
}

/// Pass `records` items through, then yield one error and stop.
fn fail_after(stream: InstanceStream, records: usize, operation: &'static str) -> InstanceStream {
    if records == 0 {
        return stream;
    }
    stream
        .take(records)
        .chain(futures::stream::once(async move {
            Err(ProviderError::retryable(operation, "injected stream failure"))
        }))
        .boxed()
}

#[async_trait]
impl InstanceStore for FaultInjectingStore {
    async fn list_instances(&self, request: &ListInstancesRequest) -> Result<InstanceStream, ProviderError> {
        if self.fail_list_instances.load(Ordering::SeqCst) {
            return Err(ProviderError::retryable("list_instances", "injected: store unreachable"));
        }
        let stream = self.inner.list_instances(request).await?;
        Ok(fail_after(
            stream,
            self.fail_list_instances_after.load(Ordering::SeqCst),
            "list_instances",
        ))
    }

    async fn list_entities(
        &self,
        time_from: Option<DateTime<Utc>>,
        time_till: Option<DateTime<Utc>>,
    ) -> Result<InstanceStream, ProviderError> {
        if self.fail_list_entities.load(Ordering::SeqCst) {
            return Err(ProviderError::not_supported("list_entities"));
        }
        let stream = self.inner.list_entities(time_from, time_till).await?;
        Ok(fail_after(
            stream,
            self.fail_list_entities_after.load(Ordering::SeqCst),
            "list_entities",
        ))
    }

    async fn get_history(&self, instance_id: &str) -> Result<Vec<HistoryEventRaw>, ProviderError> {
        if self.fail_history_for.lock().unwrap().contains(instance_id) {
            return Err(ProviderError::retryable("get_history", "injected: history unavailable"));
        }
        if let Some((id, token)) = self.cancel_on_history.lock().unwrap().as_ref() {
            if id == instance_id {
                token.cancel();
            }
        }
        self.inner.get_history(instance_id).await
    }

    async fn get_parent_instance_id(&self, instance_id: &str) -> Result<Option<String>, ProviderError> {
        if self.fail_parent_lookup.load(Ordering::SeqCst) {
            return Err(ProviderError::retryable("get_parent_instance_id", "injected: lookup failed"));
        }
        self.inner.get_parent_instance_id(instance_id).await
    }

    async fn find_sub_orchestration_id(
        &self,
        parent_instance_id: &str,
        task_id: i64,
    ) -> Result<Option<String>, ProviderError> {
        if self.fail_sub_orchestration_lookup.load(Ordering::SeqCst) {
            return Err(ProviderError::retryable(
                "find_sub_orchestration_id",
                "injected: lookup failed",
            ));
        }
        if let Some(token) = self.cancel_on_sub_orchestration_lookup.lock().unwrap().as_ref() {
            token.cancel();
        }
        self.inner.find_sub_orchestration_id(parent_instance_id, task_id).await
    }
}
