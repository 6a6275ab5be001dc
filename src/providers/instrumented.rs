//! Instrumented store wrapper that counts and times collaborator calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{InstanceStore, InstanceStream, ListInstancesRequest, ProviderError};
use crate::history::HistoryEventRaw;

/// Point-in-time copy of the wrapper's counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StoreMetricsSnapshot {
    pub list_instances_calls: u64,
    pub list_entities_calls: u64,
    pub get_history_calls: u64,
    pub get_parent_instance_id_calls: u64,
    pub find_sub_orchestration_id_calls: u64,
    pub errors: u64,
    /// Sum of call latencies in microseconds.
    pub total_latency_us: u64,
}

#[derive(Default)]
struct Counters {
    list_instances: AtomicU64,
    list_entities: AtomicU64,
    get_history: AtomicU64,
    get_parent_instance_id: AtomicU64,
    find_sub_orchestration_id: AtomicU64,
    errors: AtomicU64,
    total_latency_us: AtomicU64,
}

/// Wrapper that adds call accounting to any [`InstanceStore`].
///
/// Follows the decorator pattern: every collaborator call is forwarded to the
/// inner store, then counted, timed, and logged at `debug` (`warn` on error).
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use duroscope::providers::in_memory::InMemoryInstanceStore;
/// use duroscope::providers::instrumented::InstrumentedStore;
///
/// let store = Arc::new(InstrumentedStore::new(Arc::new(InMemoryInstanceStore::new())));
/// assert_eq!(store.snapshot().list_instances_calls, 0);
/// ```
pub struct InstrumentedStore {
    inner: Arc<dyn InstanceStore>,
    counters: Counters,
}

impl InstrumentedStore {
    pub fn new(inner: Arc<dyn InstanceStore>) -> Self {
        Self {
            inner,
            counters: Counters::default(),
        }
    }

    pub fn snapshot(&self) -> StoreMetricsSnapshot {
        let c = &self.counters;
        StoreMetricsSnapshot {
            list_instances_calls: c.list_instances.load(Ordering::Relaxed),
            list_entities_calls: c.list_entities.load(Ordering::Relaxed),
            get_history_calls: c.get_history.load(Ordering::Relaxed),
            get_parent_instance_id_calls: c.get_parent_instance_id.load(Ordering::Relaxed),
            find_sub_orchestration_id_calls: c.find_sub_orchestration_id.load(Ordering::Relaxed),
            errors: c.errors.load(Ordering::Relaxed),
            total_latency_us: c.total_latency_us.load(Ordering::Relaxed),
        }
    }

    #[inline]
    fn record_operation<T>(
        &self,
        operation: &str,
        counter: &AtomicU64,
        duration: Duration,
        result: &Result<T, ProviderError>,
    ) {
        counter.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.counters.total_latency_us.fetch_add(micros, Ordering::Relaxed);
        match result {
            Ok(_) => debug!(operation, duration_us = micros, "store call"),
            Err(e) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                warn!(operation, duration_us = micros, retryable = e.is_retryable(), error = %e, "store call failed");
            }
        }
    }
}

#[async_trait]
impl InstanceStore for InstrumentedStore {
    async fn list_instances(&self, request: &ListInstancesRequest) -> Result<InstanceStream, ProviderError> {
        let start = Instant::now();
        let result = self.inner.list_instances(request).await;
        self.record_operation("list_instances", &self.counters.list_instances, start.elapsed(), &result);
        result
    }

    async fn list_entities(
        &self,
        time_from: Option<DateTime<Utc>>,
        time_till: Option<DateTime<Utc>>,
    ) -> Result<InstanceStream, ProviderError> {
        let start = Instant::now();
        let result = self.inner.list_entities(time_from, time_till).await;
        self.record_operation("list_entities", &self.counters.list_entities, start.elapsed(), &result);
        result
    }

    async fn get_history(&self, instance_id: &str) -> Result<Vec<HistoryEventRaw>, ProviderError> {
        let start = Instant::now();
        let result = self.inner.get_history(instance_id).await;
        self.record_operation("get_history", &self.counters.get_history, start.elapsed(), &result);
        result
    }

    async fn get_parent_instance_id(&self, instance_id: &str) -> Result<Option<String>, ProviderError> {
        let start = Instant::now();
        let result = self.inner.get_parent_instance_id(instance_id).await;
        self.record_operation(
            "get_parent_instance_id",
            &self.counters.get_parent_instance_id,
            start.elapsed(),
            &result,
        );
        result
    }

    async fn find_sub_orchestration_id(
        &self,
        parent_instance_id: &str,
        task_id: i64,
    ) -> Result<Option<String>, ProviderError> {
        let start = Instant::now();
        let result = self.inner.find_sub_orchestration_id(parent_instance_id, task_id).await;
        self.record_operation(
            "find_sub_orchestration_id",
            &self.counters.find_sub_orchestration_id,
            start.elapsed(),
            &result,
        );
        result
    }
}
