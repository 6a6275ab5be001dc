//! The query engine: instance listing and correlated history.
//!
//! Instance listing runs this pipeline over the store's lazy stream:
//!
//! ```text
//! list_instances -> classify -> status/time filter -> enrich (batched)
//!     -> field predicate -> [sort buffer] -> page
//! list_entities  -> entity shape -----------------------^
//! ```
//!
//! Without a sort the page is filled as records arrive and the store stream
//! is dropped once the page is full. With a sort, records are buffered up to
//! a bound before sorting and paging.
//!
//! Both operations observe a [`CancellationToken`]. A cancelled call stops
//! pulling and returns what it had already accepted.

use std::collections::HashSet;
use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::history::{DisplayHistoryEvent, correlate, resolve_sub_orchestrations};
use crate::model::InstanceRecord;
use crate::options::EngineOptions;
use crate::providers::{InstanceStore, InstanceStream, ListInstancesRequest, ProviderError};
use crate::query::fields::same_field;
use crate::query::{FilterClause, PageStep, Pager, Queryable, SortSpec, page, sort_records};

pub mod batch;
pub mod entities;
pub mod expander;

use batch::Batcher;
use expander::{EnrichmentPlan, StatusExpander};

/// An instance listing request.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub filter: FilterClause,
    /// Sort field; may embed the direction (`"createdTime desc"`).
    pub order_by: Option<String>,
    pub order_direction: Option<String>,
    pub skip: usize,
    /// Page size; `None` for everything after `skip`.
    pub top: Option<usize>,
    /// Columns the caller will not display.
    pub hidden_columns: HashSet<String>,
    pub include_input_output: bool,
    /// Bound on records buffered for sorting; falls back to
    /// [`EngineOptions::max_sort_buffer`].
    pub fetch_size: Option<usize>,
}

impl QueryRequest {
    pub fn new(filter: FilterClause) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn with_order_by(mut self, order_by: impl Into<String>, direction: Option<&str>) -> Self {
        self.order_by = Some(order_by.into());
        self.order_direction = direction.map(str::to_string);
        self
    }

    pub fn with_page(mut self, skip: usize, top: Option<usize>) -> Self {
        self.skip = skip;
        self.top = top;
        self
    }

    pub fn with_hidden_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden_columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// A correlated-history request. The filter's time range applies to event
/// timestamps; its status selection is ignored.
#[derive(Debug, Clone, Default)]
pub struct HistoryRequest {
    pub filter: FilterClause,
    pub order_by: Option<String>,
    pub order_direction: Option<String>,
    pub skip: usize,
    pub top: Option<usize>,
}

impl HistoryRequest {
    pub fn new(filter: FilterClause) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn with_order_by(mut self, order_by: impl Into<String>, direction: Option<&str>) -> Self {
        self.order_by = Some(order_by.into());
        self.order_direction = direction.map(str::to_string);
        self
    }

    pub fn with_page(mut self, skip: usize, top: Option<usize>) -> Self {
        self.skip = skip;
        self.top = top;
        self
    }
}

/// Payload fields the store omits unless asked for them.
const PAYLOAD_FIELDS: [&str; 3] = ["input", "output", "customStatus"];

fn is_payload_field(name: &str) -> bool {
    PAYLOAD_FIELDS.iter().any(|p| same_field::<InstanceRecord>(name, p))
}

/// Where accepted records go: straight into a page, or into a bounded sort
/// buffer.
enum Collector<T> {
    Paged {
        pager: Pager,
        out: Vec<T>,
    },
    Sorted {
        sort: SortSpec,
        limit: usize,
        buffer: Vec<T>,
        skip: usize,
        top: Option<usize>,
    },
}

impl<T: Queryable> Collector<T> {
    fn new(sort: Option<SortSpec>, skip: usize, top: Option<usize>, limit: usize) -> Self {
        match sort {
            None => Collector::Paged {
                pager: Pager::new(skip, top),
                out: Vec::new(),
            },
            Some(sort) => Collector::Sorted {
                sort,
                limit,
                buffer: Vec::new(),
                skip,
                top,
            },
        }
    }

    fn sort_field(&self) -> Option<&str> {
        match self {
            Collector::Paged { .. } => None,
            Collector::Sorted { sort, .. } => Some(&sort.field),
        }
    }

    fn is_done(&self) -> bool {
        match self {
            Collector::Paged { pager, .. } => pager.is_full(),
            Collector::Sorted { limit, buffer, .. } => buffer.len() >= *limit,
        }
    }

    /// Accept one record; `false` once no further records are wanted.
    fn accept(&mut self, record: T) -> bool {
        match self {
            Collector::Paged { pager, out } => match pager.offer() {
                PageStep::Skip => true,
                PageStep::Emit => {
                    out.push(record);
                    !pager.is_full()
                }
                PageStep::Done => false,
            },
            Collector::Sorted { limit, buffer, .. } => {
                if buffer.len() >= *limit {
                    return false;
                }
                buffer.push(record);
                if buffer.len() >= *limit {
                    warn!(limit = *limit, "sort buffer reached its limit; later records are not read");
                    return false;
                }
                true
            }
        }
    }

    fn finish(self) -> Vec<T> {
        match self {
            Collector::Paged { out, .. } => out,
            Collector::Sorted {
                sort,
                mut buffer,
                skip,
                top,
                ..
            } => {
                sort_records(&mut buffer, &sort);
                page(buffer, skip, top)
            }
        }
    }
}

/// Read-side query engine over an [`InstanceStore`].
///
/// # Example
///
/// ```rust
/// # use std::sync::Arc;
/// # use duroscope::engine::{QueryEngine, QueryRequest};
/// # use duroscope::providers::in_memory::InMemoryInstanceStore;
/// # use duroscope::query::FilterClause;
/// # use tokio_util::sync::CancellationToken;
/// # #[tokio::main] async fn main() -> Result<(), duroscope::providers::ProviderError> {
/// let engine = QueryEngine::new(Arc::new(InMemoryInstanceStore::new()));
/// let request = QueryRequest::new(FilterClause::parse("startswith(instanceId, 'order-')"))
///     .with_order_by("createdTime desc", None)
///     .with_page(0, Some(50));
/// let page = engine.query(&request, &CancellationToken::new()).await?;
/// assert!(page.is_empty());
/// # Ok(()) }
/// ```
pub struct QueryEngine {
    store: Arc<dyn InstanceStore>,
    options: EngineOptions,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn InstanceStore>) -> Self {
        Self::with_options(store, EngineOptions::default())
    }

    pub fn with_options(store: Arc<dyn InstanceStore>, options: EngineOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// List instances and entities matching `request`.
    ///
    /// Store failures on the orchestration listing are returned as errors.
    /// Lookup and entity-listing failures only drop the affected fields or
    /// records.
    pub async fn query(
        &self,
        request: &QueryRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<InstanceRecord>, ProviderError> {
        let filter = &request.filter;
        let sort = SortSpec::parse(request.order_by.as_deref(), request.order_direction.as_deref())
            .filter(|s| s.resolves_for::<InstanceRecord>());
        let plan = EnrichmentPlan::for_request(filter, sort.as_ref(), &request.hidden_columns);
        let limit = request.fetch_size.unwrap_or(self.options.max_sort_buffer).max(1);
        let mut collector = Collector::new(sort, request.skip, request.top, limit);
        let mut listed_entities = HashSet::new();
        // Payloads named by the filter or sort are fetched, then dropped unless requested.
        let payloads_needed = (filter.is_active() && is_payload_field(&filter.field_name))
            || collector.sort_field().is_some_and(is_payload_field);
        let fetch_payloads = request.include_input_output || payloads_needed;

        debug!(
            filter_field = %filter.field_name,
            skip = request.skip,
            top = ?request.top,
            ?plan,
            fetch_payloads,
            "query started"
        );

        if filter.wants_orchestrations() {
            let stream = self
                .store
                .list_instances(&ListInstancesRequest {
                    time_from: filter.time_from,
                    time_till: filter.time_till,
                    include_input_output: fetch_payloads,
                    statuses: filter.requested_statuses(),
                })
                .await?;
            let expander = StatusExpander::new(self.store.as_ref(), plan);
            self.collect_orchestrations(stream, &expander, filter, &mut collector, &mut listed_entities, cancel)
                .await?;
        } else {
            debug!("orchestration listing skipped by status selection");
        }

        if !collector.is_done() && !cancel.is_cancelled() {
            let mut entities = entities::entity_records(self.store.as_ref(), filter, listed_entities).await;
            while let Some(record) = entities.next().await {
                if filter.matches(&record) && !collector.accept(record) {
                    break;
                }
                if cancel.is_cancelled() {
                    break;
                }
            }
        }

        let mut records = collector.finish();
        if !request.include_input_output {
            records.iter_mut().for_each(InstanceRecord::strip_payloads);
        }
        debug!(returned = records.len(), cancelled = cancel.is_cancelled(), "query finished");
        Ok(records)
    }

    async fn collect_orchestrations(
        &self,
        mut stream: InstanceStream,
        expander: &StatusExpander<'_>,
        filter: &FilterClause,
        collector: &mut Collector<InstanceRecord>,
        listed_entities: &mut HashSet<String>,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        let mut batcher = Batcher::new(self.options.effective_batch_size());

        while !collector.is_done() && !cancel.is_cancelled() {
            let Some(mut record) = stream.try_next().await? else {
                break;
            };
            record.classify();
            if !filter.matches_runtime_status(&record) || !filter.matches_time_range(record.created_time) {
                continue;
            }
            if record.is_entity() {
                listed_entities.insert(record.instance_id.clone());
            }
            if let Some(batch) = batcher.push(record) {
                let enriched = expander.enrich_batch(batch).await;
                Self::drain(enriched, filter, collector, cancel);
            }
        }

        if !collector.is_done() && !cancel.is_cancelled() {
            if let Some(batch) = batcher.finish() {
                let enriched = expander.enrich_batch(batch).await;
                Self::drain(enriched, filter, collector, cancel);
            }
        }
        Ok(())
    }

    fn drain(
        batch: Vec<InstanceRecord>,
        filter: &FilterClause,
        collector: &mut Collector<InstanceRecord>,
        cancel: &CancellationToken,
    ) {
        for record in batch {
            if cancel.is_cancelled() {
                return;
            }
            if filter.matches(&record) && !collector.accept(record) {
                return;
            }
        }
    }

    /// Load one instance's history as correlated display events.
    ///
    /// Sub-orchestration ids are looked up for the returned page only, unless
    /// the filter or sort needs them for every event.
    pub async fn get_correlated_history(
        &self,
        instance_id: &str,
        request: &HistoryRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<DisplayHistoryEvent>, ProviderError> {
        let rows = self.store.get_history(instance_id).await?;
        if cancel.is_cancelled() {
            return Ok(Vec::new());
        }

        let filter = &request.filter;
        let sort = SortSpec::parse(request.order_by.as_deref(), request.order_direction.as_deref())
            .filter(|s| s.resolves_for::<DisplayHistoryEvent>());
        let links_needed_first = (filter.is_active()
            && same_field::<DisplayHistoryEvent>(&filter.field_name, "subOrchestrationId"))
            || sort
                .as_ref()
                .is_some_and(|s| same_field::<DisplayHistoryEvent>(&s.field, "subOrchestrationId"));

        let mut events = correlate(&rows);
        if links_needed_first {
            resolve_sub_orchestrations(self.store.as_ref(), instance_id, &mut events).await;
            if cancel.is_cancelled() {
                return Ok(Vec::new());
            }
        }

        events.retain(|e| filter.matches_time_range(e.timestamp) && filter.matches(e));
        if let Some(sort) = &sort {
            sort_records(&mut events, sort);
        }
        let mut paged = page(events, request.skip, request.top);

        if !links_needed_first && !cancel.is_cancelled() {
            resolve_sub_orchestrations(self.store.as_ref(), instance_id, &mut paged).await;
        }

        debug!(instance_id, rows = rows.len(), returned = paged.len(), "history loaded");
        Ok(paged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RuntimeStatus;
    use crate::providers::in_memory::InMemoryInstanceStore;
    use crate::providers::instrumented::InstrumentedStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    async fn seeded(count: i64) -> Arc<InMemoryInstanceStore> {
        let store = Arc::new(InMemoryInstanceStore::new());
        for i in 0..count {
            store
                .insert_instance(InstanceRecord::new(format!("i{i:02}"), "Work", at(i), RuntimeStatus::Completed))
                .await;
        }
        store
    }

    #[test]
    fn sorted_collector_stops_at_limit() {
        let mut collector: Collector<InstanceRecord> =
            Collector::new(SortSpec::parse(Some("createdTime"), Some("desc")), 0, None, 2);
        assert!(collector.accept(InstanceRecord::new("a", "x", at(1), RuntimeStatus::Running)));
        assert!(!collector.accept(InstanceRecord::new("b", "x", at(2), RuntimeStatus::Running)));
        assert!(collector.is_done());
        assert!(!collector.accept(InstanceRecord::new("c", "x", at(3), RuntimeStatus::Running)));
        let ids: Vec<_> = collector.finish().into_iter().map(|r| r.instance_id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn unsorted_query_stops_pulling_when_page_is_full() {
        let inner = seeded(10).await;
        let store = Arc::new(InstrumentedStore::new(inner));
        let engine = QueryEngine::with_options(
            store.clone(),
            EngineOptions {
                batch_size: 3,
                ..EngineOptions::default()
            },
        );
        let request = QueryRequest::default()
            .with_page(1, Some(2))
            .with_hidden_columns(["lastEvent"]);

        let page = engine.query(&request, &CancellationToken::new()).await.unwrap();
        let ids: Vec<_> = page.iter().map(|r| r.instance_id.as_str()).collect();
        assert_eq!(ids, vec!["i01", "i02"]);
        // Page filled from the first batch; entities never needed.
        assert_eq!(store.snapshot().list_entities_calls, 0);
    }

    #[tokio::test]
    async fn cancelled_query_returns_nothing_new() {
        let engine = QueryEngine::new(seeded(5).await);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let page = engine.query(&QueryRequest::default(), &cancel).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn unknown_sort_field_keeps_store_order() {
        let engine = QueryEngine::new(seeded(4).await);
        let request = QueryRequest::default().with_order_by("bogus", Some("desc"));
        let page = engine.query(&request, &CancellationToken::new()).await.unwrap();
        let ids: Vec<_> = page.iter().map(|r| r.instance_id.as_str()).collect();
        assert_eq!(ids, vec!["i00", "i01", "i02", "i03"]);
    }
}
