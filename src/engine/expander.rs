//! Enrichment stage.
//!
//! Entity classification needs no I/O and happens as records arrive
//! ([`InstanceRecord::classify`]). The two expensive fields cost a store
//! round-trip per record and are only fetched when the request needs them:
//!
//! - `parentInstanceId` when the filter is on `parentInstanceId`;
//! - `lastEvent` when the column is visible, or the filter or sort uses it.
//!
//! Records are enriched a batch at a time; lookups within a batch run
//! concurrently and the batch keeps its input order.

use std::collections::HashSet;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::history::{EventType, HistoryEventRaw};
use crate::model::InstanceRecord;
use crate::providers::InstanceStore;
use crate::query::fields::same_field;
use crate::query::{FilterClause, SortSpec};

const PARENT_INSTANCE_ID: &str = "parentInstanceId";
const LAST_EVENT: &str = "lastEvent";

/// Which expensive fields to fetch for a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentPlan {
    pub parent_instance_id: bool,
    pub last_event: bool,
}

impl EnrichmentPlan {
    pub fn for_request(filter: &FilterClause, sort: Option<&SortSpec>, hidden_columns: &HashSet<String>) -> Self {
        let filters_on = |field: &str| filter.is_active() && same_field::<InstanceRecord>(&filter.field_name, field);
        let sorts_on = |field: &str| sort.is_some_and(|s| same_field::<InstanceRecord>(&s.field, field));
        let hidden = |field: &str| hidden_columns.iter().any(|c| same_field::<InstanceRecord>(c, field));

        Self {
            parent_instance_id: filters_on(PARENT_INSTANCE_ID),
            last_event: !hidden(LAST_EVENT) || filters_on(LAST_EVENT) || sorts_on(LAST_EVENT),
        }
    }

    pub fn needs_io(&self) -> bool {
        self.parent_instance_id || self.last_event
    }
}

/// Label for the most recent recognised event in `rows`: its name, or its
/// event type when unnamed.
pub fn last_event_label(rows: &[HistoryEventRaw]) -> Option<String> {
    rows.iter().rev().find_map(|row| {
        let kind: EventType = row.kind()?;
        Some(match row.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => kind.as_str().to_string(),
        })
    })
}

pub struct StatusExpander<'a> {
    store: &'a dyn InstanceStore,
    plan: EnrichmentPlan,
}

impl<'a> StatusExpander<'a> {
    pub fn new(store: &'a dyn InstanceStore, plan: EnrichmentPlan) -> Self {
        Self { store, plan }
    }

    pub fn plan(&self) -> EnrichmentPlan {
        self.plan
    }

    /// Enrich one batch, preserving order.
    pub async fn enrich_batch(&self, batch: Vec<InstanceRecord>) -> Vec<InstanceRecord> {
        if !self.plan.needs_io() {
            return batch;
        }
        let size = batch.len();
        let enriched = join_all(batch.into_iter().map(|record| self.enrich(record))).await;
        debug!(batch_size = size, plan = ?self.plan, "enriched batch");
        enriched
    }

    async fn enrich(&self, mut record: InstanceRecord) -> InstanceRecord {
        if record.is_entity() {
            return record;
        }
        if self.plan.parent_instance_id {
            match self.store.get_parent_instance_id(&record.instance_id).await {
                Ok(parent) => record.parent_instance_id = parent,
                Err(e) => {
                    warn!(instance_id = %record.instance_id, error = %e, "parent instance lookup failed");
                }
            }
        }
        if self.plan.last_event {
            match self.store.get_history(&record.instance_id).await {
                Ok(rows) => record.last_event = last_event_label(&rows),
                Err(e) => {
                    warn!(instance_id = %record.instance_id, error = %e, "last event lookup failed");
                }
            }
        }
        record
    }
}
