//! Entity merge stage.
//!
//! Entities come from their own listing and are appended after the
//! orchestrations. A store that cannot list entities, or fails part-way,
//! costs the caller those entities and nothing else.

use std::collections::HashSet;

use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, warn};

use crate::model::InstanceRecord;
use crate::providers::InstanceStore;
use crate::query::FilterClause;

/// Stream of entity records to append to a listing.
///
/// Returns an empty stream without calling the store when the status
/// selection excludes entities. Ids in `already_listed` were returned by the
/// orchestration listing and are not repeated.
pub async fn entity_records(
    store: &dyn InstanceStore,
    filter: &FilterClause,
    already_listed: HashSet<String>,
) -> BoxStream<'static, InstanceRecord> {
    if !filter.wants_entities() {
        debug!("entity listing skipped by status selection");
        return stream::empty().boxed();
    }

    let listed = match store.list_entities(filter.time_from, filter.time_till).await {
        Ok(listed) => listed,
        Err(e) => {
            warn!(error = %e, "entity listing failed; continuing without entities");
            return stream::empty().boxed();
        }
    };

    listed
        .take_while(|item| {
            let keep = match item {
                Ok(_) => true,
                Err(e) => {
                    warn!(error = %e, "entity listing interrupted; keeping entities read so far");
                    false
                }
            };
            futures::future::ready(keep)
        })
        .filter_map(move |item| {
            let record = item
                .ok()
                .map(InstanceRecord::into_entity)
                .filter(|r| !already_listed.contains(&r.instance_id));
            futures::future::ready(record)
        })
        .boxed()
}
