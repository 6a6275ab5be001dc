//! Property-based tests over the query engine.

mod common;

use common::orchestration;
use duroscope::providers::in_memory::InMemoryInstanceStore;
use duroscope::{FilterClause, InstanceRecord, QueryEngine, QueryRequest, RuntimeStatus};
use proptest::prelude::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Strategies
// ============================================================================

fn arb_record() -> impl Strategy<Value = (String, String, i64, usize)> {
    (
        prop_oneof!["order-[0-9]{1,3}", "pay-[0-9]{1,3}", "@counter@[a-c]"],
        prop_oneof![Just("ProcessOrder".to_string()), Just("ChargeCard".to_string())],
        0i64..1_000,
        0usize..RuntimeStatus::ALL.len(),
    )
}

fn arb_filter() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("startswith(instanceId, 'order')".to_string()),
        Just("contains(name, 'charge')".to_string()),
        Just("name eq 'ProcessOrder'".to_string()),
        Just("runtimeStatus in ('Running', 'Failed')".to_string()),
        Just("entityType eq 'DurableEntity'".to_string()),
    ]
}

async fn store_with(records: &[(String, String, i64, usize)]) -> Arc<InMemoryInstanceStore> {
    let store = Arc::new(InMemoryInstanceStore::new());
    for (id, name, secs, status) in records {
        store
            .insert_instance(orchestration(id, name, *secs, RuntimeStatus::ALL[*status]))
            .await;
    }
    store
}

fn listing(filter: FilterClause) -> QueryRequest {
    QueryRequest::new(filter).with_hidden_columns(["lastEvent"])
}

fn ids(records: &[InstanceRecord]) -> Vec<String> {
    records.iter().map(|r| r.instance_id.clone()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Property: a filter and its negation split the listing with no overlap and no gap
    #[test]
    fn prop_filter_and_negation_partition_listing(
        records in prop::collection::vec(arb_record(), 0..20),
        filter in arb_filter(),
    ) {
        let (all, positive, negative) = tokio::runtime::Runtime::new().unwrap().block_on(async {
            let engine = QueryEngine::new(store_with(&records).await);
            let cancel = CancellationToken::new();
            let clause = FilterClause::parse(&filter);
            let all = engine.query(&listing(FilterClause::default()), &cancel).await.unwrap();
            let positive = engine.query(&listing(clause.clone()), &cancel).await.unwrap();
            let negative = engine.query(&listing(clause.negated()), &cancel).await.unwrap();
            (all, positive, negative)
        });

        prop_assert_eq!(positive.len() + negative.len(), all.len());
        for record in &all {
            let in_pos = positive.contains(record);
            let in_neg = negative.contains(record);
            prop_assert!(in_pos != in_neg, "{} must be in exactly one side", record.instance_id);
        }
    }

    /// Property: adjacent pages of a sorted listing concatenate to the larger page
    #[test]
    fn prop_sorted_pages_tile(
        records in prop::collection::vec(arb_record(), 0..20),
        skip in 0usize..25,
        first in 0usize..10,
        second in 0usize..10,
    ) {
        let (joined, expected) = tokio::runtime::Runtime::new().unwrap().block_on(async {
            let engine = QueryEngine::new(store_with(&records).await);
            let cancel = CancellationToken::new();
            let sorted = || listing(FilterClause::default()).with_order_by("createdTime desc", None);

            let mut joined = engine.query(&sorted().with_page(skip, Some(first)), &cancel).await.unwrap();
            joined.extend(
                engine
                    .query(&sorted().with_page(skip + first, Some(second)), &cancel)
                    .await
                    .unwrap(),
            );
            let expected = engine
                .query(&sorted().with_page(skip, Some(first + second)), &cancel)
                .await
                .unwrap();
            (joined, expected)
        });

        prop_assert_eq!(ids(&joined), ids(&expected));
    }

    /// Property: requesting only Running never returns an entity
    #[test]
    fn prop_running_excludes_entities(records in prop::collection::vec(arb_record(), 0..20)) {
        let listed = tokio::runtime::Runtime::new().unwrap().block_on(async {
            let engine = QueryEngine::new(store_with(&records).await);
            let request = listing(FilterClause::default().with_runtime_statuses(["Running"]));
            engine.query(&request, &CancellationToken::new()).await.unwrap()
        });

        prop_assert!(listed.iter().all(|r| !r.is_entity() && r.runtime_status == RuntimeStatus::Running));
    }
}
