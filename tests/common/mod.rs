//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod fault_injection;
pub mod tracing_capture;

use chrono::{DateTime, Duration, TimeZone, Utc};
use duroscope::providers::in_memory::InMemoryInstanceStore;
use duroscope::{HistoryEventRaw, InstanceRecord, RuntimeStatus};
use std::sync::Arc;

/// Fixed test epoch plus `secs` seconds.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
}

pub fn orchestration(id: &str, name: &str, created_secs: i64, status: RuntimeStatus) -> InstanceRecord {
    InstanceRecord::new(id, name, at(created_secs), status)
}

/// History row in execution `exec-1` of task hub `hub`.
pub fn row(instance_id: &str, seq: u64, event_type: &str, secs: i64) -> HistoryEventRaw {
    HistoryEventRaw::new(instance_id, "exec-1", seq, event_type, at(secs)).with_task_hub("hub")
}

/// A small fleet: three orders, a payment sub-orchestration, two entities.
///
/// - `order-1` Completed, `order-2` Running, `order-3` Failed
/// - `payment-1` Completed, started by `order-1` for task 2
/// - `@counter@a` listed among instances, `@cart@b` only via the entity listing
pub async fn fleet() -> Arc<InMemoryInstanceStore> {
    let store = Arc::new(InMemoryInstanceStore::new());

    store.insert_instance(orchestration("order-1", "ProcessOrder", 0, RuntimeStatus::Completed)).await;
    store.insert_instance(orchestration("order-2", "ProcessOrder", 10, RuntimeStatus::Running)).await;
    store.insert_instance(orchestration("payment-1", "ChargeCard", 20, RuntimeStatus::Completed)).await;
    store.insert_instance(orchestration("order-3", "ProcessOrder", 30, RuntimeStatus::Failed)).await;
    store.insert_instance(orchestration("@counter@a", "counter", 40, RuntimeStatus::Completed)).await;
    store
        .insert_entity(orchestration("@counter@a", "counter", 40, RuntimeStatus::Running))
        .await;
    store
        .insert_entity(orchestration("@cart@b", "cart", 50, RuntimeStatus::Running))
        .await;

    store
        .append_history(
            "order-1",
            vec![
                row("order-1", 1, "ExecutionStarted", 0).with_name("ProcessOrder"),
                row("order-1", 2, "TaskScheduled", 1).with_task_id(1).with_name("Reserve"),
                row("order-1", 3, "TaskCompleted", 3).with_task_id(1).with_result("reserved"),
                row("order-1", 4, "SubOrchestrationInstanceCreated", 4)
                    .with_task_id(2)
                    .with_name("ChargeCard"),
                row("order-1", 5, "SubOrchestrationInstanceCompleted", 9)
                    .with_task_id(2)
                    .with_result("charged"),
                row("order-1", 6, "ExecutionCompleted", 10).with_result("done"),
            ],
        )
        .await;
    store
        .append_history(
            "payment-1",
            vec![
                HistoryEventRaw::new("payment-1", "exec-1", 1, "ExecutionStarted", at(20))
                    .with_task_hub("hub")
                    .with_name("ChargeCard")
                    .with_task_id(2)
                    .with_parent_instance_id("order-1"),
                row("payment-1", 2, "ExecutionCompleted", 21).with_result("charged"),
            ],
        )
        .await;
    store
        .append_history(
            "order-2",
            vec![
                row("order-2", 1, "ExecutionStarted", 10).with_name("ProcessOrder"),
                row("order-2", 2, "TimerCreated", 11),
            ],
        )
        .await;

    store
}
