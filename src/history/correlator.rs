//! History correlation.
//!
//! Turns one instance's flat, sequence-ordered event log into display events:
//! schedule rows are paired with their completion rows, durations are derived,
//! and sub-orchestration rows are linked to the child instance they started.
//!
//! Correlation runs in two passes over the rows:
//!
//! 1. Build an index of completion rows keyed by
//!    `(instance_id, execution_id, task_hub, task_id)` and pair every schedule
//!    row with at most one compatible completion row.
//! 2. Scan the rows once in sequence order, emitting one event per significant
//!    row. Completion rows already claimed by a schedule row are folded into
//!    that schedule row's event instead of being emitted on their own.
//!
//! The scan carries a small accumulator ([`ScanState`]) for the running
//! "last `ExecutionStarted` seen" timestamp, reset whenever the execution id
//! changes. Nothing is shared between calls, so any number of instances can be
//! correlated concurrently.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, warn};

use super::event::{DisplayHistoryEvent, EventType, HistoryEventRaw};
use crate::providers::InstanceStore;

type CorrelationKey<'a> = (&'a str, &'a str, &'a str, i64);

fn correlation_key(row: &HistoryEventRaw) -> Option<CorrelationKey<'_>> {
    let task_id = row.task_id?;
    Some((&row.instance_id, &row.execution_id, &row.task_hub, task_id))
}

/// Completion rows grouped by correlation key, in sequence order.
struct CompletionIndex<'a> {
    by_key: HashMap<CorrelationKey<'a>, Vec<usize>>,
}

impl<'a> CompletionIndex<'a> {
    fn build(rows: &'a [HistoryEventRaw]) -> Self {
        let mut by_key: HashMap<CorrelationKey<'a>, Vec<usize>> = HashMap::new();
        for (idx, row) in rows.iter().enumerate() {
            let is_completion = row.kind().is_some_and(|k| k.is_completion());
            if !is_completion {
                continue;
            }
            if let Some(key) = correlation_key(row) {
                by_key.entry(key).or_default().push(idx);
            }
        }
        Self { by_key }
    }

    fn candidates(&self, row: &'a HistoryEventRaw) -> &[usize] {
        correlation_key(row)
            .and_then(|key| self.by_key.get(&key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Pair each schedule row with its completion row.
///
/// Returns `pairs[schedule_idx] = Some(completion_idx)` plus the set of
/// claimed completion indices. A completion row is claimed at most once and
/// never by a row with the same sequence number.
fn pair_schedules(rows: &[HistoryEventRaw]) -> (Vec<Option<usize>>, HashSet<usize>) {
    let index = CompletionIndex::build(rows);
    let mut pairs = vec![None; rows.len()];
    let mut claimed = HashSet::new();

    for (idx, row) in rows.iter().enumerate() {
        let Some(kind) = row.kind().filter(EventType::is_schedule) else {
            continue;
        };
        let matched = index.candidates(row).iter().copied().find(|&c| {
            let completion = &rows[c];
            completion.sequence_number != row.sequence_number
                && !claimed.contains(&c)
                && completion.kind().is_some_and(|ck| kind.is_completed_by(ck))
        });
        if let Some(c) = matched {
            claimed.insert(c);
            pairs[idx] = Some(c);
        }
    }

    (pairs, claimed)
}

/// Running state of the single sequential scan.
#[derive(Debug, Default)]
struct ScanState<'a> {
    execution_id: Option<&'a str>,
    last_execution_started: Option<DateTime<Utc>>,
}

impl<'a> ScanState<'a> {
    fn observe(&mut self, row: &'a HistoryEventRaw, kind: EventType) {
        if self.execution_id != Some(row.execution_id.as_str()) {
            self.execution_id = Some(&row.execution_id);
            self.last_execution_started = None;
        }
        if kind == EventType::ExecutionStarted {
            self.last_execution_started = Some(row.timestamp);
        }
    }
}

/// Milliseconds between scheduling and completion. Inverted clocks clamp to zero.
pub fn duration_ms(timestamp: DateTime<Utc>, scheduled_time: DateTime<Utc>) -> i64 {
    (timestamp - scheduled_time).num_milliseconds().max(0)
}

fn finish(mut event: DisplayHistoryEvent) -> DisplayHistoryEvent {
    event.duration_in_ms = event.scheduled_time.map(|scheduled| duration_ms(event.timestamp, scheduled));
    event
}

/// Correlate one instance's rows (already in sequence-number order).
///
/// Emits one event per significant row: rows of unrecognized types and
/// completion rows folded into their schedule row produce nothing.
pub fn correlate(rows: &[HistoryEventRaw]) -> Vec<DisplayHistoryEvent> {
    let (pairs, claimed) = pair_schedules(rows);
    let mut state = ScanState::default();
    let mut events = Vec::with_capacity(rows.len());

    for (idx, row) in rows.iter().enumerate() {
        let Some(kind) = row.kind() else {
            continue;
        };
        state.observe(row, kind);

        if claimed.contains(&idx) {
            continue;
        }

        let event = match pairs[idx] {
            Some(c) => {
                let completion = &rows[c];
                // Completion kinds always parse; they were indexed by kind.
                let completion_kind = completion.kind().unwrap_or(kind);
                DisplayHistoryEvent {
                    timestamp: completion.timestamp,
                    event_type: completion_kind,
                    event_id: row.task_id,
                    name: row.name.clone().or_else(|| completion.name.clone()),
                    scheduled_time: Some(row.timestamp),
                    result: completion.result_payload.clone(),
                    details: completion.details_payload.clone(),
                    sub_orchestration_id: None,
                    duration_in_ms: None,
                }
            }
            None => {
                let mut event = DisplayHistoryEvent::from_row(row, kind);
                if kind == EventType::ExecutionCompleted {
                    event.scheduled_time = state.last_execution_started;
                }
                event
            }
        };

        events.push(finish(event));
    }

    debug!(
        rows = rows.len(),
        events = events.len(),
        paired = claimed.len(),
        "correlated history"
    );
    events
}

/// Fill `sub_orchestration_id` for sub-orchestration events by asking the
/// store for the child started by `instance_id` with the matching task id.
///
/// Lookups run concurrently. A failed or empty lookup leaves the field unset;
/// nothing is remembered, so the next load asks again.
pub async fn resolve_sub_orchestrations(
    store: &dyn InstanceStore,
    instance_id: &str,
    events: &mut [DisplayHistoryEvent],
) {
    let pending: Vec<(usize, i64)> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.wants_sub_orchestration_id())
        .filter_map(|(idx, e)| e.event_id.map(|task_id| (idx, task_id)))
        .collect();

    if pending.is_empty() {
        return;
    }

    let lookups = pending.into_iter().map(|(idx, task_id)| async move {
        (idx, task_id, store.find_sub_orchestration_id(instance_id, task_id).await)
    });

    for (idx, task_id, result) in join_all(lookups).await {
        match result {
            Ok(Some(child)) => events[idx].sub_orchestration_id = Some(child),
            Ok(None) => {
                debug!(instance_id, task_id, "sub-orchestration not found yet");
            }
            Err(e) => {
                warn!(instance_id, task_id, error = %e, "sub-orchestration lookup failed");
            }
        }
    }
}
