//! Raw event-log rows, display events, and the correlator between them.

pub mod correlator;
pub mod event;

pub use correlator::{correlate, duration_ms, resolve_sub_orchestrations};
pub use event::{DisplayHistoryEvent, EventType, HistoryEventRaw};
