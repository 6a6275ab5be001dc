//! Read-side query engine for durable orchestration stores.
//!
//! Lists orchestration instances and entities with filtering, sorting and
//! paging, and turns an instance's raw event log into correlated display
//! events. Persistence is behind [`providers::InstanceStore`].
//!
//! ```rust
//! # use std::sync::Arc;
//! # use duroscope::{FilterClause, HistoryRequest, QueryEngine};
//! # use duroscope::providers::in_memory::InMemoryInstanceStore;
//! # use tokio_util::sync::CancellationToken;
//! # #[tokio::main] async fn main() -> Result<(), duroscope::ProviderError> {
//! let engine = QueryEngine::new(Arc::new(InMemoryInstanceStore::new()));
//! let request = HistoryRequest::new(FilterClause::parse("eventType eq 'TaskFailed'"));
//! let events = engine
//!     .get_correlated_history("order-42", &request, &CancellationToken::new())
//!     .await?;
//! assert!(events.is_empty());
//! # Ok(()) }
//! ```

pub mod engine;
pub mod history;
pub mod model;
pub mod observability;
pub mod options;
pub mod providers;
pub mod query;

pub use engine::{HistoryRequest, QueryEngine, QueryRequest};
pub use history::{DisplayHistoryEvent, EventType, HistoryEventRaw};
pub use model::{DURABLE_ENTITIES_STATUS, EntityId, EntityKind, InstanceRecord, RuntimeStatus};
pub use options::EngineOptions;
pub use providers::{InstanceStore, ProviderError};
pub use query::{FilterClause, FilterOperator};
