/// Tuning knobs for [`QueryEngine`](crate::engine::QueryEngine).
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Records enriched per batch. At most this many enrichment lookups are
    /// in flight against the store at once.
    /// Default: 500
    pub batch_size: usize,

    /// Upper bound on records buffered for an in-engine sort when the request
    /// does not name its own `fetch_size`.
    /// Default: 10_000
    pub max_sort_buffer: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_sort_buffer: 10_000,
        }
    }
}

impl EngineOptions {
    /// Batch size with zero treated as one.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}
