//! Page stage: skip/top over an ordered sequence.

/// What to do with the next item offered to a [`Pager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStep {
    /// Item falls before the page.
    Skip,
    /// Item belongs to the page.
    Emit,
    /// Page is full; stop pulling.
    Done,
}

/// Incremental skip/top state for pull-based streams.
#[derive(Debug, Clone)]
pub struct Pager {
    skip: usize,
    top: Option<usize>,
    seen: usize,
    emitted: usize,
}

impl Pager {
    /// `top = None` means no upper bound.
    pub fn new(skip: usize, top: Option<usize>) -> Self {
        Self {
            skip,
            top,
            seen: 0,
            emitted: 0,
        }
    }

    /// Whether the page already holds `top` items.
    pub fn is_full(&self) -> bool {
        self.top.is_some_and(|top| self.emitted >= top)
    }

    /// Account for one more item in stream order.
    pub fn offer(&mut self) -> PageStep {
        if self.is_full() {
            return PageStep::Done;
        }
        self.seen += 1;
        if self.seen <= self.skip {
            return PageStep::Skip;
        }
        self.emitted += 1;
        PageStep::Emit
    }
}

/// Apply skip/top to an already materialized sequence.
pub fn page<T>(items: impl IntoIterator<Item = T>, skip: usize, top: Option<usize>) -> Vec<T> {
    let items = items.into_iter().skip(skip);
    match top {
        Some(top) => items.take(top).collect(),
        None => items.collect(),
    }
}
