//! Monotonic rank sequence for run-list entries

use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out strictly increasing ranks, one per run-list `add` call.
///
/// Owned by an [`Engine`](crate::Engine); two engines never share ranks.
#[derive(Debug, Default)]
pub struct RankSequence {
    last: AtomicU64,
}

impl RankSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next rank; the first call returns 1
    pub fn next_rank(&self) -> u64 {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Most recently issued rank, 0 if none
    pub fn current(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}
