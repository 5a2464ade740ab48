use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Run-wide indexing state.
///
/// Set while an indexing run is active; clearing it while active is the
/// cancellation request. Crawl units observe the cleared flag and stop
/// issuing fetches.
pub struct IndexingFlag(AtomicBool);

impl IndexingFlag {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(AtomicBool::new(false)))
    }

    /// Claim the flag for a new run. Returns false if a run is already active.
    pub fn begin(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Request cancellation. Returns false if no run was active.
    pub fn stop(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    /// Clear the flag at the natural end of a run
    pub fn finish(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_is_exclusive() {
        let flag = IndexingFlag::new();
        assert!(flag.begin());
        assert!(!flag.begin());
        assert!(flag.is_active());
        assert!(flag.stop());
        assert!(!flag.stop());
        assert!(!flag.is_active());
        assert!(flag.begin());
    }
}
