use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Marks a loader busy for as long as the guard lives
pub(crate) struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    /// Claim `flag`, or `None` if another load holds it
    pub(crate) fn claim(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
