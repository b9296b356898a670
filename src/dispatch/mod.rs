//! Dispatch orchestration: coordinator, cancellation, and result aggregation.

mod coordinator;
mod report;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use coordinator::DispatchCoordinator;
pub use report::{DispatchReport, FailureKind, RecipientFailure, RecipientOutcome};

/// Cooperative cancellation handle for bulk sends.
///
/// Cancelling lets in-flight recipient work finish (committed rows are never
/// rolled back) but prevents new work from starting; the resulting report is
/// marked incomplete.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_handle() {
        let handle = CancelHandle::new();
        assert!(!handle.is_cancelled());

        let shared = handle.clone();
        shared.cancel();
        assert!(handle.is_cancelled());
    }
}
