use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop request flag.
///
/// Raising is level-like, observing is edge-triggered: [`StopSignal::take`]
/// clears the flag, so one raise is seen by exactly one checkpoint.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    raised: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Reads and clears the flag.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::SeqCst)
    }
}
