//! Monotonic refresh epochs for stale-response suppression.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hands out refresh epochs. Cloning shares the counter.
#[derive(Debug, Clone, Default)]
pub struct EpochCounter {
    latest: Arc<AtomicU64>,
}

impl EpochCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new epoch, invalidating every earlier one.
    pub fn mint(&self) -> Epoch {
        let value = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        Epoch {
            value,
            latest: Arc::clone(&self.latest),
        }
    }
}

/// Token identifying one refresh. Check [`Epoch::is_current`] immediately
/// before applying a result; a newer mint anywhere makes this epoch stale.
#[derive(Debug, Clone)]
pub struct Epoch {
    value: u64,
    latest: Arc<AtomicU64>,
}

impl Epoch {
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.value
    }

    pub fn value(&self) -> u64 {
        self.value
    }
}
