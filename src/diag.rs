//! Bucketed diagnostic counters.
//!
//! Capacity errors (table full, queue full, pool exhausted) are expected to
//! happen in bursts under load. Logging every occurrence at `WRN` would
//! itself become a capacity problem (log buffer pressure), so each counter
//! tracks a burst and only logs on the first occurrence and on the burst's
//! resolution (count returns to zero), per spec §7.

use core::sync::atomic::{AtomicU32, Ordering};

/// A burst counter: increments silently, logs once when a burst starts.
pub struct BurstCounter {
    count: AtomicU32,
    label: &'static str,
}

impl BurstCounter {
    pub const fn new(label: &'static str) -> Self {
        Self {
            count: AtomicU32::new(0),
            label,
        }
    }

    /// Record one occurrence. Logs at `WRN` only for the first in a burst.
    pub fn bump(&self) {
        let prev = self.count.fetch_add(1, Ordering::Relaxed);
        if prev == 0 {
            log::warn!("{}: burst starting", self.label);
        }
    }

    /// Clear the counter, logging the burst size if anything was dropped.
    pub fn resolve(&self) {
        let prev = self.count.swap(0, Ordering::Relaxed);
        if prev > 0 {
            log::warn!("{}: burst ended, {} dropped", self.label, prev);
        }
    }

    pub fn current(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}
