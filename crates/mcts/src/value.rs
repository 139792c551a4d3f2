//! Lock-free optional `f32` cell.
//!
//! Node statistics are read by every selecting worker and written by
//! back-propagation, so they live in atomics rather than behind locks.
//! The cell stores the bit pattern of an `f32` in an `AtomicU32`, with
//! one reserved pattern meaning "empty", replacing the floating-point
//! sentinels of older engines with an explicit absent state.

use std::sync::atomic::{AtomicU32, Ordering};

/// Reserved bit pattern for the empty state. It decodes to a NaN no
/// value-space number ever produces.
const EMPTY: u32 = u32::MAX;

/// An atomically updated `Option<f32>`.
pub(crate) struct AtomicValue(AtomicU32);

impl AtomicValue {
    /// An empty cell.
    pub(crate) fn empty() -> Self {
        Self(AtomicU32::new(EMPTY))
    }

    /// A cell holding zero.
    pub(crate) fn zero() -> Self {
        Self(AtomicU32::new(0f32.to_bits()))
    }

    /// Current value, or `None` when the cell is empty.
    #[inline]
    pub(crate) fn get(&self) -> Option<f32> {
        match self.0.load(Ordering::Relaxed) {
            EMPTY => None,
            bits => Some(f32::from_bits(bits)),
        }
    }

    /// Store a value.
    #[inline]
    pub(crate) fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Reset the cell to empty.
    #[inline]
    pub(crate) fn clear(&self) {
        self.0.store(EMPTY, Ordering::Relaxed);
    }

    /// Add `delta` to the cell, treating empty as zero. Lock-free via
    /// compare-and-swap.
    pub(crate) fn fetch_add(&self, delta: f32) -> f32 {
        loop {
            let current_bits = self.0.load(Ordering::Relaxed);
            let current = match current_bits {
                EMPTY => 0.0,
                bits => f32::from_bits(bits),
            };
            let new_bits = (current + delta).to_bits();
            match self.0.compare_exchange_weak(
                current_bits,
                new_bits,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return current,
                Err(_) => continue,
            }
        }
    }
}

impl std::fmt::Debug for AtomicValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get() {
            Some(v) => write!(f, "{v}"),
            None => write!(f, "-"),
        }
    }
}
