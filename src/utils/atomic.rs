//! Shared scalar slots and the accumulate strategy
//!
//! Every gradient buffer and backward buffer in the engine is a slice of
//! [`AtomicF32`] slots. Whether a write into a slot is a plain read-add-store or a
//! real atomic fetch-add is decided by the [`Accumulate`] strategy that the caller
//! injects once per training call:
//!
//! - [`PlainAccumulate`]: sequential mode, a single writer at a time, deterministic order
//! - [`AtomicAccumulate`]: concurrent mode, any number of writers, unspecified order
//!
//! Using the same slot type for both strategies means the buffers are always shared
//! through `&` references and the borrow checker never has to know which mode is active.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// `f32` stored as its bit pattern inside an [`AtomicU32`].
#[derive(Default)]
pub struct AtomicF32 {
    bits: AtomicU32,
}

impl AtomicF32 {
    /// Create a slot holding `value`.
    pub fn new(value: f32) -> Self {
        Self {
            bits: AtomicU32::new(value.to_bits()),
        }
    }

    /// Read the current value.
    pub fn load(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Overwrite the current value.
    pub fn store(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }

    /// Atomically add `delta`, returning the previous value.
    ///
    /// Implemented as a compare-exchange loop on the bit pattern, since the
    /// standard library has no native floating point fetch-add.
    pub fn fetch_add(&self, delta: f32) -> f32 {
        let mut current = self.bits.load(Ordering::Relaxed);
        loop {
            let next = (f32::from_bits(current) + delta).to_bits();
            match self.bits.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(previous) => return f32::from_bits(previous),
                Err(actual) => current = actual,
            }
        }
    }

    /// Consume the slot and return its value.
    pub fn into_inner(self) -> f32 {
        f32::from_bits(self.bits.into_inner())
    }
}

impl Clone for AtomicF32 {
    fn clone(&self) -> Self {
        Self::new(self.load())
    }
}

impl fmt::Debug for AtomicF32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.load(), f)
    }
}

impl From<f32> for AtomicF32 {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

/// Allocate `len` zeroed slots.
pub fn zeroed_slots(len: usize) -> Vec<AtomicF32> {
    (0..len).map(|_| AtomicF32::default()).collect()
}

/// Snapshot a slice of slots into plain values.
pub fn load_slots(slots: &[AtomicF32]) -> Vec<f32> {
    slots.iter().map(AtomicF32::load).collect()
}

/// Strategy for adding a delta into a shared scalar slot.
pub trait Accumulate: Send + Sync + fmt::Debug {
    /// Add `delta` into `slot`.
    fn add(&self, slot: &AtomicF32, delta: f32);
}

/// Plain in-place addition. Only valid while a single thread writes to the buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainAccumulate;

impl Accumulate for PlainAccumulate {
    #[inline]
    fn add(&self, slot: &AtomicF32, delta: f32) {
        let bits = slot.bits.load(Ordering::Relaxed);
        slot.bits
            .store((f32::from_bits(bits) + delta).to_bits(), Ordering::Relaxed);
    }
}

/// Atomic fetch-add. Safe under any number of concurrent writers.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicAccumulate;

impl Accumulate for AtomicAccumulate {
    #[inline]
    fn add(&self, slot: &AtomicF32, delta: f32) {
        slot.fetch_add(delta);
    }
}
