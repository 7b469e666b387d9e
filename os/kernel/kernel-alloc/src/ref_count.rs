//! Per-frame reference counts.
//!
//! One counter per 4 KiB frame in `[base, top)` of the [`MemoryLayout`],
//! including the frames occupied by the kernel image (they simply never
//! change). Every access happens under one table-wide spin lock.
//!
//! Callers that need a multi-step sequence to be atomic with respect to
//! other counter updates take the lock explicitly with
//! [`RefCountTable::lock`] and operate on the returned [`RefCountGuard`].

extern crate alloc;

use crate::Frame;
use alloc::boxed::Box;
use alloc::vec;
use kernel_info::MemoryLayout;
use kernel_sync::{SpinLock, SpinLockGuard};

pub struct RefCountTable {
    layout: MemoryLayout,
    counts: SpinLock<Box<[u32]>>,
}

impl RefCountTable {
    /// Creates a table with every counter set to `1`.
    ///
    /// Starting at one lets boot seed the pool by calling the regular free
    /// path on every frame.
    #[must_use]
    pub fn new(layout: MemoryLayout) -> Self {
        Self {
            layout,
            counts: SpinLock::new(vec![1; layout.frame_count()].into_boxed_slice()),
        }
    }

    /// Acquire the table lock.
    pub fn lock(&self) -> RefCountGuard<'_> {
        RefCountGuard {
            layout: &self.layout,
            counts: self.counts.lock(),
        }
    }

    /// Increments the count of `frame` and returns the new value.
    ///
    /// # Panics
    /// If `frame` lies outside the table.
    pub fn increment(&self, frame: Frame) -> u32 {
        self.lock().increment(frame)
    }

    /// Decrements the count of `frame` and returns the new value.
    ///
    /// # Panics
    /// If `frame` lies outside the table or its count is already zero.
    pub fn decrement(&self, frame: Frame) -> u32 {
        self.lock().decrement(frame)
    }

    /// Current count of `frame`.
    ///
    /// # Panics
    /// If `frame` lies outside the table.
    pub fn get(&self, frame: Frame) -> u32 {
        self.lock().get(frame)
    }

    #[must_use]
    pub const fn layout(&self) -> &MemoryLayout {
        &self.layout
    }
}

/// Exclusive access to the reference-count table.
///
/// Dropping the guard (or calling [`unlock`](Self::unlock)) releases the lock.
#[must_use]
pub struct RefCountGuard<'a> {
    layout: &'a MemoryLayout,
    counts: SpinLockGuard<'a, Box<[u32]>>,
}

impl RefCountGuard<'_> {
    pub fn increment(&mut self, frame: Frame) -> u32 {
        let slot = self.slot(frame);
        let Some(count) = slot.checked_add(1) else {
            panic!("refcount overflow on frame {frame}");
        };
        *slot = count;
        count
    }

    pub fn decrement(&mut self, frame: Frame) -> u32 {
        let slot = self.slot(frame);
        assert!(*slot > 0, "refcount underflow on frame {frame}");
        *slot -= 1;
        *slot
    }

    pub fn get(&mut self, frame: Frame) -> u32 {
        *self.slot(frame)
    }

    pub(crate) fn set(&mut self, frame: Frame, count: u32) {
        *self.slot(frame) = count;
    }

    /// Release the lock.
    pub fn unlock(self) {
        self.counts.unlock();
    }

    fn slot(&mut self, frame: Frame) -> &mut u32 {
        let Some(index) = self.layout.index_of(frame) else {
            panic!("refcount: frame {frame} outside managed memory");
        };
        &mut self.counts[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::PhysicalAddress;

    fn table() -> RefCountTable {
        RefCountTable::new(MemoryLayout::new(
            PhysicalAddress::new(0x10_0000),
            PhysicalAddress::new(0x10_1000),
            PhysicalAddress::new(0x10_8000),
        ))
    }

    fn frame(pa: u64) -> Frame {
        PhysicalAddress::new(pa).page()
    }

    #[test]
    fn counts_start_at_one() {
        let t = table();
        assert_eq!(t.get(frame(0x10_0000)), 1);
        assert_eq!(t.get(frame(0x10_7000)), 1);
    }

    #[test]
    fn increment_and_decrement_return_new_value() {
        let t = table();
        let f = frame(0x10_3000);
        assert_eq!(t.increment(f), 2);
        assert_eq!(t.decrement(f), 1);
        assert_eq!(t.decrement(f), 0);
    }

    #[test]
    fn guard_batches_updates_under_one_lock() {
        let t = table();
        let mut g = t.lock();
        g.increment(frame(0x10_2000));
        g.increment(frame(0x10_2000));
        g.set(frame(0x10_4000), 7);
        assert_eq!(g.get(frame(0x10_2000)), 3);
        g.unlock();
        assert_eq!(t.get(frame(0x10_4000)), 7);
    }

    #[test]
    #[should_panic(expected = "refcount underflow")]
    fn underflow_panics() {
        let t = table();
        let f = frame(0x10_5000);
        t.decrement(f);
        t.decrement(f);
    }

    #[test]
    #[should_panic(expected = "outside managed memory")]
    fn out_of_range_frame_panics() {
        let t = table();
        t.get(frame(0x10_8000));
    }
}
