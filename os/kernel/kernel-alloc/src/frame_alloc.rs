//! Reference-counted physical page pool.

use crate::Frame;
use crate::free_list::FreeList;
use crate::phys_mapper::PhysMapper;
use crate::ref_count::RefCountTable;
use kernel_info::MemoryLayout;
use kernel_info::memory::{ALLOC_SCRUB, FREE_SCRUB, PAGE_SIZE};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};
use kernel_sync::SpinLock;
use log::{info, trace};

/// Physical page pool with per-frame reference counts.
///
/// A frame is on the free list exactly when its count is zero. The pool
/// covers `[layout.pool_start(), layout.top())`; frames below the pool start
/// belong to the kernel image and are never handed out.
///
/// `allocate` and `free` are safe to call from any number of threads.
pub struct PageAllocator<M: PhysMapper> {
    mapper: M,
    free: SpinLock<FreeList>,
    refs: RefCountTable,
}

impl<M: PhysMapper> PageAllocator<M> {
    /// Seeds the pool with every frame in `[pool_start, top)`.
    ///
    /// Every counter starts at one and each pool frame then goes through
    /// [`free`](Self::free), which drops it to zero, scrubs it and links it.
    ///
    /// # Safety
    /// - Every frame in the pool range must be RAM reachable through `mapper`.
    /// - Nothing else may use those frames except through this allocator.
    pub unsafe fn new(layout: MemoryLayout, mapper: M) -> Self {
        let this = Self {
            mapper,
            free: SpinLock::new(FreeList::new()),
            refs: RefCountTable::new(layout),
        };

        let mut next = Some(layout.pool_start().page::<Size4K>());
        while let Some(frame) = next.filter(|f| layout.is_pool_frame(*f)) {
            this.free(frame.base());
            next = frame.next();
        }

        info!(
            "page pool ready: {} frames in {}..{}",
            this.free_frames(),
            layout.pool_start(),
            layout.top()
        );
        this
    }

    /// Hands out one frame with reference count 1, or `None` when the pool is
    /// exhausted.
    ///
    /// The frame's bytes are filled with [`ALLOC_SCRUB`].
    pub fn allocate(&self) -> Option<Frame> {
        // SAFETY: every listed frame came through `free` and is owned by the pool.
        let frame = self.free.with_lock(|list| unsafe { list.pop(&self.mapper) })?;

        {
            let mut refs = self.refs.lock();
            debug_assert_eq!(refs.get(frame), 0, "free frame {frame} has live references");
            refs.set(frame, 1);
        }

        // SAFETY: the frame just left the free list and belongs to the caller now.
        unsafe { self.frame_bytes(frame) }.fill(ALLOC_SCRUB);
        trace!("allocated frame {frame}");
        Some(frame)
    }

    /// Drops one reference to the frame at `pa`.
    ///
    /// When the last reference goes away the frame is filled with
    /// [`FREE_SCRUB`] and returned to the pool. Otherwise nothing else
    /// happens.
    ///
    /// # Panics
    /// If `pa` is not page aligned, lies outside the pool, or the frame has
    /// no references left.
    pub fn free(&self, pa: impl Into<PhysicalAddress>) {
        let pa = pa.into();
        let Some(frame) = PhysicalPage::<Size4K>::from_aligned(pa) else {
            panic!("free: unaligned address {pa}");
        };
        assert!(
            self.refs.layout().is_pool_frame(frame),
            "free: frame {frame} outside the page pool"
        );

        if self.refs.decrement(frame) > 0 {
            trace!("dropped a reference to shared frame {frame}");
            return;
        }

        // SAFETY: the last reference is gone, so the frame belongs to the pool.
        unsafe {
            self.frame_bytes(frame).fill(FREE_SCRUB);
            self.free.with_lock(|list| list.push(&self.mapper, frame));
        }
        trace!("released frame {frame}");
    }

    /// Adds one reference to every frame in `frames` under a single lock
    /// acquisition.
    ///
    /// # Panics
    /// If any frame lies outside the managed range.
    pub fn share(&self, frames: impl IntoIterator<Item = Frame>) {
        let mut refs = self.refs.lock();
        for frame in frames {
            refs.increment(frame);
        }
        refs.unlock();
    }

    /// Number of frames currently on the free list.
    pub fn free_frames(&self) -> usize {
        self.free.with_lock(|list| list.len())
    }

    #[must_use]
    pub const fn ref_counts(&self) -> &RefCountTable {
        &self.refs
    }

    #[must_use]
    pub const fn layout(&self) -> &MemoryLayout {
        self.refs.layout()
    }

    #[must_use]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    /// The bytes of `frame`.
    ///
    /// # Safety
    /// The caller must own `frame` (hold a reference to it) and must not
    /// create overlapping live borrows of the same frame.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn frame_bytes(&self, frame: Frame) -> &mut [u8; PAGE_SIZE as usize] {
        unsafe { self.mapper.phys_to_mut(frame.base()) }
    }
}
