use crate::memory::{KERNBASE, PAGE_SIZE, PHYSTOP};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// Runtime description of the physical range managed by the page pool.
///
/// * `base` anchors the reference-count table (index 0).
/// * `kernel_end` is the first byte after the kernel image; the pool starts
///   at the next page boundary.
/// * `top` is the exclusive end of usable RAM.
///
/// ```rust
/// # use kernel_info::MemoryLayout;
/// # use kernel_memory_addresses::PhysicalAddress;
/// let layout = MemoryLayout::new(
///     PhysicalAddress::new(0x8000_0000),
///     PhysicalAddress::new(0x8002_1234),
///     PhysicalAddress::new(0x8010_0000),
/// );
/// assert_eq!(layout.pool_start().as_u64(), 0x8002_2000);
/// assert_eq!(layout.frame_count(), 0x100);
/// ```
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryLayout {
    base: PhysicalAddress,
    kernel_end: PhysicalAddress,
    top: PhysicalAddress,
}

impl MemoryLayout {
    /// Creates a layout.
    ///
    /// # Panics
    /// If `base` or `top` are not page aligned, or if
    /// `base <= kernel_end <= top` does not hold.
    #[must_use]
    pub const fn new(base: PhysicalAddress, kernel_end: PhysicalAddress, top: PhysicalAddress) -> Self {
        assert!(base.as_u64().is_multiple_of(PAGE_SIZE), "layout base must be page aligned");
        assert!(top.as_u64().is_multiple_of(PAGE_SIZE), "layout top must be page aligned");
        assert!(base.as_u64() <= kernel_end.as_u64(), "kernel end below layout base");
        assert!(kernel_end.as_u64() <= top.as_u64(), "kernel end above layout top");
        Self {
            base,
            kernel_end,
            top,
        }
    }

    /// The board layout, given the linker-provided end of the kernel image.
    #[must_use]
    pub const fn board(kernel_end: PhysicalAddress) -> Self {
        Self::new(PhysicalAddress::new(KERNBASE), kernel_end, PhysicalAddress::new(PHYSTOP))
    }

    #[inline]
    #[must_use]
    pub const fn base(&self) -> PhysicalAddress {
        self.base
    }

    #[inline]
    #[must_use]
    pub const fn kernel_end(&self) -> PhysicalAddress {
        self.kernel_end
    }

    #[inline]
    #[must_use]
    pub const fn top(&self) -> PhysicalAddress {
        self.top
    }

    /// First frame handed to the pool.
    #[inline]
    #[must_use]
    pub const fn pool_start(&self) -> PhysicalAddress {
        self.kernel_end.align_up::<Size4K>()
    }

    /// Number of frames covered by the reference-count table.
    #[inline]
    #[must_use]
    pub const fn frame_count(&self) -> usize {
        ((self.top.as_u64() - self.base.as_u64()) / PAGE_SIZE) as usize
    }

    /// Number of frames seeded into the pool at boot.
    #[inline]
    #[must_use]
    pub const fn pool_frame_count(&self) -> usize {
        let start = self.pool_start().as_u64();
        if start >= self.top.as_u64() {
            0
        } else {
            ((self.top.as_u64() - start) / PAGE_SIZE) as usize
        }
    }

    /// Whether `frame` may legally be passed to the pool's `free`.
    #[inline]
    #[must_use]
    pub const fn is_pool_frame(&self, frame: PhysicalPage<Size4K>) -> bool {
        let pa = frame.base().as_u64();
        pa >= self.pool_start().as_u64() && pa < self.top.as_u64()
    }

    /// Dense table index of `frame`, or `None` outside `[base, top)`.
    #[inline]
    #[must_use]
    pub const fn index_of(&self, frame: PhysicalPage<Size4K>) -> Option<usize> {
        let pa = frame.base().as_u64();
        if pa < self.base.as_u64() || pa >= self.top.as_u64() {
            None
        } else {
            Some(((pa - self.base.as_u64()) / PAGE_SIZE) as usize)
        }
    }
}
