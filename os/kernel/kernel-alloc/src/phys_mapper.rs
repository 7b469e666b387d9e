//! # Physical memory access
//!
//! The allocator never dereferences a physical address directly. Every touch
//! of a frame's bytes (free-list links, scrub fills, file data copied in by
//! the fault path) goes through a [`PhysMapper`], so the same code runs on the
//! board (RAM direct-mapped by the kernel page table) and in host tests (a
//! heap buffer whose host addresses play the role of physical addresses).

use kernel_memory_addresses::PhysicalAddress;

/// Converts physical addresses to usable pointers in the current address space.
pub trait PhysMapper {
    /// Convert a *physical* address to a usable mutable reference.
    ///
    /// # Safety
    /// - `pa` must be mapped as writable and the mapping must stay valid for `'a`.
    /// - Type `T` must match the bytes at `pa` and must not alias another live
    ///   reference to the same memory.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

/// [`PhysMapper`] for kernels that map all of RAM at a fixed offset.
///
/// With `offset == 0` this is the identity map used by the kernel (RAM is
/// mapped at its physical address) and by host tests.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct HhdmPhysMapper {
    offset: u64,
}

impl HhdmPhysMapper {
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self { offset }
    }

    #[must_use]
    pub const fn identity() -> Self {
        Self::new(0)
    }
}

impl PhysMapper for HhdmPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = pa.as_u64().wrapping_add(self.offset) as usize as *mut T;
        // SAFETY: Caller must ensure the physical address is valid and mapped at `offset`.
        unsafe { &mut *va }
    }
}
