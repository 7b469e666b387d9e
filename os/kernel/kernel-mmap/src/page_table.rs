use crate::{Page, PteFlags};
use kernel_alloc::Frame;
use kernel_memory_addresses::VirtualAddress;
use thiserror::Error;

#[derive(Debug, Copy, Clone, Error, Eq, PartialEq)]
pub enum MapError {
    #[error("virtual address {0} is already mapped")]
    AlreadyMapped(VirtualAddress),
    #[error("no memory for intermediate page tables")]
    OutOfMemory,
}

/// The user page table of the process owning an [`MmapSpace`](crate::MmapSpace).
///
/// Only 4 KiB leaf mappings are created through this interface.
pub trait PageMapper {
    /// Frame currently mapped at `page`, if any.
    fn translate(&self, page: Page) -> Option<Frame>;

    /// Install a leaf mapping `page → frame`.
    ///
    /// # Errors
    /// [`MapError::AlreadyMapped`] if `page` has a valid leaf,
    /// [`MapError::OutOfMemory`] if a table page could not be allocated.
    fn map(&mut self, page: Page, frame: Frame, flags: PteFlags) -> Result<(), MapError>;

    /// Remove the leaf at `page` and return the frame it pointed to. The
    /// frame itself is left to the caller.
    fn unmap(&mut self, page: Page) -> Option<Frame>;
}
