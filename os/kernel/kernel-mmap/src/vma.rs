use crate::file::MappedFile;
use crate::{Page, Protection, Sharing};
use core::fmt;
use kernel_memory_addresses::{Size4K, VirtualAddress};

/// Slot index of a VMA inside its [`MmapSpace`](crate::MmapSpace).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VmaId(pub(crate) usize);

impl VmaId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VmaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vma#{}", self.0)
    }
}

/// One contiguous file-backed region of a process address space.
///
/// `addr` is page aligned. `length` is the byte length requested by the
/// caller and need not be; the region still owns every page up to
/// [`page_end`](Self::page_end).
pub struct Vma<F> {
    pub(crate) addr: VirtualAddress,
    pub(crate) length: u64,
    pub(crate) prot: Protection,
    pub(crate) sharing: Sharing,
    pub(crate) file: F,
    pub(crate) offset: u64,
}

impl<F> Vma<F> {
    #[must_use]
    pub const fn addr(&self) -> VirtualAddress {
        self.addr
    }

    #[must_use]
    pub const fn length(&self) -> u64 {
        self.length
    }

    #[must_use]
    pub const fn prot(&self) -> Protection {
        self.prot
    }

    #[must_use]
    pub const fn sharing(&self) -> Sharing {
        self.sharing
    }

    #[must_use]
    pub const fn file(&self) -> &F {
        &self.file
    }

    /// File offset backing [`addr`](Self::addr).
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// First byte past the requested length.
    #[must_use]
    pub fn end(&self) -> VirtualAddress {
        self.addr + self.length
    }

    /// First byte past the last page of the region.
    #[must_use]
    pub fn page_end(&self) -> VirtualAddress {
        self.end().align_up::<Size4K>()
    }

    /// Whether `va` falls inside `[addr, addr + length)`.
    #[must_use]
    pub fn contains(&self, va: VirtualAddress) -> bool {
        va >= self.addr && va < self.end()
    }

    /// Stores to this region must reach the file.
    #[must_use]
    pub const fn is_shared_writable(&self) -> bool {
        matches!(self.sharing, Sharing::Shared) && self.prot.contains(Protection::WRITE)
    }

    /// Byte offset of `page` from the start of the region.
    pub(crate) fn page_offset(&self, page: Page) -> u64 {
        page.base() - self.addr
    }
}

impl<F: MappedFile> Vma<F> {
    /// Same region with its own file reference.
    pub(crate) fn duplicate(&self) -> Self {
        Self {
            addr: self.addr,
            length: self.length,
            prot: self.prot,
            sharing: self.sharing,
            file: self.file.dup(),
            offset: self.offset,
        }
    }
}

impl<F> fmt::Debug for Vma<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vma")
            .field("addr", &self.addr)
            .field("length", &self.length)
            .field("prot", &self.prot)
            .field("sharing", &self.sharing)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}
