//! Per-process file mappings.

use crate::file::{FileError, MappedFile};
use crate::journal::{Journal, Transaction};
use crate::page_table::{MapError, PageMapper};
use crate::vma::{Vma, VmaId};
use crate::{Access, Page, Protection, Sharing};
use kernel_alloc::{Frame, PageAllocator, PhysMapper};
use kernel_info::memory::{MMAP_TOP, NVMA, PAGE_SIZE};
use kernel_memory_addresses::{Size4K, VirtualAddress, VirtualPage};
use log::{debug, trace, warn};
use thiserror::Error;

#[derive(Debug, Copy, Clone, Error, Eq, PartialEq)]
pub enum MmapError {
    #[error("length {0:#x} does not fit below the mmap watermark")]
    InvalidLength(u64),
    #[error("file offset {0:#x} is unaligned or runs past the end of the file space")]
    InvalidOffset(u64),
    #[error("all VMA slots are in use")]
    NoFreeSlot,
    #[error("readable mapping of a file not open for reading")]
    NotReadable,
    #[error("shared writable mapping of a file not open for writing")]
    NotWritable,
}

#[derive(Debug, Copy, Clone, Error, Eq, PartialEq)]
pub enum MunmapError {
    #[error("empty or overflowing range at {0}")]
    InvalidRange(VirtualAddress),
    #[error("no mapping covers {begin}..{end}")]
    NoMatchingVma {
        begin: VirtualAddress,
        end: VirtualAddress,
    },
    #[error("writeback of the page at {page} failed")]
    Writeback {
        page: VirtualAddress,
        #[source]
        source: FileError,
    },
}

#[derive(Debug, Copy, Clone, Error, Eq, PartialEq)]
pub enum FaultError {
    #[error("no mapping at {0}")]
    NotMapped(VirtualAddress),
    #[error("{access:?} access to {addr} not permitted")]
    ProtectionViolation { addr: VirtualAddress, access: Access },
    #[error("out of physical memory")]
    OutOfMemory,
    #[error("reading the backing file failed")]
    Read(#[source] FileError),
    #[error("installing the mapping failed")]
    Map(#[source] MapError),
}

/// Where an unmapped range sits inside its VMA.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Trim {
    Whole,
    Prefix,
    Suffix,
}

/// The file mappings of one process.
///
/// Regions are placed top-down starting just below the trapframe; the
/// watermark only moves down, so live regions never overlap and unmapped
/// address space is not reused.
pub struct MmapSpace<F, const N: usize = NVMA> {
    slots: [Option<Vma<F>>; N],
    watermark: VirtualAddress,
}

impl<F: MappedFile, const N: usize> Default for MmapSpace<F, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: MappedFile, const N: usize> MmapSpace<F, N> {
    /// Empty space with the watermark at [`MMAP_TOP`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_top(VirtualAddress::new(MMAP_TOP))
    }

    /// Empty space placing regions below `top`.
    ///
    /// # Panics
    /// If `top` is not page aligned.
    #[must_use]
    pub fn with_top(top: VirtualAddress) -> Self {
        assert!(top.is_aligned::<Size4K>(), "mmap top {top} must be page aligned");
        Self {
            slots: core::array::from_fn(|_| None),
            watermark: top,
        }
    }

    /// Lowest address handed out so far.
    #[must_use]
    pub const fn watermark(&self) -> VirtualAddress {
        self.watermark
    }

    #[must_use]
    pub fn vma(&self, id: VmaId) -> Option<&Vma<F>> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// The region whose bytes include `va`.
    #[must_use]
    pub fn find(&self, va: VirtualAddress) -> Option<VmaId> {
        self.iter().find(|(_, vma)| vma.contains(va)).map(|(id, _)| id)
    }

    /// Active regions in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (VmaId, &Vma<F>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|vma| (VmaId(i), vma)))
    }

    /// Number of active regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Reserves `length` bytes of address space backed by `file` from
    /// `offset` on. No page is mapped until it is touched.
    ///
    /// `hint` is ignored. `offset` must be page aligned and the region must
    /// not extend past the largest file offset. The region takes its own
    /// reference to `file`.
    ///
    /// # Errors
    /// See [`MmapError`]. A failed call changes nothing.
    pub fn mmap(
        &mut self,
        _hint: VirtualAddress,
        length: u64,
        prot: Protection,
        sharing: Sharing,
        file: &F,
        offset: u64,
    ) -> Result<VirtualAddress, MmapError> {
        let result = self.reserve(length, prot, sharing, file, offset);
        match &result {
            Ok(addr) => debug!("mmap {addr}+{length:#x} {prot:?} {sharing:?} @{offset:#x}"),
            Err(e) => warn!("mmap of {length:#x} bytes rejected: {e}"),
        }
        result
    }

    fn reserve(
        &mut self,
        length: u64,
        prot: Protection,
        sharing: Sharing,
        file: &F,
        offset: u64,
    ) -> Result<VirtualAddress, MmapError> {
        let base = match self.watermark.checked_sub(length) {
            Some(lowest) if length > 0 => lowest.align_down::<Size4K>(),
            _ => return Err(MmapError::InvalidLength(length)),
        };

        // Every page of the region, rounded out, must have a representable
        // file offset.
        let spans_file = offset % PAGE_SIZE == 0
            && offset.checked_add(self.watermark - base).is_some();
        if !spans_file {
            return Err(MmapError::InvalidOffset(offset));
        }

        if prot.contains(Protection::READ) && !file.readable() {
            return Err(MmapError::NotReadable);
        }
        if prot.contains(Protection::WRITE) && sharing == Sharing::Shared && !file.writable() {
            return Err(MmapError::NotWritable);
        }

        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.is_none())
            .ok_or(MmapError::NoFreeSlot)?;

        *slot = Some(Vma {
            addr: base,
            length,
            prot,
            sharing,
            file: file.dup(),
            offset,
        });
        self.watermark = base;
        Ok(base)
    }

    /// Populates the page containing `va` after a page fault.
    ///
    /// Reads one page of the file into a fresh frame (zero-filling past end
    /// of file) and maps it with the region's protection.
    ///
    /// # Errors
    /// See [`FaultError`]. Any error is fatal to the faulting process. No
    /// frame is leaked on failure.
    pub fn handle_fault<M, P>(
        &self,
        va: VirtualAddress,
        access: Access,
        pool: &PageAllocator<M>,
        page_table: &mut P,
    ) -> Result<Frame, FaultError>
    where
        M: PhysMapper,
        P: PageMapper + ?Sized,
    {
        let Some(vma) = self.iter().map(|(_, vma)| vma).find(|vma| vma.contains(va)) else {
            return Err(FaultError::NotMapped(va));
        };

        let page = Page::containing(va);
        if page_table.translate(page).is_some() || !vma.prot.permits(access) {
            return Err(FaultError::ProtectionViolation { addr: va, access });
        }

        let frame = pool.allocate().ok_or(FaultError::OutOfMemory)?;
        let file_offset = vma.offset + vma.page_offset(page);

        // SAFETY: the frame was just allocated and is not mapped anywhere yet.
        let bytes = unsafe { pool.frame_bytes(frame) };
        let read = match vma.file.read_at(file_offset, bytes) {
            Ok(n) => n.min(bytes.len()),
            Err(e) => {
                pool.free(frame);
                return Err(FaultError::Read(e));
            }
        };
        bytes[read..].fill(0);

        if let Err(e) = page_table.map(page, frame, vma.prot.leaf_flags()) {
            pool.free(frame);
            return Err(FaultError::Map(e));
        }

        trace!("fault {access:?} at {va}: mapped {page} -> {frame} ({read} bytes from file)");
        Ok(frame)
    }

    /// Removes the pages of `[addr, addr + length)`, rounded out to page
    /// boundaries.
    ///
    /// The range must cover a whole region, its start, or its end. Resident
    /// pages of shared writable regions are written back first, each in its
    /// own file-system transaction. Every resident page is then unmapped and
    /// its frame released.
    ///
    /// # Errors
    /// See [`MunmapError`]. A writeback failure leaves the pages before the
    /// failing one written back and unmapped, and the region unchanged.
    ///
    /// # Panics
    /// If the range would punch a hole into the middle of a region, or if a
    /// shared writable region's file is no longer writable.
    pub fn munmap<M, P, J>(
        &mut self,
        addr: VirtualAddress,
        length: u64,
        pool: &PageAllocator<M>,
        page_table: &mut P,
        journal: &J,
    ) -> Result<(), MunmapError>
    where
        M: PhysMapper,
        P: PageMapper + ?Sized,
        J: Journal + ?Sized,
    {
        let begin = addr.align_down::<Size4K>();
        let end = match addr.checked_add(length) {
            Some(end) if length > 0 && end.as_u64() <= u64::MAX - PAGE_SIZE => end.align_up::<Size4K>(),
            _ => {
                warn!("munmap of {length:#x} bytes at {addr} rejected");
                return Err(MunmapError::InvalidRange(addr));
            }
        };

        let Some((index, vma)) = self.slots.iter_mut().enumerate().find_map(|(i, slot)| {
            slot.as_mut()
                .filter(|vma| vma.addr <= begin && end <= vma.page_end())
                .map(|vma| (i, vma))
        }) else {
            warn!("munmap {begin}..{end}: no mapping covers the range");
            return Err(MunmapError::NoMatchingVma { begin, end });
        };

        let trim = match (begin == vma.addr, end == vma.page_end()) {
            (true, true) => Trim::Whole,
            (true, false) => Trim::Prefix,
            (false, true) => Trim::Suffix,
            (false, false) => panic!("munmap {begin}..{end} would split {vma:?}"),
        };

        Self::release_pages(vma, begin, end, pool, page_table, journal)?;

        let id = VmaId(index);
        match trim {
            Trim::Whole => {
                self.slots[index] = None;
                debug!("munmap {begin}..{end}: {id} released");
            }
            Trim::Prefix => {
                let cut = end - begin;
                vma.addr = end;
                vma.offset += cut;
                vma.length -= cut;
                debug!("munmap {begin}..{end}: {id} now starts at {end}");
            }
            Trim::Suffix => {
                vma.length = begin - vma.addr;
                debug!("munmap {begin}..{end}: {id} now ends at {begin}");
            }
        }
        Ok(())
    }

    fn release_pages<M, P, J>(
        vma: &Vma<F>,
        begin: VirtualAddress,
        end: VirtualAddress,
        pool: &PageAllocator<M>,
        page_table: &mut P,
        journal: &J,
    ) -> Result<(), MunmapError>
    where
        M: PhysMapper,
        P: PageMapper + ?Sized,
        J: Journal + ?Sized,
    {
        let write_back = vma.is_shared_writable();
        if write_back {
            assert!(vma.file.writable(), "shared writable mapping over a read-only file");
        }

        for page in VirtualPage::<Size4K>::range(begin, end) {
            let Some(frame) = page_table.translate(page) else {
                continue;
            };

            if write_back {
                Self::write_back(vma, page, frame, pool, journal)
                    .map_err(|source| MunmapError::Writeback { page: page.base(), source })?;
            }

            page_table.unmap(page);
            pool.free(frame);
        }
        Ok(())
    }

    /// Writes the mapped bytes of `page` to the file, clipped to the region's
    /// length.
    fn write_back<M, J>(
        vma: &Vma<F>,
        page: Page,
        frame: Frame,
        pool: &PageAllocator<M>,
        journal: &J,
    ) -> Result<(), FileError>
    where
        M: PhysMapper,
        J: Journal + ?Sized,
    {
        let offset = vma.page_offset(page);
        #[allow(clippy::cast_possible_truncation)]
        let len = vma.length.saturating_sub(offset).min(PAGE_SIZE) as usize;
        if len == 0 {
            return Ok(());
        }

        // SAFETY: the frame is mapped by this region, which holds a reference.
        let bytes = unsafe { pool.frame_bytes(frame) };

        let _tx = Transaction::begin(journal);
        let written = vma.file.write_at(vma.offset + offset, &bytes[..len])?;
        if written != len {
            return Err(FileError::ShortTransfer {
                expected: len,
                actual: written,
            });
        }
        trace!("wrote back {len} bytes of {page} at file offset {:#x}", vma.offset + offset);
        Ok(())
    }

    /// Releases every region, as on process exit.
    ///
    /// # Errors
    /// The first writeback failure. Regions after it stay mapped.
    pub fn unmap_all<M, P, J>(
        &mut self,
        pool: &PageAllocator<M>,
        page_table: &mut P,
        journal: &J,
    ) -> Result<(), MunmapError>
    where
        M: PhysMapper,
        P: PageMapper + ?Sized,
        J: Journal + ?Sized,
    {
        for index in 0..N {
            let Some((addr, length)) = self.slots[index].as_ref().map(|vma| (vma.addr, vma.length)) else {
                continue;
            };
            self.munmap(addr, length, pool, page_table, journal)?;
        }
        Ok(())
    }

    /// Copy of this space for a forked child.
    ///
    /// Regions and the watermark are duplicated and every region takes its own
    /// file reference. No pages are shared; the child faults them in from the
    /// file.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            slots: core::array::from_fn(|i| self.slots[i].as_ref().map(Vma::duplicate)),
            watermark: self.watermark,
        }
    }
}
