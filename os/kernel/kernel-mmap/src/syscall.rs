//! Raw `mmap`/`munmap` system-call entry points.
//!
//! Argument fetching and descriptor lookup happen in the trap layer; these
//! functions take the decoded register values and return what goes back in
//! `a0`.

use crate::file::MappedFile;
use crate::journal::Journal;
use crate::page_table::PageMapper;
use crate::space::MmapSpace;
use crate::{Protection, Sharing};
use kernel_alloc::{PageAllocator, PhysMapper};
use kernel_memory_addresses::VirtualAddress;
use log::warn;

pub const PROT_NONE: u64 = 0;
pub const PROT_READ: u64 = 1;
pub const PROT_WRITE: u64 = 2;

pub const MAP_SHARED: u64 = 1;
pub const MAP_PRIVATE: u64 = 2;

/// Returned by `mmap` on failure.
pub const MAP_FAILED: u64 = u64::MAX;

/// `-1` as seen in `a0`.
pub const SYSCALL_ERROR: u64 = u64::MAX;

/// `mmap(addr, length, prot, flags, fd, offset)`.
///
/// `file` is the open file behind `fd`, or `None` if the descriptor was
/// invalid. Returns the mapped address or [`MAP_FAILED`].
pub fn sys_mmap<F: MappedFile, const N: usize>(
    space: &mut MmapSpace<F, N>,
    addr: u64,
    length: u64,
    prot: u64,
    flags: u64,
    file: Option<&F>,
    offset: u64,
) -> u64 {
    let Some(file) = file else {
        warn!("mmap: bad file descriptor");
        return MAP_FAILED;
    };
    let Some(prot) = u32::try_from(prot).ok().and_then(Protection::from_bits) else {
        warn!("mmap: unknown protection bits {prot:#x}");
        return MAP_FAILED;
    };
    let sharing = match flags {
        MAP_SHARED => Sharing::Shared,
        MAP_PRIVATE => Sharing::Private,
        _ => {
            warn!("mmap: unsupported flags {flags:#x}");
            return MAP_FAILED;
        }
    };

    space
        .mmap(VirtualAddress::new(addr), length, prot, sharing, file, offset)
        .map_or(MAP_FAILED, VirtualAddress::as_u64)
}

/// `munmap(addr, length)`. Returns `0` or [`SYSCALL_ERROR`].
///
/// # Panics
/// On the invariant violations described at [`MmapSpace::munmap`].
pub fn sys_munmap<F, M, P, J, const N: usize>(
    space: &mut MmapSpace<F, N>,
    addr: u64,
    length: u64,
    pool: &PageAllocator<M>,
    page_table: &mut P,
    journal: &J,
) -> u64
where
    F: MappedFile,
    M: PhysMapper,
    P: PageMapper + ?Sized,
    J: Journal + ?Sized,
{
    match space.munmap(VirtualAddress::new(addr), length, pool, page_table, journal) {
        Ok(()) => 0,
        Err(e) => {
            warn!("munmap: {e}");
            SYSCALL_ERROR
        }
    }
}
