//! # File-backed memory mappings
//!
//! Per-process `mmap`/`munmap` with demand paging.
//!
//! ```text
//!  mmap ──► MmapSpace ──► VMA slot (addr, length, prot, sharing, file, offset)
//!                            │
//!  page fault ──► handle_fault ──► PageAllocator::allocate
//!                            │        MappedFile::read_at
//!                            │        PageMapper::map
//!                            │
//!  munmap ──► write back (one Transaction per page)
//!             PageMapper::unmap ──► PageAllocator::free
//! ```
//!
//! `mmap` only records a region; nothing is mapped until a page is touched.
//! Regions are handed out top-down from just below the trapframe and the
//! address space they occupied is not reused after unmapping.
//!
//! ## Collaborators
//!
//! The page table, the open-file object and the file-system log live
//! elsewhere in the kernel. They are reached through [`PageMapper`],
//! [`MappedFile`] and [`Journal`]; physical frames come from a
//! [`PageAllocator`](kernel_alloc::PageAllocator).
//!
//! ## Writeback
//!
//! Unmapping a page of a shared writable region writes the page (clipped to
//! the region's length) back to the file inside its own file-system
//! transaction. A failure part-way leaves the pages before it written back
//! and unmapped.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod file;
mod journal;
mod page_table;
mod prot;
mod space;
pub mod syscall;
mod vma;

use kernel_memory_addresses::{Size4K, VirtualPage};

pub use file::{FileError, MappedFile};
pub use journal::{Journal, Transaction};
pub use page_table::{MapError, PageMapper};
pub use prot::{Access, Protection, PteFlags, Sharing};
pub use space::{FaultError, MmapError, MmapSpace, MunmapError};
pub use vma::{Vma, VmaId};

/// A 4 KiB user page.
pub type Page = VirtualPage<Size4K>;
