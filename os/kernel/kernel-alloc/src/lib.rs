//! # Kernel Physical Page Pool
//!
//! Hands out and takes back 4 KiB physical frames for page tables, user
//! memory and file-backed mappings. Frames may be shared: each one carries a
//! reference count, and a frame only returns to the pool when the last
//! holder lets go.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 PageAllocator                       │
//! │    • allocate / free / share                        │
//! │    • scrub fills (alloc 0x05, free 0x01)            │
//! └───────────┬──────────────────────────┬──────────────┘
//!             │                          │
//! ┌───────────▼─────────────┐ ┌──────────▼──────────────┐
//! │        FreeList         │ │      RefCountTable      │
//! │  links stored in the    │ │  one u32 per frame in   │
//! │  free frames themselves │ │  [base, top), one lock  │
//! └───────────┬─────────────┘ └─────────────────────────┘
//!             │
//! ┌───────────▼─────────────────────────────────────────┐
//! │                 PhysMapper                          │
//! │    • physical address → usable reference            │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Bootstrap
//!
//! [`PageAllocator::new`] sets every counter to one and then frees each
//! frame between the end of the kernel image and the top of RAM. That single
//! path drops the count to zero, scrubs the frame and links it, so boot and
//! steady-state frees cannot disagree.
//!
//! ## Concurrency
//!
//! The free list and the reference-count table each sit behind their own
//! [`SpinLock`](kernel_sync::SpinLock). `allocate` and `free` never hold both
//! at once.
//!
//! ## Example
//!
//! ```rust
//! use kernel_alloc::{HhdmPhysMapper, PageAllocator};
//! use kernel_info::MemoryLayout;
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! #[repr(align(4096))]
//! struct Page([u8; 4096]);
//!
//! let mut ram: Vec<Page> = (0..4).map(|_| Page([0; 4096])).collect();
//! let base = PhysicalAddress::from_ptr(ram.as_mut_ptr());
//! let layout = MemoryLayout::new(base, base, base + 4 * 4096);
//!
//! let pool = unsafe { PageAllocator::new(layout, HhdmPhysMapper::identity()) };
//! assert_eq!(pool.free_frames(), 4);
//!
//! let frame = pool.allocate().unwrap();
//! assert_eq!(pool.ref_counts().get(frame), 1);
//! pool.free(frame);
//! assert_eq!(pool.free_frames(), 4);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod frame_alloc;
mod free_list;
mod phys_mapper;
mod ref_count;

use kernel_memory_addresses::{PhysicalPage, Size4K};

pub use frame_alloc::PageAllocator;
pub use phys_mapper::{HhdmPhysMapper, PhysMapper};
pub use ref_count::{RefCountGuard, RefCountTable};

/// A 4 KiB physical frame.
pub type Frame = PhysicalPage<Size4K>;
