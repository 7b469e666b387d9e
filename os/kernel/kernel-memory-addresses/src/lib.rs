//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw memory addresses and 4 KiB page bases used
//! by the page allocator and the mapping layer.
//!
//! | Concept | Description |
//! |----------|-------------|
//! | [`MemoryAddress`] | A raw 64-bit address, either physical or virtual. |
//! | [`MemoryPage<S>`] | A page-aligned base address of a page of size `S`. |
//! | [`VirtualAddress`] / [`VirtualPage<S>`] | Page-table translated memory. |
//! | [`PhysicalAddress`] / [`PhysicalPage<S>`] | Physical frames. |
//!
//! Only [`Size4K`] exists: every frame and every user page in this kernel is
//! 4 KiB.
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x3F_FFFF_D123);
//! let page = va.page::<Size4K>();
//! assert_eq!(page.base().as_u64(), 0x3F_FFFF_D000);
//! assert_eq!(va.offset_in::<Size4K>(), 0x123);
//! assert_eq!(va.align_up::<Size4K>().as_u64(), 0x3F_FFFF_E000);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod memory_address;
mod memory_page;
mod page_size;
mod physical_address;
mod physical_page;
mod virtual_address;
mod virtual_page;

pub use memory_address::MemoryAddress;
pub use memory_page::MemoryPage;
pub use page_size::{PageSize, Size4K};
pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;
pub use virtual_address::VirtualAddress;
pub use virtual_page::{VirtualPage, VirtualPageRange};
