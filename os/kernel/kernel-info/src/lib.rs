//! # Kernel Configuration
//!
//! This crate is the single source of truth for the memory-management
//! constants shared by the page allocator (`kernel-alloc`) and the mapping
//! layer (`kernel-mmap`).
//!
//! ## Physical Memory Layout
//!
//! ```text
//! KERNBASE    ┌─────────────────────────────────┐ 0x8000_0000
//!             │       Kernel Image              │
//!             │   (Text, Data, BSS)             │
//! kernel_end  ├─────────────────────────────────┤ (linker symbol `end`)
//!             │    Available RAM                │
//!             │  (Managed by the page pool)     │
//! PHYSTOP     └─────────────────────────────────┘ KERNBASE + 128 MiB
//! ```
//!
//! The reference-count table covers every frame in `[KERNBASE, PHYSTOP)`,
//! while only `[round_up(kernel_end), PHYSTOP)` is handed to the free pool.
//! The runtime view of this layout is [`MemoryLayout`].
//!
//! ## User Address Space Layout
//!
//! ```text
//! MAXVA       ┌─────────────────────────────────┐
//!             │       Trampoline                │
//! TRAMPOLINE  ├─────────────────────────────────┤
//!             │       Trapframe                 │
//! TRAPFRAME   ├─────────────────────────────────┤ = MMAP_TOP
//!             │   mmap regions (grow down)      │
//!             │            ...                  │
//!             │   heap (grows up)               │
//!             │   text / data / stack           │
//! 0x0         └─────────────────────────────────┘
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod layout;
pub mod memory;

pub use layout::MemoryLayout;
