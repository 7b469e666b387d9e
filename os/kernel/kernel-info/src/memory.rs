//! # Memory Layout

/// Bytes per physical frame and per virtual page.
pub const PAGE_SIZE: u64 = 4096;

/// Bits of in-page offset.
pub const PAGE_SHIFT: u32 = 12;

/// Start of RAM; the kernel image is loaded here.
pub const KERNBASE: u64 = 0x8000_0000;

/// Top of usable physical memory (exclusive).
pub const PHYSTOP: u64 = KERNBASE + 128 * 1024 * 1024;

/// One past the highest user virtual address (Sv39, top bit excluded to
/// avoid sign extension).
pub const MAXVA: u64 = 1 << (9 + 9 + 9 + 12 - 1);

/// Trampoline page, mapped at the top of every address space.
pub const TRAMPOLINE: u64 = MAXVA - PAGE_SIZE;

/// Per-process trapframe page, just below the trampoline.
pub const TRAPFRAME: u64 = TRAMPOLINE - PAGE_SIZE;

/// Initial value of every process's mmap watermark; regions are placed
/// strictly below it.
pub const MMAP_TOP: u64 = TRAPFRAME;

/// Number of VMA slots per process.
pub const NVMA: usize = 16;

/// Fill byte written into a frame when it is handed out.
pub const ALLOC_SCRUB: u8 = 0x05;

/// Fill byte written into a frame when it returns to the pool.
pub const FREE_SCRUB: u8 = 0x01;

const _: () = {
    assert!(PAGE_SIZE == 1 << PAGE_SHIFT);
    assert!(KERNBASE.is_multiple_of(PAGE_SIZE));
    assert!(PHYSTOP.is_multiple_of(PAGE_SIZE));
    assert!(PHYSTOP > KERNBASE);
    assert!(MMAP_TOP.is_multiple_of(PAGE_SIZE));
    assert!(NVMA > 0);
    assert!(ALLOC_SCRUB != 0 && FREE_SCRUB != 0 && ALLOC_SCRUB != FREE_SCRUB);
};
