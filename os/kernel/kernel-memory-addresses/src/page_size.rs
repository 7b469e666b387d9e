use core::fmt;
use core::hash::Hash;

mod sealed {
    pub trait Sealed {}
}

/// Page granularity used by the address and page types.
///
/// Sealed: the kernel only maps Sv39 base pages, so [`Size4K`] is the one
/// implementation.
pub trait PageSize:
    sealed::Sealed + Clone + Copy + Eq + PartialEq + Ord + PartialOrd + Hash + fmt::Debug
{
    /// Number of in-page offset bits.
    const SHIFT: u32;
    /// Page size in bytes.
    const SIZE: u64 = 1 << Self::SHIFT;
    /// In-page offset bits of an address.
    const MASK: u64 = Self::SIZE - 1;
}

/// Sv39 base page, 4096 bytes.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Size4K;

impl sealed::Sealed for Size4K {}

impl PageSize for Size4K {
    const SHIFT: u32 = 12;
}

impl fmt::Debug for Size4K {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("4K")
    }
}
