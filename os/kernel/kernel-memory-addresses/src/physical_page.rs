use crate::{MemoryAddress, MemoryPage, PageSize, PhysicalAddress};
use core::fmt;

/// Physical page base for size `S`; the unit the page allocator hands out.
///
/// ### Invariants
/// - The low `S::SHIFT` bits of the base are always zero (page aligned).
///
/// ```rust
/// # use kernel_memory_addresses::*;
/// let frame = PhysicalPage::<Size4K>::from_aligned(PhysicalAddress::new(0x8000_2000)).unwrap();
/// assert_eq!(frame.next().unwrap().base().as_u64(), 0x8000_3000);
/// assert!(PhysicalPage::<Size4K>::from_aligned(PhysicalAddress::new(0x8000_2001)).is_none());
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage<S: PageSize>(pub(crate) MemoryPage<S>);

impl<S: PageSize> PhysicalPage<S> {
    /// Page containing `pa` (aligns down).
    #[inline]
    #[must_use]
    pub const fn containing(pa: PhysicalAddress) -> Self {
        Self(MemoryPage::from_addr(pa.0))
    }

    /// Page starting exactly at `pa`.
    #[inline]
    #[must_use]
    pub const fn from_aligned(pa: PhysicalAddress) -> Option<Self> {
        match MemoryPage::from_aligned(pa.0) {
            Some(p) => Some(Self(p)),
            None => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress(self.0.base())
    }

    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.next() {
            Some(p) => Some(Self(p)),
            None => None,
        }
    }
}

impl<S> fmt::Display for PhysicalPage<S>
where
    S: PageSize,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl<S: PageSize> fmt::Debug for PhysicalPage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage({:#018X})", self.0.base().as_u64())
    }
}

impl<S: PageSize> TryFrom<PhysicalAddress> for PhysicalPage<S> {
    type Error = PhysicalAddress;

    /// Fails with the offending address when it is not page aligned.
    #[inline]
    fn try_from(pa: PhysicalAddress) -> Result<Self, PhysicalAddress> {
        Self::from_aligned(pa).ok_or(pa)
    }
}

impl<S> From<MemoryPage<S>> for PhysicalPage<S>
where
    S: PageSize,
{
    #[inline]
    fn from(p: MemoryPage<S>) -> Self {
        Self(p)
    }
}

impl<S: PageSize> From<PhysicalPage<S>> for MemoryAddress {
    #[inline]
    fn from(p: PhysicalPage<S>) -> Self {
        p.0.base()
    }
}
