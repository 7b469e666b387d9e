use crate::{MemoryAddress, MemoryPage, PageSize, VirtualAddress};
use core::fmt;
use core::iter::FusedIterator;

/// Virtual memory page base for size `S`.
///
/// ### Invariants
/// - The low `S::SHIFT` bits of the base are always zero (page aligned).
///
/// ```rust
/// # use kernel_memory_addresses::*;
/// let va = VirtualAddress::new(0x4000_1234);
/// let vp = VirtualPage::<Size4K>::containing(va);
/// assert_eq!(vp.base().as_u64(), 0x4000_1000);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPage<S: PageSize>(pub(crate) MemoryPage<S>);

impl<S: PageSize> VirtualPage<S> {
    /// Page that contains `va` (aligns down to page boundary).
    #[inline]
    #[must_use]
    pub const fn containing(va: VirtualAddress) -> Self {
        Self(MemoryPage::from_addr(va.0))
    }

    /// Page starting exactly at `va`.
    #[inline]
    #[must_use]
    pub const fn from_aligned(va: VirtualAddress) -> Option<Self> {
        match MemoryPage::from_aligned(va.0) {
            Some(p) => Some(Self(p)),
            None => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress(self.0.base())
    }

    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.next() {
            Some(p) => Some(Self(p)),
            None => None,
        }
    }

    /// All pages whose base lies in `[start, end)`. Both bounds are aligned
    /// down first.
    #[inline]
    #[must_use]
    pub const fn range(start: VirtualAddress, end: VirtualAddress) -> VirtualPageRange<S> {
        VirtualPageRange {
            next: Self::containing(start),
            end: Self::containing(end),
        }
    }
}

impl<S> fmt::Display for VirtualPage<S>
where
    S: PageSize,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl<S: PageSize> fmt::Debug for VirtualPage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPage({:#018X})", self.0.base().as_u64())
    }
}

impl<S: PageSize> TryFrom<VirtualAddress> for VirtualPage<S> {
    type Error = VirtualAddress;

    #[inline]
    fn try_from(va: VirtualAddress) -> Result<Self, VirtualAddress> {
        Self::from_aligned(va).ok_or(va)
    }
}

impl<S: PageSize> From<VirtualPage<S>> for MemoryAddress {
    #[inline]
    fn from(p: VirtualPage<S>) -> Self {
        p.0.base()
    }
}

/// Ascending iterator over the pages of a half-open virtual range.
#[derive(Clone, Debug)]
pub struct VirtualPageRange<S: PageSize> {
    next: VirtualPage<S>,
    end: VirtualPage<S>,
}

impl<S: PageSize> VirtualPageRange<S> {
    /// Number of pages left in the range.
    #[must_use]
    pub fn page_count(&self) -> u64 {
        if self.next >= self.end {
            0
        } else {
            (self.end.base() - self.next.base()) >> S::SHIFT
        }
    }
}

impl<S: PageSize> Iterator for VirtualPageRange<S> {
    type Item = VirtualPage<S>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let current = self.next;
        // `end` bounds the walk, so the successor exists whenever we get here.
        self.next = current.next().unwrap_or(self.end);
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.page_count()).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}

impl<S: PageSize> FusedIterator for VirtualPageRange<S> {}
