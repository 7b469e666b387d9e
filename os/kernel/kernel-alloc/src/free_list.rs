use crate::Frame;
use crate::phys_mapper::PhysMapper;
use kernel_memory_addresses::{PhysicalAddress, Size4K};

/// Link value terminating the list.
const END: u64 = u64::MAX;

/// Header stored in the first bytes of every **free** frame.
///
/// ```text
/// +------------------+--------------------------------------+
/// | Run { next }     |  scrub bytes (FREE_SCRUB) ...        |
/// +------------------+--------------------------------------+
/// ^ frame base                                     frame base + 4096
/// ```
#[repr(C)]
struct Run {
    /// Physical address of the next free frame, or [`END`].
    next: u64,
}

/// Intrusive LIFO list of free frames.
///
/// No metadata lives outside the frames themselves; the list head is the only
/// bookkeeping.
///
/// # Invariants
/// - Every frame reachable from `head` is free and appears exactly once.
/// - `len` equals the number of reachable frames.
pub(crate) struct FreeList {
    head: u64,
    len: usize,
}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self { head: END, len: 0 }
    }

    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Push `frame` as the new head.
    ///
    /// # Safety
    /// - `frame` must be exclusively owned by the caller and reachable through `mapper`.
    /// - `frame` must not already be on the list.
    pub(crate) unsafe fn push<M: PhysMapper>(&mut self, mapper: &M, frame: Frame) {
        let run: &mut Run = unsafe { mapper.phys_to_mut(frame.base()) };
        run.next = self.head;
        self.head = frame.base().as_u64();
        self.len += 1;
    }

    /// Detach the head frame.
    ///
    /// # Safety
    /// The list invariants must hold and every listed frame must be reachable
    /// through `mapper`.
    pub(crate) unsafe fn pop<M: PhysMapper>(&mut self, mapper: &M) -> Option<Frame> {
        if self.head == END {
            return None;
        }
        let frame = PhysicalAddress::new(self.head).page::<Size4K>();
        let run: &mut Run = unsafe { mapper.phys_to_mut(frame.base()) };
        self.head = run.next;
        self.len -= 1;
        Some(frame)
    }
}
