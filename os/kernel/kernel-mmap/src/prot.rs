//! Access rights of a mapping and the leaf flags they translate to.

use bitfield_struct::bitfield;
use bitflags::bitflags;

bitflags! {
    /// What user code may do with a mapped region.
    ///
    /// The bit values match the `PROT_*` syscall constants.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
    pub struct Protection: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
    }
}

impl Protection {
    /// Whether a fault of kind `access` is allowed on this region.
    ///
    /// Mapped file regions are never executable.
    #[must_use]
    pub const fn permits(self, access: Access) -> bool {
        match access {
            Access::Read => self.contains(Self::READ),
            Access::Write => self.contains(Self::WRITE),
            Access::Execute => false,
        }
    }

    /// User leaf flags for a page of this region.
    ///
    /// Sv39 reserves `W` without `R`, so a writable page is always readable
    /// once mapped.
    #[must_use]
    pub const fn leaf_flags(self) -> PteFlags {
        let writable = self.contains(Self::WRITE);
        PteFlags::new()
            .with_valid(true)
            .with_user(true)
            .with_readable(writable || self.contains(Self::READ))
            .with_writable(writable)
    }
}

/// Whether stores reach the backing file.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Sharing {
    /// Modified pages are written back on unmap.
    Shared,
    /// Modifications stay private to the process.
    Private,
}

/// The kind of access that trapped.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Access {
    Read,
    Write,
    Execute,
}

impl Access {
    /// Decodes a RISC-V `scause` page-fault exception code.
    ///
    /// ```rust
    /// # use kernel_mmap::Access;
    /// assert_eq!(Access::from_scause(13), Some(Access::Read));
    /// assert_eq!(Access::from_scause(15), Some(Access::Write));
    /// assert_eq!(Access::from_scause(8), None);
    /// ```
    #[must_use]
    pub const fn from_scause(scause: u64) -> Option<Self> {
        match scause {
            12 => Some(Self::Execute),
            13 => Some(Self::Read),
            15 => Some(Self::Write),
            _ => None,
        }
    }
}

/// Sv39 leaf page-table entry flags (the low ten bits of an entry).
///
/// | Bit | Name | Meaning |
/// |-----|------|---------|
/// | 0   | `V`  | Valid |
/// | 1   | `R`  | Readable |
/// | 2   | `W`  | Writable |
/// | 3   | `X`  | Executable |
/// | 4   | `U`  | Accessible from user mode |
/// | 5   | `G`  | Global mapping |
/// | 6   | `A`  | Accessed |
/// | 7   | `D`  | Dirty |
/// | 8–9 | RSW  | Reserved for software |
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PteFlags {
    pub valid: bool,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
    pub user: bool,
    pub global: bool,
    pub accessed: bool,
    pub dirty: bool,
    #[bits(2)]
    pub software: u8,
    #[bits(54)]
    __: u64,
}
