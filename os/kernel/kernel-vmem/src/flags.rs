//! # Protection and Mapping Flags
//!
//! Both types use the POSIX bit positions (`PROT_*`, `MAP_*`) so that values
//! coming in through a system-call interface convert with
//! [`from_bits`](Protection::from_bits) and no translation table.

use bitfield_struct::bitfield;

/// Access rights of a VMA (`PROT_READ | PROT_WRITE | PROT_EXEC`).
///
/// ```rust
/// # use kernel_vmem::Protection;
/// let rw = Protection::new().with_read(true).with_write(true);
/// assert_eq!(rw.into_bits(), 0x3);
/// assert_eq!(Protection::from_bits(0x5), Protection::READ_EXEC);
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct Protection {
    /// `PROT_READ` (bit 0).
    pub read: bool,
    /// `PROT_WRITE` (bit 1).
    pub write: bool,
    /// `PROT_EXEC` (bit 2).
    pub exec: bool,
    #[bits(29)]
    __: u32,
}

impl Protection {
    /// `PROT_NONE`: any access faults.
    pub const NONE: Self = Self::new();
    pub const READ: Self = Self::new().with_read(true);
    pub const READ_WRITE: Self = Self::new().with_read(true).with_write(true);
    pub const READ_EXEC: Self = Self::new().with_read(true).with_exec(true);

    #[must_use]
    pub const fn is_none(self) -> bool {
        self.into_bits() == 0
    }
}

/// How a VMA is mapped (`MAP_SHARED`, `MAP_PRIVATE`, `MAP_FIXED`, `MAP_ANONYMOUS`, `MAP_GROWSDOWN`).
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct MapFlags {
    /// `MAP_SHARED` (bit 0): writes are visible to other mappings of the object.
    pub shared: bool,
    /// `MAP_PRIVATE` (bit 1): copy-on-write.
    pub private: bool,
    #[bits(2)]
    __low: u8,
    /// `MAP_FIXED` (bit 4): the start address is mandatory.
    pub fixed: bool,
    /// `MAP_ANONYMOUS` (bit 5): no backing object, zero-filled.
    pub anonymous: bool,
    #[bits(2)]
    __mid: u8,
    /// `MAP_GROWSDOWN` (bit 8): stack-like region.
    pub grows_down: bool,
    #[bits(23)]
    __high: u32,
}

impl MapFlags {
    /// `MAP_PRIVATE | MAP_ANONYMOUS`, the usual heap or stack mapping.
    pub const PRIVATE_ANONYMOUS: Self = Self::new().with_private(true).with_anonymous(true);

    /// Exactly one of shared and private must be set.
    #[must_use]
    pub const fn is_consistent(self) -> bool {
        self.shared() != self.private()
    }
}
