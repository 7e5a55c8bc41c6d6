//! # Firmware Memory Map Entries

use kernel_memory_addresses::PhysicalAddress;

/// Classification of a memory-map region as reported by the boot stage.
///
/// Only [`MemoryType::Available`] regions are handed to the page allocator.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MemoryType {
    Available = 1,
    Reserved = 2,
    AcpiReclaimable = 3,
    AcpiNvs = 4,
    Bad = 5,
    BootloaderCode = 6,
    BootloaderData = 7,
    RuntimeCode = 8,
    RuntimeData = 9,
    Conventional = 10,
    Unusable = 11,
    Persistent = 12,
}

impl MemoryType {
    /// Decode a raw `kind` value; unknown codes yield `None`.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            1 => Self::Available,
            2 => Self::Reserved,
            3 => Self::AcpiReclaimable,
            4 => Self::AcpiNvs,
            5 => Self::Bad,
            6 => Self::BootloaderCode,
            7 => Self::BootloaderData,
            8 => Self::RuntimeCode,
            9 => Self::RuntimeData,
            10 => Self::Conventional,
            11 => Self::Unusable,
            12 => Self::Persistent,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for MemoryType {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_raw(value).ok_or(value)
    }
}

/// One region of the firmware memory map.
///
/// `kind` is kept raw so that records from newer boot stages still parse;
/// see [`memory_type`](Self::memory_type).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemoryMapEntry {
    pub base_address: u64,
    /// Length in bytes.
    pub length: u64,
    pub kind: u32,
    pub attributes: u32,
}

impl MemoryMapEntry {
    /// Filler for unused slots of [`BootInfo::memory_map`](crate::BootInfo::memory_map).
    pub const EMPTY: Self = Self {
        base_address: 0,
        length: 0,
        kind: 0,
        attributes: 0,
    };

    #[must_use]
    pub const fn new(base_address: u64, length: u64, kind: MemoryType) -> Self {
        Self {
            base_address,
            length,
            kind: kind.as_raw(),
            attributes: 0,
        }
    }

    #[must_use]
    pub const fn memory_type(&self) -> Option<MemoryType> {
        MemoryType::from_raw(self.kind)
    }

    /// `true` for regions the page allocator may take over.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.kind == MemoryType::Available as u32
    }

    /// One past the last byte; saturates instead of wrapping.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base_address.saturating_add(self.length)
    }

    #[must_use]
    pub const fn base(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.base_address)
    }

    #[must_use]
    pub const fn end_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_kinds() {
        for raw in 1..=12 {
            let kind = MemoryType::from_raw(raw).expect("known code");
            assert_eq!(kind.as_raw(), raw);
        }
        assert_eq!(MemoryType::from_raw(0), None);
        assert_eq!(MemoryType::try_from(13), Err(13));
    }

    #[test]
    fn entry_bounds() {
        let e = MemoryMapEntry::new(0x20_0000, 0x1E0_0000, MemoryType::Available);
        assert_eq!(e.end(), 0x200_0000);
        assert_eq!(e.end_address().as_u64(), 0x200_0000);
        assert!(e.base().is_page_aligned());
        assert!(e.is_available());
        assert_eq!(e.memory_type(), Some(MemoryType::Available));

        let weird = MemoryMapEntry {
            kind: 99,
            ..MemoryMapEntry::EMPTY
        };
        assert_eq!(weird.memory_type(), None);
        assert!(!weird.is_available());
    }
}
