//! # Kernel Boot Interface and Layout Constants
//!
//! Shared definitions between the boot stage and the kernel's memory core.
//!
//! ## Modules
//!
//! ### Boot Information ([`boot`])
//! The fixed-layout [`BootInfo`] record handed over at boot, with header
//! validation ([`BootInfo::validate`]) and the builder helpers a boot stage
//! uses to fill in the memory map.
//!
//! ### Memory Map ([`memory_map`])
//! [`MemoryMapEntry`] and its [`MemoryType`] classification. Only
//! [`MemoryType::Available`] regions feed the page allocator.
//!
//! ### Memory Layout ([`memory`])
//! The direct-map base [`memory::HHDM_BASE`] which the allocator's
//! physical-to-virtual translation uses.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_info::{BootInfo, MemoryMapEntry, MemoryType};
//!
//! let mut info = BootInfo::empty();
//! info.push_memory_entry(MemoryMapEntry::new(0x20_0000, 0x1E0_0000, MemoryType::Available))
//!     .unwrap();
//! info.push_memory_entry(MemoryMapEntry::new(0xF000_0000, 0x1000, MemoryType::Reserved))
//!     .unwrap();
//!
//! assert!(info.validate().is_ok());
//! assert_eq!(info.memory_map().len(), 2);
//! assert_eq!(info.available_memory, 0x1E0_0000);
//! ```
//!
//! All structures crossing the boot boundary are `#[repr(C)]` with fixed-size
//! integers; the crate contains no unsafe code.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
pub mod memory_map;

pub use boot::{
    BOOT_INFO_MAGIC, BOOT_INFO_SIZE, BOOT_INFO_VERSION, BootInfo, BootInfoError, MAX_MEMORY_ENTRIES,
};
pub use memory_map::{MemoryMapEntry, MemoryType};

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Box<BootInfo> {
        let mut info = Box::new(BootInfo::empty());
        info.push_memory_entry(MemoryMapEntry::new(0x0, 0x9_F000, MemoryType::Available))
            .unwrap();
        info.push_memory_entry(MemoryMapEntry::new(0x10_0000, 0x10_0000, MemoryType::BootloaderCode))
            .unwrap();
        info.push_memory_entry(MemoryMapEntry::new(0x20_0000, 0x1E0_0000, MemoryType::Available))
            .unwrap();
        info
    }

    #[test]
    fn empty_record_is_valid() {
        let info = Box::new(BootInfo::empty());
        assert_eq!(info.validate(), Ok(()));
        assert!(info.memory_map().is_empty());
    }

    #[test]
    fn push_keeps_sums() {
        let info = sample();
        assert_eq!(info.memory_map_entries, 3);
        assert_eq!(info.total_memory, 0x9_F000 + 0x10_0000 + 0x1E0_0000);
        assert_eq!(info.available_memory, 0x9_F000 + 0x1E0_0000);
        assert_eq!(info.memory_map()[2].base_address, 0x20_0000);
    }

    #[test]
    fn validate_rejects_bad_headers() {
        let mut info = sample();
        info.magic = 0xDEAD_BEEF;
        assert_eq!(
            info.validate(),
            Err(BootInfoError::BadMagic { found: 0xDEAD_BEEF })
        );

        let mut info = sample();
        info.version = 7;
        assert_eq!(
            info.validate(),
            Err(BootInfoError::UnsupportedVersion { found: 7 })
        );

        let mut info = sample();
        info.size = 64;
        assert_eq!(
            info.validate(),
            Err(BootInfoError::SizeMismatch {
                expected: BOOT_INFO_SIZE,
                found: 64
            })
        );

        let mut info = sample();
        info.memory_map_entries = 1000;
        assert_eq!(
            info.validate(),
            Err(BootInfoError::TooManyEntries { count: 1000 })
        );
        assert_eq!(info.memory_map().len(), MAX_MEMORY_ENTRIES);
    }

    #[test]
    fn memory_map_fills_up() {
        let mut info = Box::new(BootInfo::empty());
        let entry = MemoryMapEntry::new(0x1000, 0x1000, MemoryType::Reserved);
        for _ in 0..MAX_MEMORY_ENTRIES {
            info.push_memory_entry(entry).unwrap();
        }
        assert_eq!(
            info.push_memory_entry(entry),
            Err(BootInfoError::MemoryMapFull)
        );
        assert_eq!(info.available_memory, 0);
    }

    #[test]
    fn cmdline_stops_at_nul() {
        let mut info = Box::new(BootInfo::empty());
        info.kernel.cmdline[..5].copy_from_slice(b"quiet");
        assert_eq!(info.kernel.cmdline_bytes(), b"quiet");
        info.kernel.kernel_physical_address = 0x10_0000;
        info.kernel.kernel_size = 0x4_2000;
        assert_eq!(info.kernel.physical_end().as_u64(), 0x14_2000);
    }
}
