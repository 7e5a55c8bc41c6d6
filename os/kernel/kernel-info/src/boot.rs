//! # Kernel Boot Information
//!
//! The fixed-layout record the boot stage leaves for the kernel. Only the
//! memory map is consumed by the memory core; the remaining sub-records are
//! carried for drivers.

use crate::memory_map::{MemoryMapEntry, MemoryType};
use kernel_memory_addresses::PhysicalAddress;

/// Identifies the record format (`"XOBOOT"` in ASCII).
pub const BOOT_INFO_MAGIC: u64 = 0x584F_424F_4F54;

/// The record layout this crate describes.
pub const BOOT_INFO_VERSION: u32 = 1;

/// Capacity of [`BootInfo::memory_map`].
pub const MAX_MEMORY_ENTRIES: usize = 256;

/// Capacity of [`KernelImageInfo::cmdline`] in bytes.
pub const MAX_CMDLINE_LENGTH: usize = 1024;

/// Expected value of [`BootInfo::size`].
#[allow(clippy::cast_possible_truncation)]
pub const BOOT_INFO_SIZE: u32 = size_of::<BootInfo>() as u32;

const _: () = {
    assert!(size_of::<BootInfo>() <= u32::MAX as usize);
    assert!(size_of::<MemoryMapEntry>() == 24);
};

/// Information the kernel receives at the boot-stage → kernel transfer.
/// Keep this `#[repr(C)]` and prefer fixed-size integers at the ABI boundary.
#[repr(C)]
#[derive(Clone)]
pub struct BootInfo {
    /// Must equal [`BOOT_INFO_MAGIC`].
    pub magic: u64,
    /// Must equal [`BOOT_INFO_VERSION`].
    pub version: u32,
    /// Size of the whole record in bytes; must equal [`BOOT_INFO_SIZE`].
    pub size: u32,

    /// Firmware memory map; only the first [`memory_map_entries`](Self::memory_map_entries) are valid.
    pub memory_map: [MemoryMapEntry; MAX_MEMORY_ENTRIES],
    /// Number of valid entries in [`memory_map`](Self::memory_map).
    pub memory_map_entries: u32,
    /// Sum of all entry lengths in bytes.
    pub total_memory: u64,
    /// Sum of all [`MemoryType::Available`] entry lengths in bytes.
    pub available_memory: u64,

    /// Framebuffer located by the boot stage.
    pub graphics: GraphicsInfo,
    /// Firmware table pointers and CPU summary.
    pub hardware: HardwareInfo,
    /// Where and how the kernel image was loaded.
    pub kernel: KernelImageInfo,
    /// Firmware interface details.
    pub uefi: FirmwareInfo,

    pub bootloader_timestamp: u64,
    pub checksum: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Default, Debug)]
pub struct GraphicsInfo {
    /// Linear framebuffer base address (CPU physical address).
    pub framebuffer_address: u64,
    /// Visible width in **pixels**.
    pub framebuffer_width: u32,
    /// Visible height in **pixels**.
    pub framebuffer_height: u32,
    /// Bytes per scanline. May be larger than `width * bpp / 8` due to padding.
    pub framebuffer_pitch: u32,
    /// Bits per pixel.
    pub framebuffer_bpp: u32,
    pub red_mask_size: u32,
    pub red_field_position: u32,
    pub green_mask_size: u32,
    pub green_field_position: u32,
    pub blue_mask_size: u32,
    pub blue_field_position: u32,
    pub reserved_mask_size: u32,
    pub reserved_field_position: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Default, Debug)]
pub struct HardwareInfo {
    /// RSDP (ACPI 2.0+) physical address, or 0 if not provided.
    pub acpi_rsdp_address: u64,
    pub smbios_address: u64,
    pub device_tree_address: u64,
    pub device_tree_size: u32,
    pub cpu_count: u32,
    pub cpu_features: u64,
}

#[repr(C)]
#[derive(Clone)]
pub struct KernelImageInfo {
    pub kernel_physical_address: u64,
    pub kernel_virtual_address: u64,
    pub kernel_size: u64,
    pub kernel_entry_point: u64,
    pub initrd_address: u64,
    pub initrd_size: u64,
    /// NUL-terminated command line.
    pub cmdline: [u8; MAX_CMDLINE_LENGTH],
}

#[repr(C)]
#[derive(Copy, Clone, Default, Debug)]
pub struct FirmwareInfo {
    pub efi_system_table: u64,
    pub efi_runtime_services: u64,
    pub runtime_services_supported: u8,
    pub efi_version: u32,
    pub loader_signature: u64,
}

/// Reasons a [`BootInfo`] is rejected before the kernel trusts it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BootInfoError {
    #[error("bad boot info magic {found:#x}")]
    BadMagic { found: u64 },
    #[error("unsupported boot info version {found}")]
    UnsupportedVersion { found: u32 },
    #[error("boot info size mismatch: expected {expected} bytes, found {found}")]
    SizeMismatch { expected: u32, found: u32 },
    #[error("memory map claims {count} entries, more than the record holds")]
    TooManyEntries { count: u32 },
    #[error("memory map is full")]
    MemoryMapFull,
}

impl KernelImageInfo {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            kernel_physical_address: 0,
            kernel_virtual_address: 0,
            kernel_size: 0,
            kernel_entry_point: 0,
            initrd_address: 0,
            initrd_size: 0,
            cmdline: [0; MAX_CMDLINE_LENGTH],
        }
    }

    /// Physical address one past the loaded kernel image.
    #[must_use]
    pub const fn physical_end(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.kernel_physical_address.saturating_add(self.kernel_size))
    }

    /// The command line up to (excluding) the first NUL byte.
    #[must_use]
    pub fn cmdline_bytes(&self) -> &[u8] {
        let len = self
            .cmdline
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_CMDLINE_LENGTH);
        &self.cmdline[..len]
    }
}

impl BootInfo {
    /// A valid header with an empty memory map and zeroed sub-records.
    ///
    /// Boot stages fill this in with [`push_memory_entry`](Self::push_memory_entry).
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            magic: BOOT_INFO_MAGIC,
            version: BOOT_INFO_VERSION,
            size: BOOT_INFO_SIZE,
            memory_map: [MemoryMapEntry::EMPTY; MAX_MEMORY_ENTRIES],
            memory_map_entries: 0,
            total_memory: 0,
            available_memory: 0,
            graphics: GraphicsInfo {
                framebuffer_address: 0,
                framebuffer_width: 0,
                framebuffer_height: 0,
                framebuffer_pitch: 0,
                framebuffer_bpp: 0,
                red_mask_size: 0,
                red_field_position: 0,
                green_mask_size: 0,
                green_field_position: 0,
                blue_mask_size: 0,
                blue_field_position: 0,
                reserved_mask_size: 0,
                reserved_field_position: 0,
            },
            hardware: HardwareInfo {
                acpi_rsdp_address: 0,
                smbios_address: 0,
                device_tree_address: 0,
                device_tree_size: 0,
                cpu_count: 0,
                cpu_features: 0,
            },
            kernel: KernelImageInfo::empty(),
            uefi: FirmwareInfo {
                efi_system_table: 0,
                efi_runtime_services: 0,
                runtime_services_supported: 0,
                efi_version: 0,
                loader_signature: 0,
            },
            bootloader_timestamp: 0,
            checksum: 0,
        }
    }

    /// Check the header fields before anything else in the record is used.
    ///
    /// # Errors
    /// Returns the first mismatch among magic, version, size and entry count.
    pub const fn validate(&self) -> Result<(), BootInfoError> {
        if self.magic != BOOT_INFO_MAGIC {
            return Err(BootInfoError::BadMagic { found: self.magic });
        }
        if self.version != BOOT_INFO_VERSION {
            return Err(BootInfoError::UnsupportedVersion {
                found: self.version,
            });
        }
        if self.size != BOOT_INFO_SIZE {
            return Err(BootInfoError::SizeMismatch {
                expected: BOOT_INFO_SIZE,
                found: self.size,
            });
        }
        if self.memory_map_entries as usize > MAX_MEMORY_ENTRIES {
            return Err(BootInfoError::TooManyEntries {
                count: self.memory_map_entries,
            });
        }
        Ok(())
    }

    /// The valid prefix of the memory map.
    ///
    /// An out-of-range entry count is clamped; call [`validate`](Self::validate)
    /// first to reject such records instead.
    #[must_use]
    pub fn memory_map(&self) -> &[MemoryMapEntry] {
        let count = (self.memory_map_entries as usize).min(MAX_MEMORY_ENTRIES);
        &self.memory_map[..count]
    }

    /// Append an entry and keep the aggregate byte counts in step.
    ///
    /// # Errors
    /// [`BootInfoError::MemoryMapFull`] once [`MAX_MEMORY_ENTRIES`] entries are present.
    pub fn push_memory_entry(&mut self, entry: MemoryMapEntry) -> Result<(), BootInfoError> {
        let index = self.memory_map_entries as usize;
        if index >= MAX_MEMORY_ENTRIES {
            return Err(BootInfoError::MemoryMapFull);
        }
        self.memory_map[index] = entry;
        self.memory_map_entries += 1;
        self.total_memory = self.total_memory.saturating_add(entry.length);
        if entry.memory_type() == Some(MemoryType::Available) {
            self.available_memory = self.available_memory.saturating_add(entry.length);
        }
        Ok(())
    }
}
