//! # Physical Memory Access
//!
//! Code can only dereference virtual addresses. A [`PhysMapper`] turns a
//! physical address into a pointer in the current address space, which is how
//! the page allocator reaches the free-list links and poison bytes stored in
//! the pages themselves.
//!
//! - [`HhdmPhysMapper`]: every physical address is mapped at `HHDM_BASE + pa`.
//! - [`WindowPhysMapper`]: a physical range backed by an arbitrary writable
//!   buffer, for hosted builds and tests.

use kernel_info::memory::HHDM_BASE;
use kernel_memory_addresses::PhysicalAddress;

/// Translate physical addresses into usable pointers.
pub trait PhysMapper {
    /// Pointer through which the byte at `pa` can be accessed.
    ///
    /// Computing the pointer is safe; dereferencing it is only sound while
    /// the mapping covers `pa`.
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8;
}

/// [`PhysMapper`] for kernels with a higher-half direct map.
///
/// The HHDM must be installed and cover every address passed in.
#[derive(Debug, Copy, Clone, Default)]
pub struct HhdmPhysMapper;

impl PhysMapper for HhdmPhysMapper {
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        HHDM_BASE.wrapping_add(pa.as_u64()) as *mut u8
    }
}

/// [`PhysMapper`] for a window of physical memory backed by a caller buffer.
///
/// Physical address `phys_base + n` maps to `base + n`.
///
/// ```rust
/// use kernel_alloc::{PhysMapper, WindowPhysMapper};
/// use kernel_memory_addresses::PhysicalAddress;
///
/// let mut backing = vec![0u8; 0x2000];
/// let window = unsafe {
///     WindowPhysMapper::new(backing.as_mut_ptr(), PhysicalAddress::new(0x20_0000), 0x2000)
/// };
/// let p = window.phys_to_ptr(PhysicalAddress::new(0x20_1000));
/// assert_eq!(p, backing.as_mut_ptr().wrapping_add(0x1000));
/// ```
#[derive(Debug)]
pub struct WindowPhysMapper {
    base: *mut u8,
    phys_base: PhysicalAddress,
    len: u64,
}

// SAFETY: the window is plain memory; synchronisation of accesses through it
// is the caller's concern, exactly as for the HHDM.
unsafe impl Send for WindowPhysMapper {}
// SAFETY: see above.
unsafe impl Sync for WindowPhysMapper {}

impl WindowPhysMapper {
    /// # Safety
    /// `base` must be valid for reads and writes of `len` bytes for as long
    /// as the mapper, or anything holding pointers obtained from it, is used.
    #[must_use]
    pub const unsafe fn new(base: *mut u8, phys_base: PhysicalAddress, len: u64) -> Self {
        Self {
            base,
            phys_base,
            len,
        }
    }

    #[must_use]
    pub const fn phys_base(&self) -> PhysicalAddress {
        self.phys_base
    }

    /// One past the last physical address covered by the window, saturating
    /// for a window that reaches the top of the address range.
    #[must_use]
    pub const fn phys_end(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.phys_base.as_u64().saturating_add(self.len))
    }

    #[must_use]
    pub const fn contains(&self, pa: PhysicalAddress) -> bool {
        pa.as_u64() >= self.phys_base.as_u64() && pa.as_u64() - self.phys_base.as_u64() < self.len
    }
}

impl PhysMapper for WindowPhysMapper {
    #[allow(clippy::cast_possible_truncation)]
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        debug_assert!(self.contains(pa), "{pa:?} outside of the mapped window");
        let offset = pa.as_u64().wrapping_sub(self.phys_base.as_u64());
        self.base.wrapping_add(offset as usize)
    }
}
