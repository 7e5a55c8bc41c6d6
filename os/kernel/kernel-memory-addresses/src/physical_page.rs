use crate::{MemoryAddress, PAGE_SIZE, PhysicalAddress};
use core::fmt;

/// Base of one 4 KiB physical page.
///
/// This is the opaque handle the page allocator hands out and takes back.
///
/// ### Invariants
/// - The low 12 bits of the base are always zero.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let page = PhysicalPage::from_base(PhysicalAddress::new(0x20_3000)).unwrap();
/// assert_eq!(page.end(), Some(PhysicalAddress::new(0x20_4000)));
/// assert!(PhysicalAddress::new(u64::MAX).page().next().is_none());
/// assert!(PhysicalPage::from_base(PhysicalAddress::new(0x20_3008)).is_none());
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage(MemoryAddress);

impl PhysicalPage {
    /// The page that contains `pa`.
    #[inline]
    #[must_use]
    pub const fn containing(pa: PhysicalAddress) -> Self {
        Self(pa.0.align_down())
    }

    /// The page starting exactly at `pa`, or `None` if `pa` is not page aligned.
    #[inline]
    #[must_use]
    pub const fn from_base(pa: PhysicalAddress) -> Option<Self> {
        if pa.is_page_aligned() {
            Some(Self(pa.0))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress(self.0)
    }

    /// First address past this page; `None` for the last page of the 64-bit range.
    #[inline]
    #[must_use]
    pub const fn end(self) -> Option<PhysicalAddress> {
        match self.0.checked_add(PAGE_SIZE) {
            Some(end) => Some(PhysicalAddress(end)),
            None => None,
        }
    }

    /// The page directly after this one, if there is one.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(PAGE_SIZE) {
            Some(next) => Some(Self(next)),
            None => None,
        }
    }
}

impl fmt::Display for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage({:#018X})", self.0.as_u64())
    }
}
