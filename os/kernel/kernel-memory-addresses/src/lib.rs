//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw memory addresses and page handles used by
//! the page allocator and the VMA manager.
//!
//! ## Overview
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`MemoryAddress`] | A raw 64-bit address, either physical or virtual. Holds the page arithmetic. |
//! | [`PhysicalAddress`] | Refers to physical memory as described by the firmware memory map. |
//! | [`PhysicalPage`] | The page-aligned base of one 4 KiB physical page; the allocator's handle type. |
//! | [`VirtualAddress`] | Refers to a location in some address space; VMA bounds and fault addresses. |
//!
//! The memory core only deals in 4 KiB pages, so the page size is a constant
//! ([`PAGE_SIZE`]) rather than a type parameter.
//!
//! ## Design Notes
//!
//! - The types are `#[repr(transparent)]` and implement `Copy`, `Eq`, `Ord`, and
//!   `Hash`, making them suitable as map keys or for FFI use.
//! - Rounding helpers are `const fn` so they can be used in layout constants.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod memory_address;
mod physical_address;
mod physical_page;
mod virtual_address;

pub use memory_address::MemoryAddress;
pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;
pub use virtual_address::VirtualAddress;

/// Size of one page in bytes.
pub const PAGE_SIZE: u64 = 4096;

/// log2([`PAGE_SIZE`]).
pub const PAGE_SHIFT: u32 = 12;

/// Mask selecting the in-page offset bits.
pub const PAGE_MASK: u64 = PAGE_SIZE - 1;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(1 << PAGE_SHIFT == PAGE_SIZE);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_helpers() {
        let a = MemoryAddress::new(0x12345);
        assert_eq!(a.align_down().as_u64(), 0x12000);
        assert_eq!(a.align_up().as_u64(), 0x13000);
        assert_eq!(a.page_offset(), 0x345);
        assert!(!a.is_page_aligned());

        let b = MemoryAddress::new(0x13000);
        assert_eq!(b.align_up(), b);
        assert_eq!(b.align_down(), b);
    }

    #[test]
    fn align_up_near_the_top() {
        let top = MemoryAddress::new(u64::MAX - 10);
        assert_eq!(top.checked_align_up(), None);
        assert_eq!(top.align_up().as_u64(), u64::MAX & !PAGE_MASK);
    }

    #[test]
    fn pages_until_counts_whole_pages() {
        let start = MemoryAddress::new(0x20_0000);
        assert_eq!(start.pages_until(MemoryAddress::new(0x20_3000)), 3);
        assert_eq!(start.pages_until(MemoryAddress::new(0x20_2FFF)), 2);
        assert_eq!(start.pages_until(MemoryAddress::new(0x10_0000)), 0);

        let top = PhysicalAddress::new(0u64.wrapping_sub(0x1_0000));
        assert_eq!(top.pages_until(PhysicalAddress::new(u64::MAX).align_down()), 15);
    }

    #[test]
    fn physical_page_handles() {
        let pa = PhysicalAddress::new(0x0000_0010_2000_0042);
        let page = pa.page();
        assert_eq!(page.base().as_u64(), 0x0000_0010_2000_0000);
        assert_eq!(page.end().unwrap().as_u64() - page.base().as_u64(), PAGE_SIZE);
        assert_eq!(page.next().map(PhysicalPage::base), page.end());
        assert_eq!(PhysicalAddress::new(u64::MAX).page().end(), None);
        assert_eq!(PhysicalPage::from_base(page.base()), Some(page));
        assert_eq!(PhysicalPage::from_base(pa), None);
    }

    #[test]
    fn virtual_distance_and_offsets() {
        let va = VirtualAddress::new(0xFFFF_FFFF_8000_1234);
        assert_eq!(va.page_offset(), 0x234);
        assert_eq!(va.align_down().as_u64(), 0xFFFF_FFFF_8000_1000);
        assert_eq!(va - VirtualAddress::new(0xFFFF_FFFF_8000_0000), 0x1234);
        assert_eq!(VirtualAddress::new(u64::MAX).checked_add(1), None);
    }
}
