//! # Virtual Memory Areas
//!
//! Bookkeeping for the virtual ranges of an address space: which intervals
//! are mapped, with which rights, and from which backing object.
//!
//! ```text
//!  AddressSpace
//!    ├─ list:  head ─► [0x1000,0x2000) ⇄ [0x4000,0x6000) ⇄ [0x9000,0xA000)
//!    └─ tree:            [0x4000,0x6000)
//!                        /              \
//!              [0x1000,0x2000)    [0x9000,0xA000)
//! ```
//!
//! Each [`Vma`] is one record in one page taken from a
//! [`PageAlloc`](kernel_alloc::PageAlloc) pool. The list and the tree thread
//! through the same records; nothing is copied between them.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_alloc::{PageAllocator, WindowPhysMapper};
//! use kernel_info::{MemoryMapEntry, MemoryType};
//! use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
//! use kernel_vmem::{AddressSpace, MapFlags, Protection};
//! use std::alloc::{Layout, alloc_zeroed, dealloc};
//!
//! let layout = Layout::from_size_align(8 * 4096, 4096).unwrap();
//! let backing = unsafe { alloc_zeroed(layout) };
//! let mapper = unsafe { WindowPhysMapper::new(backing, PhysicalAddress::new(0x40_0000), 8 * 4096) };
//! let mut pool = PageAllocator::new(mapper);
//! let map = [MemoryMapEntry::new(0x40_0000, 8 * 4096, MemoryType::Available)];
//! unsafe { pool.init(&map, PhysicalAddress::zero()) };
//!
//! let mut mm = AddressSpace::new(&pool);
//! let mut vma = mm.allocate_vma().unwrap();
//! vma.set_range(VirtualAddress::new(0x1000), VirtualAddress::new(0x4000));
//! vma.set_protection(Protection::READ_WRITE);
//! vma.set_flags(MapFlags::PRIVATE_ANONYMOUS);
//! mm.insert(vma).unwrap();
//!
//! mm.split(VirtualAddress::new(0x1000), VirtualAddress::new(0x2000)).unwrap();
//! let upper = mm.find(VirtualAddress::new(0x3000)).unwrap();
//! assert_eq!(upper.start(), VirtualAddress::new(0x2000));
//! assert_eq!(upper.offset(), 0x1000);
//! assert_eq!(mm.len(), 2);
//!
//! drop(mm);
//! assert_eq!(pool.free_pages(), 8);
//! drop(pool);
//! unsafe { dealloc(backing, layout) };
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod address_space;
pub mod flags;
pub mod vma;

pub use address_space::{AddressSpace, VmaError, VmaIter};
pub use flags::{MapFlags, Protection};
pub use vma::{BackingObject, OwnedVma, Vma, allocate_vma, free_vma};
