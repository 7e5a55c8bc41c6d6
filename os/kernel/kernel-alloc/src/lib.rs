//! # Kernel Physical Page Allocation
//!
//! Turns the firmware memory map into a pool of 4 KiB physical pages and hands
//! them out one at a time.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  BootInfo memory map (kernel-info)                  │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ available regions above kernel end
//! ┌─────────────────▼───────────────────────────────────┐
//! │  PageAllocator                                      │
//! │    • LIFO free list threaded through the pages      │
//! │    • one SpinMutex around push/pop                  │
//! │    • poison fills outside the lock                  │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ PhysMapper
//! ┌─────────────────▼───────────────────────────────────┐
//! │  HHDM (kernel) or host buffer window (tests)        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Components
//!
//! - [`PageAllocator`]: the pool. Allocation and release take `&self` and are
//!   safe to call from several CPUs at once.
//! - [`PageAlloc`]: the trait other subsystems allocate through.
//! - [`PhysMapper`]: how the pool touches page contents; see
//!   [`HhdmPhysMapper`] and [`WindowPhysMapper`].
//!
//! ## Usage
//!
//! ```rust
//! use kernel_alloc::{PageAllocator, WindowPhysMapper};
//! use kernel_info::{MemoryMapEntry, MemoryType};
//! use kernel_memory_addresses::PhysicalAddress;
//! use std::alloc::{Layout, alloc_zeroed, dealloc};
//!
//! let layout = Layout::from_size_align(16 * 4096, 4096).unwrap();
//! let backing = unsafe { alloc_zeroed(layout) };
//! let mapper = unsafe { WindowPhysMapper::new(backing, PhysicalAddress::new(0x40_0000), 16 * 4096) };
//!
//! let mut pool = PageAllocator::new(mapper);
//! let map = [MemoryMapEntry::new(0x40_0000, 16 * 4096, MemoryType::Available)];
//! let added = unsafe { pool.init(&map, PhysicalAddress::new(0x10_0000)) };
//! assert_eq!(added, 16);
//!
//! let page = pool.allocate_page().unwrap();
//! assert!(page.base().is_page_aligned());
//! unsafe { pool.free_page(page) };
//! assert_eq!(pool.allocate_page(), Some(page));
//!
//! drop(pool);
//! unsafe { dealloc(backing, layout) };
//! ```
//!
//! ## Features
//!
//! - `poison` (default): fill allocated pages with [`ALLOC_POISON`] and freed
//!   pages with [`FREE_POISON`] so that use of uninitialised or stale memory
//!   shows up as a recognisable pattern.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod page_alloc;
pub mod phys_mapper;

pub use page_alloc::{ALLOC_POISON, FREE_POISON, PageAlloc, PageAllocator};
pub use phys_mapper::{HhdmPhysMapper, PhysMapper, WindowPhysMapper};
