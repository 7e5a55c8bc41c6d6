//! # Physical Page Allocator
//!
//! A pool of 4 KiB physical pages built from the firmware memory map.
//!
//! Free pages form a singly linked LIFO list threaded through the pages
//! themselves: the first machine word of every free page holds the physical
//! address of the next free page. The allocator therefore needs no memory of
//! its own beyond the list head.
//!
//! ```text
//!  head ──► ┌────────────┐     ┌────────────┐     ┌────────────┐
//!           │ next: PA ──┼───► │ next: PA ──┼───► │ next: END  │
//!           │ 0x01 0x01… │     │ 0x01 0x01… │     │ 0x01 0x01… │
//!           └────────────┘     └────────────┘     └────────────┘
//! ```
//!
//! Only the push and pop of the list head happen under the lock. Filling a
//! page with a poison pattern (feature `poison`) happens outside of it.

use crate::phys_mapper::PhysMapper;
use kernel_info::{BootInfo, BootInfoError, MemoryMapEntry};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage};
use kernel_sync::SpinMutex;
use log::{debug, info};

/// Byte pattern written over every page handed out by [`PageAllocator::allocate_page`].
pub const ALLOC_POISON: u8 = 0x05;

/// Byte pattern written over every page returned via [`PageAllocator::free_page`].
pub const FREE_POISON: u8 = 0x01;

/// Link value terminating the free list. Not a valid page base.
const END_OF_LIST: u64 = u64::MAX;

/// Source of single physical pages.
///
/// Consumers such as the VMA manager allocate through this seam, so they can
/// be driven by any pool, not just [`PageAllocator`].
pub trait PageAlloc {
    /// Take one page out of the pool. `None` when the pool is exhausted.
    fn allocate_page(&self) -> Option<PhysicalPage>;

    /// Return a page to the pool.
    ///
    /// # Safety
    /// `page` must have come from [`allocate_page`](Self::allocate_page) of this
    /// pool and must not be used by the caller afterwards.
    unsafe fn free_page(&self, page: PhysicalPage);

    /// Writable pointer to the first byte of `page`.
    fn page_ptr(&self, page: PhysicalPage) -> *mut u8;
}

struct FreeList {
    head: Option<PhysicalPage>,
    len: usize,
}

/// The physical page pool.
///
/// Constructed once and then shared by reference; allocation and release only
/// need `&self`.
pub struct PageAllocator<M: PhysMapper> {
    mapper: M,
    free: SpinMutex<FreeList>,
    total: usize,
    lowest: PhysicalAddress,
    highest: PhysicalAddress,
}

impl<M: PhysMapper> PageAllocator<M> {
    /// An empty pool. Every allocation fails until [`init`](Self::init) is called.
    pub const fn new(mapper: M) -> Self {
        Self {
            mapper,
            free: SpinMutex::new(FreeList { head: None, len: 0 }),
            total: 0,
            lowest: PhysicalAddress::new(u64::MAX),
            highest: PhysicalAddress::zero(),
        }
    }

    /// Validate the boot handoff record and build a pool from its memory map.
    ///
    /// # Errors
    /// Any [`BootInfoError`] from [`BootInfo::validate`].
    ///
    /// # Safety
    /// See [`init`](Self::init).
    pub unsafe fn from_boot_info(
        boot_info: &BootInfo,
        kernel_end: PhysicalAddress,
        mapper: M,
    ) -> Result<Self, BootInfoError> {
        boot_info.validate()?;
        info!(
            "boot info: {} memory map entries, {} KiB total, {} KiB available",
            boot_info.memory_map_entries,
            boot_info.total_memory / 1024,
            boot_info.available_memory / 1024
        );

        let mut allocator = Self::new(mapper);
        // SAFETY: forwarded to the caller.
        unsafe { allocator.init(boot_info.memory_map(), kernel_end) };
        Ok(allocator)
    }

    /// Add every whole page of the available regions in `entries` that lies at
    /// or above `kernel_end` (rounded up) to the pool. Pages are pushed lowest
    /// first. Returns the number of pages added.
    ///
    /// # Safety
    /// - Every available region must be real RAM, reachable through the mapper
    ///   and not used by anything else.
    /// - The same region must not be added twice.
    pub unsafe fn init(&mut self, entries: &[MemoryMapEntry], kernel_end: PhysicalAddress) -> usize {
        let kernel_end = kernel_end.align_up();
        let mut added = 0;

        for entry in entries {
            if !entry.is_available() {
                debug!(
                    "skipping {:?} region {}..{}",
                    entry.memory_type(),
                    entry.base(),
                    entry.end_address()
                );
                continue;
            }

            let limit = entry.end_address().align_down();
            if limit <= kernel_end {
                debug!(
                    "skipping region {}..{} below kernel end {kernel_end}",
                    entry.base(),
                    entry.end_address()
                );
                continue;
            }

            let start = entry.base().align_up().max(kernel_end);
            let count = start.pages_until(limit);
            let mut page = start.page();
            let mut pages = 0;
            for _ in 0..count {
                // SAFETY: the page is unused RAM per the caller's contract.
                unsafe { self.push(page) };
                pages += 1;
                self.lowest = self.lowest.min(page.base());
                self.highest = self.highest.max(page.base());
                // Only the last page of the address space has no successor.
                let Some(next) = page.next() else { break };
                page = next;
            }

            debug!("added {pages} pages from {start}..{limit}");
            added += pages;
        }

        self.total += added;
        info!(
            "page pool: {added} pages ({} KiB) added, {} total",
            added as u64 * PAGE_SIZE / 1024,
            self.total
        );
        added
    }

    /// Take the most recently freed page. `None` when the pool is exhausted.
    pub fn allocate_page(&self) -> Option<PhysicalPage> {
        let page = self.free.with_lock(|list| {
            let page = list.head?;
            // SAFETY: pages on the list are owned by the pool and hold a link word.
            let next = unsafe { self.read_link(page) };
            list.head = PhysicalPage::from_base(PhysicalAddress::new(next));
            list.len -= 1;
            Some(page)
        });

        match page {
            Some(page) => {
                #[cfg(feature = "poison")]
                // SAFETY: the page was just taken off the list and is ours.
                unsafe {
                    self.fill(page, ALLOC_POISON);
                }
                Some(page)
            }
            None => {
                debug!("page pool exhausted");
                None
            }
        }
    }

    /// Return `page` to the pool. The next [`allocate_page`](Self::allocate_page)
    /// hands it out again.
    ///
    /// # Safety
    /// `page` must have been allocated from this pool and must not be used
    /// afterwards. Debug builds reject pages outside the regions given to
    /// [`init`](Self::init).
    pub unsafe fn free_page(&self, page: PhysicalPage) {
        debug_assert!(
            self.manages(page),
            "{page:?} is outside the memory managed by this pool"
        );
        // SAFETY: forwarded to the caller.
        unsafe { self.push(page) };
    }

    /// Number of pages currently in the pool.
    pub fn free_pages(&self) -> usize {
        self.free.with_lock(|list| list.len)
    }

    /// Number of pages ever added by [`init`](Self::init).
    pub const fn total_pages(&self) -> usize {
        self.total
    }

    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Writable pointer to the first byte of `page`.
    pub fn page_ptr(&self, page: PhysicalPage) -> *mut u8 {
        self.mapper.phys_to_ptr(page.base())
    }

    /// `true` if `page` lies between the lowest and highest page added by
    /// [`init`](Self::init).
    pub fn manages(&self, page: PhysicalPage) -> bool {
        self.lowest <= page.base() && page.base() <= self.highest
    }

    /// # Safety
    /// The caller hands over ownership of `page`.
    unsafe fn push(&self, page: PhysicalPage) {
        #[cfg(feature = "poison")]
        // SAFETY: the page is owned by the caller until it is linked below.
        unsafe {
            self.fill(page, FREE_POISON);
        }

        self.free.with_lock(|list| {
            let next = list.head.map_or(END_OF_LIST, |p| p.base().as_u64());
            // SAFETY: the page is owned by the pool from here on.
            unsafe { self.write_link(page, next) };
            list.head = Some(page);
            list.len += 1;
        });
    }

    unsafe fn read_link(&self, page: PhysicalPage) -> u64 {
        // SAFETY: pages are 4096-aligned, so the link word is aligned too.
        unsafe { self.page_ptr(page).cast::<u64>().read() }
    }

    unsafe fn write_link(&self, page: PhysicalPage, next: u64) {
        // SAFETY: see `read_link`.
        unsafe { self.page_ptr(page).cast::<u64>().write(next) }
    }

    #[cfg(feature = "poison")]
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn fill(&self, page: PhysicalPage, pattern: u8) {
        // SAFETY: the caller owns the whole page.
        unsafe { self.page_ptr(page).write_bytes(pattern, PAGE_SIZE as usize) }
    }
}

impl<M: PhysMapper> PageAlloc for PageAllocator<M> {
    fn allocate_page(&self) -> Option<PhysicalPage> {
        Self::allocate_page(self)
    }

    unsafe fn free_page(&self, page: PhysicalPage) {
        // SAFETY: same contract.
        unsafe { Self::free_page(self, page) }
    }

    fn page_ptr(&self, page: PhysicalPage) -> *mut u8 {
        Self::page_ptr(self, page)
    }
}

impl<M: PhysMapper> core::fmt::Debug for PageAllocator<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PageAllocator")
            .field("free", &self.free_pages())
            .field("total", &self.total)
            .field("lowest", &self.lowest)
            .field("highest", &self.highest)
            .finish_non_exhaustive()
    }
}
