use kernel_alloc::{PageAllocator, WindowPhysMapper};
use kernel_info::{MemoryMapEntry, MemoryType};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};
use std::alloc::{Layout, alloc_zeroed, dealloc};

const PHYS_BASE: u64 = 0x80_0000;

/// A page pool over a host buffer of `pages` pages.
pub struct Pool {
    pub alloc: PageAllocator<WindowPhysMapper>,
    ptr: *mut u8,
    layout: Layout,
}

impl Pool {
    pub fn new(pages: u64) -> Self {
        let len = pages * PAGE_SIZE;
        let layout = Layout::from_size_align(usize::try_from(len).unwrap(), 4096).unwrap();
        let ptr = unsafe { alloc_zeroed(layout) };
        assert!(!ptr.is_null(), "host allocation failed");

        let mapper = unsafe { WindowPhysMapper::new(ptr, PhysicalAddress::new(PHYS_BASE), len) };
        let mut alloc = PageAllocator::new(mapper);
        let map = [MemoryMapEntry::new(PHYS_BASE, len, MemoryType::Available)];
        let added = unsafe { alloc.init(&map, PhysicalAddress::zero()) };
        assert_eq!(added as u64, pages);

        Self { alloc, ptr, layout }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr, self.layout) };
    }
}
