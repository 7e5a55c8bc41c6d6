use kernel_alloc::{PageAllocator, WindowPhysMapper};
use kernel_info::MemoryMapEntry;
use kernel_memory_addresses::PhysicalAddress;
use std::alloc::{Layout, alloc_zeroed, dealloc};

/// Page-aligned host buffer standing in for a range of physical memory.
pub struct HostMemory {
    ptr: *mut u8,
    layout: Layout,
    phys_base: PhysicalAddress,
}

impl HostMemory {
    pub fn new(phys_base: u64, len: u64) -> Self {
        let layout = Layout::from_size_align(usize::try_from(len).unwrap(), 4096).unwrap();
        let ptr = unsafe { alloc_zeroed(layout) };
        assert!(!ptr.is_null(), "host allocation failed");
        Self {
            ptr,
            layout,
            phys_base: PhysicalAddress::new(phys_base),
        }
    }

    pub fn mapper(&self) -> WindowPhysMapper {
        unsafe { WindowPhysMapper::new(self.ptr, self.phys_base, self.layout.size() as u64) }
    }

    /// Pool over this buffer, initialised from `entries`.
    pub fn pool(&self, entries: &[MemoryMapEntry], kernel_end: u64) -> PageAllocator<WindowPhysMapper> {
        let mut pool = PageAllocator::new(self.mapper());
        unsafe { pool.init(entries, PhysicalAddress::new(kernel_end)) };
        pool
    }
}

impl Drop for HostMemory {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr, self.layout) };
    }
}
