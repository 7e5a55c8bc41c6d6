mod common;

use common::HostMemory;
use kernel_alloc::{PageAlloc, PageAllocator, WindowPhysMapper};
use kernel_info::{BootInfo, BootInfoError, MemoryMapEntry, MemoryType};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage};
use std::collections::HashSet;
use std::sync::{Barrier, Mutex};
use std::thread;

const BASE: u64 = 0x20_0000;
const LEN: u64 = 0x1E0_0000;

fn available(base: u64, len: u64) -> MemoryMapEntry {
    MemoryMapEntry::new(base, len, MemoryType::Available)
}

fn small_pool(host: &HostMemory, pages: u64) -> PageAllocator<WindowPhysMapper> {
    host.pool(&[available(BASE, pages * PAGE_SIZE)], 0x10_0000)
}

#[test]
fn freed_page_is_reused_first() {
    let host = HostMemory::new(BASE, 16 * PAGE_SIZE);
    let pool = small_pool(&host, 16);

    let a = pool.allocate_page().unwrap();
    let b = pool.allocate_page().unwrap();
    assert_ne!(a, b);

    unsafe { pool.free_page(a) };
    assert_eq!(pool.allocate_page(), Some(a));

    unsafe {
        pool.free_page(a);
        pool.free_page(b);
    }
    assert_eq!(pool.allocate_page(), Some(b));
    assert_eq!(pool.allocate_page(), Some(a));
}

#[test]
fn multiple_allocations_are_distinct() {
    let host = HostMemory::new(BASE, 16 * PAGE_SIZE);
    let pool = small_pool(&host, 16);
    assert_eq!(pool.total_pages(), 16);
    assert_eq!(pool.free_pages(), 16);

    let pages: Vec<PhysicalPage> = (0..10).map(|_| pool.allocate_page().unwrap()).collect();
    let unique: HashSet<_> = pages.iter().copied().collect();
    assert_eq!(unique.len(), 10);
    assert_eq!(pool.free_pages(), 6);

    for page in pages {
        assert!(page.base().is_page_aligned());
        unsafe { pool.free_page(page) };
    }
    assert_eq!(pool.free_pages(), 16);
}

#[test]
fn boot_scenario_serves_every_page_once() {
    let host = HostMemory::new(BASE, LEN);
    let pool = host.pool(&[available(BASE, LEN)], 0x15_0000);

    let expected = usize::try_from(LEN / PAGE_SIZE).unwrap();
    assert_eq!(pool.total_pages(), expected);

    let mut seen = HashSet::with_capacity(expected);
    while let Some(page) = pool.allocate_page() {
        let base = page.base().as_u64();
        assert_eq!(base % PAGE_SIZE, 0);
        assert!((BASE..BASE + LEN).contains(&base), "{page:?} out of range");
        assert!(seen.insert(page), "{page:?} handed out twice");
    }

    assert_eq!(seen.len(), expected);
    assert_eq!(pool.free_pages(), 0);
    assert_eq!(pool.allocate_page(), None);
}

#[test]
fn exhaustion_then_recovery() {
    let host = HostMemory::new(BASE, 2 * PAGE_SIZE);
    let pool = small_pool(&host, 2);

    let a = pool.allocate_page().unwrap();
    let _b = pool.allocate_page().unwrap();
    assert!(pool.allocate_page().is_none());
    assert!(pool.allocate_page().is_none());

    unsafe { pool.free_page(a) };
    assert_eq!(pool.allocate_page(), Some(a));
}

#[test]
fn empty_pool_has_nothing() {
    let host = HostMemory::new(BASE, PAGE_SIZE);
    let pool = PageAllocator::new(host.mapper());
    assert_eq!(pool.total_pages(), 0);
    assert!(pool.allocate_page().is_none());
}

#[test]
fn kernel_image_is_excluded() {
    let host = HostMemory::new(0x10_0000, 16 * PAGE_SIZE);

    // Kernel ends mid-page inside the region: pages from the next boundary on.
    let pool = host.pool(&[available(0x10_0000, 16 * PAGE_SIZE)], 0x10_8123);
    assert_eq!(pool.total_pages(), 7);
    while let Some(page) = pool.allocate_page() {
        assert!(page.base().as_u64() >= 0x10_9000);
    }

    // Region entirely below the kernel end.
    let pool = host.pool(&[available(0x10_0000, 16 * PAGE_SIZE)], 0x20_0000);
    assert_eq!(pool.total_pages(), 0);
}

#[test]
fn region_at_top_of_address_space() {
    let base = 0u64.wrapping_sub(16 * PAGE_SIZE);
    let host = HostMemory::new(base, 16 * PAGE_SIZE);

    // The entry's end saturates at u64::MAX, so the final page is not whole.
    let pool = host.pool(&[available(base, 16 * PAGE_SIZE)], 0);
    assert_eq!(pool.total_pages(), 15);

    let mut pages = Vec::new();
    while let Some(page) = pool.allocate_page() {
        let addr = page.base().as_u64();
        assert!(addr >= base, "{page:?} below the region");
        assert!(addr < u64::MAX & !(PAGE_SIZE - 1), "{page:?} not a whole page");
        assert!(!pages.contains(&page), "{page:?} handed out twice");
        pages.push(page);
    }
    assert_eq!(pages.len(), 15);

    for page in pages {
        assert!(pool.manages(page));
        unsafe { pool.free_page(page) };
    }
    assert_eq!(pool.free_pages(), 15);
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "outside the memory managed by this pool")]
fn foreign_page_is_rejected_on_free() {
    let host = HostMemory::new(BASE, 4 * PAGE_SIZE);
    let pool = host.pool(&[available(BASE, 2 * PAGE_SIZE)], 0);
    let outside = PhysicalAddress::new(BASE + 3 * PAGE_SIZE).page();
    assert!(!pool.manages(outside));
    unsafe { pool.free_page(outside) };
}

#[test]
fn partial_pages_are_dropped() {
    let host = HostMemory::new(0x10_0000, 4 * PAGE_SIZE);
    let pool = host.pool(&[available(0x10_0800, 0x3000)], 0);

    assert_eq!(pool.total_pages(), 2);
    let mut bases: Vec<u64> = std::iter::from_fn(|| pool.allocate_page())
        .map(|p| p.base().as_u64())
        .collect();
    bases.sort_unstable();
    assert_eq!(bases, [0x10_1000, 0x10_2000]);
}

#[test]
fn only_available_regions_are_used() {
    let host = HostMemory::new(BASE, 8 * PAGE_SIZE);
    let entries = [
        MemoryMapEntry::new(BASE, 2 * PAGE_SIZE, MemoryType::Reserved),
        available(BASE + 2 * PAGE_SIZE, 2 * PAGE_SIZE),
        MemoryMapEntry::new(BASE + 4 * PAGE_SIZE, 2 * PAGE_SIZE, MemoryType::AcpiNvs),
        MemoryMapEntry {
            kind: 42,
            ..available(BASE + 6 * PAGE_SIZE, 2 * PAGE_SIZE)
        },
    ];
    let pool = host.pool(&entries, 0);

    assert_eq!(pool.total_pages(), 2);
    let mut bases: Vec<u64> = std::iter::from_fn(|| pool.allocate_page())
        .map(|p| p.base().as_u64())
        .collect();
    bases.sort_unstable();
    assert_eq!(bases, [BASE + 2 * PAGE_SIZE, BASE + 3 * PAGE_SIZE]);
}

#[cfg(feature = "poison")]
#[test]
fn pages_carry_poison_patterns() {
    use kernel_alloc::{ALLOC_POISON, FREE_POISON};

    let host = HostMemory::new(BASE, 4 * PAGE_SIZE);
    let pool = small_pool(&host, 4);
    let len = usize::try_from(PAGE_SIZE).unwrap();

    let page = pool.allocate_page().unwrap();
    let bytes = unsafe { std::slice::from_raw_parts(pool.page_ptr(page), len) };
    assert!(bytes.iter().all(|&b| b == ALLOC_POISON));

    unsafe { pool.free_page(page) };
    // The first word holds the free-list link.
    let bytes = unsafe { std::slice::from_raw_parts(pool.page_ptr(page), len) };
    assert!(bytes[8..].iter().all(|&b| b == FREE_POISON));
}

#[test]
fn concurrent_callers_get_disjoint_pages() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 64;

    let host = HostMemory::new(BASE, (THREADS * PER_THREAD) as u64 * PAGE_SIZE);
    let pool = small_pool(&host, (THREADS * PER_THREAD) as u64);
    let barrier = Barrier::new(THREADS);
    let taken = Mutex::new(Vec::new());

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                barrier.wait();
                let mine: Vec<_> = (0..PER_THREAD)
                    .map(|_| pool.allocate_page().unwrap())
                    .collect();
                taken.lock().unwrap().extend(mine);
            });
        }
    });

    let taken = taken.into_inner().unwrap();
    let unique: HashSet<_> = taken.iter().copied().collect();
    assert_eq!(unique.len(), THREADS * PER_THREAD);
    assert!(pool.allocate_page().is_none());

    // Release from several threads while others allocate again.
    let chunks: Vec<Vec<PhysicalPage>> = taken.chunks(PER_THREAD).map(<[_]>::to_vec).collect();
    let barrier = Barrier::new(THREADS);
    thread::scope(|s| {
        for chunk in &chunks {
            let (pool, barrier) = (&pool, &barrier);
            s.spawn(move || {
                barrier.wait();
                for &page in chunk {
                    unsafe { pool.free_page(page) };
                    let again = pool.allocate_page().unwrap();
                    unsafe { pool.free_page(again) };
                }
            });
        }
    });

    assert_eq!(pool.free_pages(), THREADS * PER_THREAD);
}

#[test]
fn pool_from_boot_info() {
    let host = HostMemory::new(BASE, 8 * PAGE_SIZE);

    let mut info = Box::new(BootInfo::empty());
    info.push_memory_entry(MemoryMapEntry::new(0, 0x9_F000, MemoryType::Reserved))
        .unwrap();
    info.push_memory_entry(available(BASE, 8 * PAGE_SIZE))
        .unwrap();

    let pool = unsafe {
        PageAllocator::from_boot_info(&info, PhysicalAddress::new(0x18_0000), host.mapper())
    }
    .unwrap();
    assert_eq!(pool.total_pages(), 8);

    info.magic = 0;
    let err = unsafe {
        PageAllocator::from_boot_info(&info, PhysicalAddress::new(0x18_0000), host.mapper())
    }
    .unwrap_err();
    assert_eq!(err, BootInfoError::BadMagic { found: 0 });
}

fn churn<A: PageAlloc>(alloc: &A, rounds: usize) -> usize {
    let mut held = Vec::new();
    for _ in 0..rounds {
        match alloc.allocate_page() {
            Some(page) => {
                unsafe { alloc.page_ptr(page).write(0xEE) };
                held.push(page);
            }
            None => break,
        }
    }
    let n = held.len();
    for page in held {
        unsafe { alloc.free_page(page) };
    }
    n
}

#[test]
fn usable_through_the_trait() {
    let host = HostMemory::new(BASE, 4 * PAGE_SIZE);
    let pool = small_pool(&host, 4);

    assert_eq!(churn(&pool, 3), 3);
    assert_eq!(churn(&pool, 10), 4);
    assert_eq!(pool.free_pages(), 4);
}
