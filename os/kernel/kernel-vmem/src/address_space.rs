//! # Address Space
//!
//! The set of VMAs belonging to one address space ("mm"), indexed twice:
//!
//! - a doubly linked list in ascending `start` order, for neighbour walks;
//! - a red–black tree keyed by `start`, for O(log n) lookup by address.
//!
//! Both always hold the same records in the same order. Every mutating
//! operation takes `&mut self`; an address space shared between CPUs goes
//! behind a `kernel_sync::SpinMutex`.
//!
//! VMAs are named by their start address. A lookup hands out `&Vma` tied to a
//! borrow of the address space, so no reference outlives a removal.

use crate::flags::Protection;
use crate::vma::{OwnedVma, Vma, allocate_vma};
use core::cmp::Ordering;
use core::fmt;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};
use kernel_alloc::PageAlloc;
use kernel_memory_addresses::VirtualAddress;
use kernel_rbtree::{RbNode, RbRoot, RbTreeError, container_of};
use log::{debug, trace};

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmaError {
    #[error("out of memory")]
    OutOfMemory,
    #[error("empty range {start}..{end}")]
    EmptyRange {
        start: VirtualAddress,
        end: VirtualAddress,
    },
    #[error("range {start}..{end} overlaps the mapping at {existing}")]
    Overlap {
        start: VirtualAddress,
        end: VirtualAddress,
        existing: VirtualAddress,
    },
    #[error("no mapping starts at {0}")]
    NotFound(VirtualAddress),
    #[error("cannot split {start}..{end} at {addr}")]
    InvalidSplit {
        start: VirtualAddress,
        end: VirtualAddress,
        addr: VirtualAddress,
    },
    #[error("record was allocated from a different page pool")]
    ForeignAllocator,
    #[error("index corrupted: {0}")]
    Inconsistent(&'static str),
    #[error(transparent)]
    Tree(#[from] RbTreeError),
}

/// The VMAs of one address space.
pub struct AddressSpace<'a, A: PageAlloc> {
    alloc: &'a A,
    tree: RbRoot,
    head: Option<NonNull<Vma>>,
    len: usize,
}

// SAFETY: the address space exclusively owns its records; the pool is only
// used through `&A`, which is shareable when `A: Sync`.
unsafe impl<A: PageAlloc + Sync> Send for AddressSpace<'_, A> {}
// SAFETY: `&AddressSpace` only permits reads of the records.
unsafe impl<A: PageAlloc + Sync> Sync for AddressSpace<'_, A> {}

#[inline]
fn vma_of(node: NonNull<RbNode>) -> NonNull<Vma> {
    // SAFETY: every node in an address-space tree is the `rb` field of a Vma
    // whose pointer was derived from the whole record.
    unsafe { NonNull::new_unchecked(container_of!(node, Vma, rb)) }
}

#[inline]
fn rb_of(vma: NonNull<Vma>) -> NonNull<RbNode> {
    // SAFETY: field projection of a valid, non-null record pointer.
    unsafe { NonNull::new_unchecked(&raw mut (*vma.as_ptr()).rb) }
}

/// Borrow a linked record for as long as `_space` is borrowed.
#[inline]
const fn record<'s, A: PageAlloc>(_space: &'s AddressSpace<'_, A>, vma: NonNull<Vma>) -> &'s Vma {
    // SAFETY: linked records stay valid until removed, which needs `&mut` on the space.
    unsafe { vma.as_ref() }
}

fn by_start(a: NonNull<RbNode>, b: NonNull<RbNode>) -> Ordering {
    // SAFETY: see `vma_of`.
    unsafe { (*vma_of(a).as_ptr()).start.cmp(&(*vma_of(b).as_ptr()).start) }
}

fn containing(addr: &VirtualAddress, node: NonNull<RbNode>) -> Ordering {
    // SAFETY: see `vma_of`.
    let vma = unsafe { vma_of(node).as_ref() };
    if *addr < vma.start {
        Ordering::Less
    } else if *addr >= vma.end {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Orders a candidate range against the stored VMAs; `Equal` means overlap.
/// Monotone because stored VMAs never overlap each other.
fn overlapping(range: &(VirtualAddress, VirtualAddress), node: NonNull<RbNode>) -> Ordering {
    // SAFETY: see `vma_of`.
    let vma = unsafe { vma_of(node).as_ref() };
    if range.1 <= vma.start {
        Ordering::Less
    } else if range.0 >= vma.end {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

impl<'a, A: PageAlloc> AddressSpace<'a, A> {
    /// An empty address space drawing its records from `alloc`.
    #[must_use]
    pub const fn new(alloc: &'a A) -> Self {
        Self {
            alloc,
            tree: RbRoot::new(),
            head: None,
            len: 0,
        }
    }

    #[must_use]
    pub const fn allocator(&self) -> &'a A {
        self.alloc
    }

    /// Allocate an unlinked record from this address space's pool.
    ///
    /// # Errors
    /// [`VmaError::OutOfMemory`] when the pool is exhausted.
    pub fn allocate_vma(&self) -> Result<OwnedVma<'a, A>, VmaError> {
        allocate_vma(self.alloc)
    }

    /// Number of VMAs.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index `vma` in both the tree and the list.
    ///
    /// All checks happen before anything is linked. On error the record is
    /// dropped, returning its page to the pool.
    ///
    /// # Errors
    /// - [`VmaError::EmptyRange`] if `start >= end`.
    /// - [`VmaError::ForeignAllocator`] if the record came from another pool.
    /// - [`VmaError::Overlap`] if the range intersects an existing VMA.
    pub fn insert(&mut self, vma: OwnedVma<'a, A>) -> Result<&Vma, VmaError> {
        let (start, end) = (vma.start(), vma.end());
        if start >= end {
            return Err(VmaError::EmptyRange { start, end });
        }
        if !ptr::eq(vma.allocator(), self.alloc) {
            return Err(VmaError::ForeignAllocator);
        }
        if let Some(node) = self.tree.find_first(&(start, end), overlapping) {
            let existing = record(self, vma_of(node)).start;
            return Err(VmaError::Overlap {
                start,
                end,
                existing,
            });
        }

        let vma = vma.into_raw();
        // SAFETY: the record is valid, unlinked and owned by us from here on.
        unsafe { self.link(vma) };
        trace!("vma {start}..{end} inserted");
        Ok(record(self, vma))
    }

    /// Unlink the VMA starting at `start` and hand it back.
    ///
    /// # Errors
    /// [`VmaError::NotFound`] if no VMA starts exactly at `start`.
    pub fn remove(&mut self, start: VirtualAddress) -> Result<OwnedVma<'a, A>, VmaError> {
        let vma = self.lookup_exact(start)?;
        // SAFETY: `vma` is linked into this space.
        unsafe { self.unlink(vma)? };
        trace!("vma {start}..{} removed", record(self, vma).end);
        // SAFETY: unlinked, and allocated from `self.alloc` (checked on insert).
        Ok(unsafe { OwnedVma::from_raw(vma, self.alloc) })
    }

    /// The VMA with `start <= addr < end`, if any.
    #[must_use]
    pub fn find(&self, addr: VirtualAddress) -> Option<&Vma> {
        self.tree
            .find(&addr, containing)
            .map(|node| record(self, vma_of(node)))
    }

    /// The last VMA starting below `addr`, which may or may not contain it.
    #[must_use]
    pub fn find_predecessor(&self, addr: VirtualAddress) -> Option<&Vma> {
        self.iter().take_while(|vma| vma.start < addr).last()
    }

    /// Split the VMA starting at `start` into `[start, addr)` and
    /// `[addr, end)`. The upper part inherits protection, flags and backing,
    /// with its offset advanced by `addr - start`. Returns the upper part.
    ///
    /// # Errors
    /// - [`VmaError::NotFound`] if no VMA starts at `start`.
    /// - [`VmaError::InvalidSplit`] unless `start < addr < end`.
    /// - [`VmaError::OutOfMemory`] if no record can be allocated.
    ///
    /// On error nothing is changed.
    pub fn split(&mut self, start: VirtualAddress, addr: VirtualAddress) -> Result<&Vma, VmaError> {
        let lower = self.lookup_exact(start)?;
        let original = record(self, lower);
        let end = original.end;
        if addr <= start || addr >= end {
            return Err(VmaError::InvalidSplit { start, end, addr });
        }

        let mut upper = allocate_vma(self.alloc)?;
        upper.set_range(addr, end);
        upper.set_protection(original.prot);
        upper.set_flags(original.flags);
        upper.set_backing(original.backing);
        upper.set_offset(original.offset.wrapping_add(addr - start));

        // Shrinking first keeps the tree ordered: `addr` sorts after `start`.
        // SAFETY: exclusive access through `&mut self`; only `end` changes,
        // which is not part of the tree key.
        unsafe { (*lower.as_ptr()).end = addr };

        let upper = upper.into_raw();
        // SAFETY: fresh, unlinked record from our pool.
        unsafe { self.link(upper) };
        trace!("vma {start}..{end} split at {addr}");
        Ok(record(self, upper))
    }

    /// Change the protection of the VMA starting at `start`.
    ///
    /// # Errors
    /// [`VmaError::NotFound`] if no VMA starts at `start`.
    pub fn set_protection(&mut self, start: VirtualAddress, prot: Protection) -> Result<(), VmaError> {
        let vma = self.lookup_exact(start)?;
        // SAFETY: exclusive access through `&mut self`.
        unsafe { (*vma.as_ptr()).prot = prot };
        Ok(())
    }

    /// VMAs in list order.
    #[must_use]
    pub fn iter(&self) -> VmaIter<'_> {
        VmaIter {
            next: self.head,
            _space: PhantomData,
        }
    }

    /// VMAs in tree order. Always the same sequence as [`iter`](Self::iter).
    pub fn iter_tree(&self) -> impl Iterator<Item = &Vma> + '_ {
        self.tree.iter().map(|node| record(self, vma_of(node)))
    }

    /// Release every VMA back to the pool.
    pub fn clear(&mut self) {
        let released = self.len;
        let mut cursor = self.head.take();
        while let Some(vma) = cursor {
            // SAFETY: list members are valid records from our pool; the
            // whole index is discarded below, so links need no repair.
            unsafe {
                cursor = (*vma.as_ptr()).next;
                drop(OwnedVma::from_raw(vma, self.alloc));
            }
        }
        self.tree = RbRoot::new();
        self.len = 0;
        if released > 0 {
            debug!("address space released {released} vmas");
        }
    }

    /// Check that list and tree agree, that the VMAs are sorted, non-empty
    /// and non-overlapping, and that the tree is balanced.
    ///
    /// # Errors
    /// The first inconsistency found.
    pub fn validate(&self) -> Result<(), VmaError> {
        self.tree.validate()?;

        let mut count = 0;
        let mut prev: Option<NonNull<Vma>> = None;
        let mut cursor = self.head;
        while let Some(vma) = cursor {
            let current = record(self, vma);
            if current.prev != prev {
                return Err(VmaError::Inconsistent("broken list back-link"));
            }
            if current.start >= current.end {
                return Err(VmaError::Inconsistent("empty vma"));
            }
            if let Some(p) = prev
                && record(self, p).end > current.start
            {
                return Err(VmaError::Inconsistent("vmas out of order or overlapping"));
            }
            count += 1;
            prev = Some(vma);
            cursor = current.next;
        }

        if count != self.len {
            return Err(VmaError::Inconsistent("list length differs from count"));
        }

        let mut tree = self.tree.iter().map(vma_of);
        let mut list = self.iter().map(NonNull::from);
        loop {
            match (tree.next(), list.next()) {
                (None, None) => return Ok(()),
                (Some(t), Some(l)) if t == l => {}
                _ => return Err(VmaError::Inconsistent("list and tree disagree")),
            }
        }
    }

    fn lookup_exact(&self, start: VirtualAddress) -> Result<NonNull<Vma>, VmaError> {
        self.tree
            .find(&start, containing)
            .map(vma_of)
            .filter(|&vma| record(self, vma).start == start)
            .ok_or(VmaError::NotFound(start))
    }

    /// # Safety
    /// `vma` must be a valid, unlinked record from `self.alloc` that does not
    /// overlap any linked record.
    unsafe fn link(&mut self, vma: NonNull<Vma>) {
        unsafe {
            self.tree.insert(rb_of(vma), by_start);

            let start = (*vma.as_ptr()).start;
            let mut prev = None;
            let mut cursor = self.head;
            while let Some(c) = cursor {
                if (*c.as_ptr()).start >= start {
                    break;
                }
                prev = Some(c);
                cursor = (*c.as_ptr()).next;
            }

            (*vma.as_ptr()).prev = prev;
            (*vma.as_ptr()).next = cursor;
            match prev {
                Some(p) => (*p.as_ptr()).next = Some(vma),
                None => self.head = Some(vma),
            }
            if let Some(c) = cursor {
                (*c.as_ptr()).prev = Some(vma);
            }
        }
        self.len += 1;
    }

    /// # Safety
    /// `vma` must be linked into this address space.
    unsafe fn unlink(&mut self, vma: NonNull<Vma>) -> Result<(), VmaError> {
        unsafe {
            self.tree.erase(rb_of(vma))?;

            let prev = (*vma.as_ptr()).prev.take();
            let next = (*vma.as_ptr()).next.take();
            match prev {
                Some(p) => (*p.as_ptr()).next = next,
                None => self.head = next,
            }
            if let Some(n) = next {
                (*n.as_ptr()).prev = prev;
            }
        }
        self.len -= 1;
        Ok(())
    }
}

impl<A: PageAlloc> Drop for AddressSpace<'_, A> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<A: PageAlloc> fmt::Debug for AddressSpace<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|vma| vma.start..vma.end))
            .finish()
    }
}

/// List-order iterator over the VMAs of an [`AddressSpace`].
pub struct VmaIter<'s> {
    next: Option<NonNull<Vma>>,
    _space: PhantomData<&'s Vma>,
}

impl<'s> Iterator for VmaIter<'s> {
    type Item = &'s Vma;

    fn next(&mut self) -> Option<&'s Vma> {
        let current = self.next?;
        // SAFETY: the borrow of the address space keeps the list intact.
        let vma: &'s Vma = unsafe { current.as_ref() };
        self.next = vma.next;
        Some(vma)
    }
}

impl<'s, 'a, A: PageAlloc> IntoIterator for &'s AddressSpace<'a, A> {
    type Item = &'s Vma;
    type IntoIter = VmaIter<'s>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
