//! # VMA Records
//!
//! A [`Vma`] describes one contiguous virtual range with uniform attributes.
//! Each record occupies its own page from the [`PageAlloc`] pool and carries
//! the links that make it a member of an address space's list and tree.
//!
//! Records that are not indexed by any address space are held through an
//! [`OwnedVma`], which returns the page on drop. An indexed record is only
//! ever visible as `&Vma`, so it cannot be freed while still linked.

use crate::address_space::VmaError;
use crate::flags::{MapFlags, Protection};
use core::fmt;
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;
use kernel_alloc::PageAlloc;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalPage, VirtualAddress};
use kernel_rbtree::RbNode;
use log::trace;

const _: () = assert!(size_of::<Vma>() as u64 <= PAGE_SIZE);

/// Non-owning reference to the object a mapping is backed by (for example a
/// file). The VMA manager never dereferences it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BackingObject(NonNull<()>);

impl BackingObject {
    #[must_use]
    pub const fn new<T>(object: NonNull<T>) -> Self {
        Self(object.cast())
    }

    #[must_use]
    pub const fn as_ptr<T>(self) -> NonNull<T> {
        self.0.cast()
    }
}

/// One virtual memory area `[start, end)`.
pub struct Vma {
    pub(crate) start: VirtualAddress,
    pub(crate) end: VirtualAddress,
    pub(crate) prot: Protection,
    pub(crate) flags: MapFlags,
    pub(crate) offset: u64,
    pub(crate) backing: Option<BackingObject>,

    pub(crate) prev: Option<NonNull<Vma>>,
    pub(crate) next: Option<NonNull<Vma>>,
    pub(crate) rb: RbNode,

    /// The pool page this record lives in.
    page: PhysicalPage,
}

impl Vma {
    const fn empty(page: PhysicalPage) -> Self {
        Self {
            start: VirtualAddress::zero(),
            end: VirtualAddress::zero(),
            prot: Protection::NONE,
            flags: MapFlags::new(),
            offset: 0,
            backing: None,
            prev: None,
            next: None,
            rb: RbNode::new(),
            page,
        }
    }

    #[must_use]
    pub const fn start(&self) -> VirtualAddress {
        self.start
    }

    /// First address past the area.
    #[must_use]
    pub const fn end(&self) -> VirtualAddress {
        self.end
    }

    /// Size in bytes; zero for an inverted range.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end.as_u64().saturating_sub(self.start.as_u64())
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn contains(&self, addr: VirtualAddress) -> bool {
        self.start.as_u64() <= addr.as_u64() && addr.as_u64() < self.end.as_u64()
    }

    #[must_use]
    pub const fn protection(&self) -> Protection {
        self.prot
    }

    #[must_use]
    pub const fn flags(&self) -> MapFlags {
        self.flags
    }

    /// Byte offset into the backing object that `start` corresponds to.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub const fn backing(&self) -> Option<BackingObject> {
        self.backing
    }

    /// The pool page holding this record.
    #[must_use]
    pub const fn page(&self) -> PhysicalPage {
        self.page
    }

    pub const fn set_range(&mut self, start: VirtualAddress, end: VirtualAddress) {
        self.start = start;
        self.end = end;
    }

    pub const fn set_protection(&mut self, prot: Protection) {
        self.prot = prot;
    }

    pub const fn set_flags(&mut self, flags: MapFlags) {
        self.flags = flags;
    }

    pub const fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }

    pub const fn set_backing(&mut self, backing: Option<BackingObject>) {
        self.backing = backing;
    }
}

impl fmt::Debug for Vma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vma")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("prot", &self.prot)
            .field("flags", &self.flags)
            .field("offset", &self.offset)
            .field("backing", &self.backing)
            .finish_non_exhaustive()
    }
}

/// A VMA record that no address space indexes.
///
/// Dropping it (or passing it to [`free_vma`]) returns its page to the pool.
pub struct OwnedVma<'a, A: PageAlloc> {
    ptr: NonNull<Vma>,
    alloc: &'a A,
}

// SAFETY: the record is exclusively owned; the allocator is only used through `&A`.
unsafe impl<A: PageAlloc + Sync> Send for OwnedVma<'_, A> {}
// SAFETY: shared access only reads the record.
unsafe impl<A: PageAlloc + Sync> Sync for OwnedVma<'_, A> {}

impl<'a, A: PageAlloc> OwnedVma<'a, A> {
    /// The pool this record will be returned to.
    #[must_use]
    pub const fn allocator(&self) -> &'a A {
        self.alloc
    }

    /// Give up ownership without releasing the page.
    pub(crate) fn into_raw(self) -> NonNull<Vma> {
        let this = ManuallyDrop::new(self);
        this.ptr
    }

    /// # Safety
    /// `ptr` must come from [`into_raw`](Self::into_raw) of a record allocated
    /// from `alloc`, and must no longer be linked anywhere.
    pub(crate) const unsafe fn from_raw(ptr: NonNull<Vma>, alloc: &'a A) -> Self {
        Self { ptr, alloc }
    }
}

impl<A: PageAlloc> Deref for OwnedVma<'_, A> {
    type Target = Vma;

    fn deref(&self) -> &Vma {
        // SAFETY: the record is valid and owned for the lifetime of `self`.
        unsafe { self.ptr.as_ref() }
    }
}

impl<A: PageAlloc> DerefMut for OwnedVma<'_, A> {
    fn deref_mut(&mut self) -> &mut Vma {
        // SAFETY: as above, and `&mut self` makes the access exclusive.
        unsafe { self.ptr.as_mut() }
    }
}

impl<A: PageAlloc> Drop for OwnedVma<'_, A> {
    fn drop(&mut self) {
        let page = self.page;
        // SAFETY: the record lives in `page`, which came from `alloc`, and
        // nothing references it any more.
        unsafe { self.alloc.free_page(page) };
    }
}

impl<A: PageAlloc> fmt::Debug for OwnedVma<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// Allocate a fresh, unlinked VMA record with all fields zeroed.
///
/// # Errors
/// [`VmaError::OutOfMemory`] when the pool has no page left.
pub fn allocate_vma<A: PageAlloc>(alloc: &A) -> Result<OwnedVma<'_, A>, VmaError> {
    let page = alloc.allocate_page().ok_or(VmaError::OutOfMemory)?;
    let Some(ptr) = NonNull::new(alloc.page_ptr(page).cast::<Vma>()) else {
        // SAFETY: the page was never exposed.
        unsafe { alloc.free_page(page) };
        return Err(VmaError::OutOfMemory);
    };

    // SAFETY: the page is ours, page aligned and large enough for a record.
    unsafe { ptr.write(Vma::empty(page)) };
    trace!("vma record allocated in {page:?}");
    Ok(OwnedVma { ptr, alloc })
}

/// Release an unindexed record back to its pool.
///
/// Indexed records have to be taken out of their address space first, see
/// [`AddressSpace::remove`](crate::AddressSpace::remove).
pub fn free_vma<A: PageAlloc>(vma: OwnedVma<'_, A>) {
    trace!("vma record {:?} freed", vma.page);
    drop(vma);
}
