use core::ptr::NonNull;

/// A possibly absent link to another node.
pub type Link = Option<NonNull<RbNode>>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Red,
    Black,
}

/// Linkage embedded in a caller's record.
///
/// The tree never allocates, moves or frees nodes; it only rewrites these
/// links. Recover the enclosing record with [`container_of!`](crate::container_of).
#[derive(Debug, Default)]
pub struct RbNode {
    pub(crate) parent: Link,
    pub(crate) left: Link,
    pub(crate) right: Link,
    pub(crate) color: Color,
}

impl RbNode {
    /// An unlinked node.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            parent: None,
            left: None,
            right: None,
            color: Color::Red,
        }
    }

    #[must_use]
    pub const fn color(&self) -> Color {
        self.color
    }

    #[must_use]
    pub const fn parent(&self) -> Link {
        self.parent
    }

    #[must_use]
    pub const fn left(&self) -> Link {
        self.left
    }

    #[must_use]
    pub const fn right(&self) -> Link {
        self.right
    }

    /// In-order successor.
    ///
    /// # Safety
    /// `node` must be linked into a tree whose nodes are all valid.
    #[must_use]
    pub unsafe fn next(node: NonNull<Self>) -> Link {
        unsafe {
            if let Some(mut n) = right_of(node) {
                while let Some(l) = left_of(n) {
                    n = l;
                }
                return Some(n);
            }

            let mut n = node;
            while let Some(p) = parent_of(n) {
                if right_of(p) != Some(n) {
                    return Some(p);
                }
                n = p;
            }
            None
        }
    }

    /// In-order predecessor.
    ///
    /// # Safety
    /// `node` must be linked into a tree whose nodes are all valid.
    #[must_use]
    pub unsafe fn prev(node: NonNull<Self>) -> Link {
        unsafe {
            if let Some(mut n) = left_of(node) {
                while let Some(r) = right_of(n) {
                    n = r;
                }
                return Some(n);
            }

            let mut n = node;
            while let Some(p) = parent_of(n) {
                if left_of(p) != Some(n) {
                    return Some(p);
                }
                n = p;
            }
            None
        }
    }
}

// Raw field access. Every helper requires `n` to point at a live node that is
// not borrowed elsewhere for the duration of the call.

#[inline]
pub(crate) const unsafe fn parent_of(n: NonNull<RbNode>) -> Link {
    unsafe { (*n.as_ptr()).parent }
}

#[inline]
pub(crate) const unsafe fn left_of(n: NonNull<RbNode>) -> Link {
    unsafe { (*n.as_ptr()).left }
}

#[inline]
pub(crate) const unsafe fn right_of(n: NonNull<RbNode>) -> Link {
    unsafe { (*n.as_ptr()).right }
}

#[inline]
pub(crate) const unsafe fn color_of(n: NonNull<RbNode>) -> Color {
    unsafe { (*n.as_ptr()).color }
}

#[inline]
pub(crate) const unsafe fn set_parent(n: NonNull<RbNode>, parent: Link) {
    unsafe { (*n.as_ptr()).parent = parent }
}

#[inline]
pub(crate) const unsafe fn set_left(n: NonNull<RbNode>, left: Link) {
    unsafe { (*n.as_ptr()).left = left }
}

#[inline]
pub(crate) const unsafe fn set_right(n: NonNull<RbNode>, right: Link) {
    unsafe { (*n.as_ptr()).right = right }
}

#[inline]
pub(crate) const unsafe fn set_color(n: NonNull<RbNode>, color: Color) {
    unsafe { (*n.as_ptr()).color = color }
}

/// Absent links count as black.
#[inline]
pub(crate) unsafe fn is_red(link: Link) -> bool {
    match link {
        Some(n) => unsafe { matches!(color_of(n), Color::Red) },
        None => false,
    }
}

#[inline]
pub(crate) unsafe fn is_black(link: Link) -> bool {
    unsafe { !is_red(link) }
}
