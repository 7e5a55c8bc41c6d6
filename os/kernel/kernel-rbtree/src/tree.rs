use crate::node::{
    Color, Link, RbNode, color_of, is_black, is_red, left_of, parent_of, right_of, set_color,
    set_left, set_parent, set_right,
};
use core::cmp::Ordering;
use core::marker::PhantomData;
use core::ptr::NonNull;

/// Errors reported by [`RbRoot`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RbTreeError {
    #[error("node is not linked into this tree")]
    NotInTree,
    #[error("root node is red")]
    RedRoot,
    #[error("red node has a red child")]
    RedChildOfRed,
    #[error("black height differs between subtrees: {left} vs {right}")]
    BlackHeightMismatch { left: usize, right: usize },
    #[error("child does not link back to its parent")]
    BrokenParentLink,
}

/// Root of an intrusive red–black tree.
///
/// Ordering is supplied per call by the caller's comparator, so the same
/// node type can be keyed differently by different trees. The tree keeps no
/// element count.
///
/// Every node reachable from the root must stay valid and unmoved until it is
/// erased; this is the contract of [`insert`](Self::insert), and the safe
/// query methods rely on it.
#[derive(Debug, Default)]
pub struct RbRoot {
    node: Link,
}

impl RbRoot {
    #[must_use]
    pub const fn new() -> Self {
        Self { node: None }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.node.is_none()
    }

    #[must_use]
    pub const fn root(&self) -> Link {
        self.node
    }

    /// Link `node` below the leaf chosen by `cmp(node, existing)` and
    /// rebalance. Nodes comparing [`Ordering::Equal`] go to the right, so
    /// duplicates keep insertion order during in-order traversal.
    ///
    /// # Safety
    /// `node` must not be linked into any tree, and must stay valid and
    /// unmoved until it is erased from this tree.
    pub unsafe fn insert<F>(&mut self, node: NonNull<RbNode>, mut cmp: F)
    where
        F: FnMut(NonNull<RbNode>, NonNull<RbNode>) -> Ordering,
    {
        debug_assert_ne!(self.node, Some(node));

        let mut parent = None;
        let mut go_left = false;
        let mut cursor = self.node;

        unsafe {
            while let Some(current) = cursor {
                parent = Some(current);
                go_left = cmp(node, current) == Ordering::Less;
                cursor = if go_left {
                    left_of(current)
                } else {
                    right_of(current)
                };
            }

            node.as_ptr().write(RbNode {
                parent,
                ..RbNode::new()
            });

            match parent {
                None => self.node = Some(node),
                Some(p) if go_left => set_left(p, Some(node)),
                Some(p) => set_right(p, Some(node)),
            }

            self.insert_color(node);
        }
    }

    /// Node for which `cmp(key, node)` is [`Ordering::Equal`], if any.
    ///
    /// `cmp` returns [`Ordering::Less`] when `key` sorts before `node`.
    pub fn find<K, F>(&self, key: &K, mut cmp: F) -> Link
    where
        K: ?Sized,
        F: FnMut(&K, NonNull<RbNode>) -> Ordering,
    {
        let mut cursor = self.node;
        while let Some(node) = cursor {
            // SAFETY: reachable nodes are valid per the insert contract.
            cursor = unsafe {
                match cmp(key, node) {
                    Ordering::Less => left_of(node),
                    Ordering::Greater => right_of(node),
                    Ordering::Equal => return Some(node),
                }
            };
        }
        None
    }

    /// Leftmost node for which `cmp(key, node)` is [`Ordering::Equal`].
    ///
    /// Use this with duplicate keys or with interval comparators where
    /// several nodes may match.
    pub fn find_first<K, F>(&self, key: &K, mut cmp: F) -> Link
    where
        K: ?Sized,
        F: FnMut(&K, NonNull<RbNode>) -> Ordering,
    {
        let mut cursor = self.node;
        let mut found = None;
        while let Some(node) = cursor {
            // SAFETY: reachable nodes are valid per the insert contract.
            cursor = unsafe {
                match cmp(key, node) {
                    Ordering::Greater => right_of(node),
                    Ordering::Equal => {
                        found = Some(node);
                        left_of(node)
                    }
                    Ordering::Less => left_of(node),
                }
            };
        }
        found
    }

    /// `true` if `node` is linked into this tree.
    ///
    /// Walks parent links, so this costs O(log n).
    ///
    /// # Safety
    /// `node` and all of its ancestors must be valid.
    #[must_use]
    pub unsafe fn contains(&self, node: NonNull<RbNode>) -> bool {
        let mut top = node;
        unsafe {
            while let Some(p) = parent_of(top) {
                top = p;
            }
        }
        self.node == Some(top)
    }

    /// Unlink `node` and rebalance. The node's links are cleared afterwards,
    /// so it may be inserted again.
    ///
    /// # Errors
    /// [`RbTreeError::NotInTree`] if `node` is not linked into this tree; the
    /// tree is left untouched.
    ///
    /// # Safety
    /// `node` and all of its ancestors must be valid.
    pub unsafe fn erase(&mut self, node: NonNull<RbNode>) -> Result<(), RbTreeError> {
        unsafe {
            if !self.contains(node) {
                return Err(RbTreeError::NotInTree);
            }

            let child;
            let parent;
            let color;

            match (left_of(node), right_of(node)) {
                (Some(old_left), Some(old_right)) => {
                    let mut successor = old_right;
                    while let Some(l) = left_of(successor) {
                        successor = l;
                    }

                    self.replace_child(parent_of(node), node, Some(successor));

                    child = right_of(successor);
                    color = color_of(successor);
                    let successor_parent = parent_of(successor);

                    if successor_parent == Some(node) {
                        parent = Some(successor);
                    } else {
                        parent = successor_parent;
                        if let Some(c) = child {
                            set_parent(c, parent);
                        }
                        if let Some(p) = parent {
                            set_left(p, child);
                        }
                        set_right(successor, Some(old_right));
                        set_parent(old_right, Some(successor));
                    }

                    set_parent(successor, parent_of(node));
                    set_color(successor, color_of(node));
                    set_left(successor, Some(old_left));
                    set_parent(old_left, Some(successor));
                }
                (left, right) => {
                    child = left.or(right);
                    parent = parent_of(node);
                    color = color_of(node);

                    if let Some(c) = child {
                        set_parent(c, parent);
                    }
                    self.replace_child(parent, node, child);
                }
            }

            if color == Color::Black {
                self.erase_color(child, parent);
            }

            node.as_ptr().write(RbNode::new());
        }
        Ok(())
    }

    /// Put `new` into `victim`'s position without rebalancing.
    ///
    /// The caller guarantees that `new` orders exactly like `victim`.
    /// `victim`'s links are cleared.
    ///
    /// # Errors
    /// [`RbTreeError::NotInTree`] if `victim` is not linked into this tree.
    ///
    /// # Safety
    /// `victim` and its ancestors must be valid; `new` must be unlinked and
    /// stay valid and unmoved until erased.
    pub unsafe fn replace(
        &mut self,
        victim: NonNull<RbNode>,
        new: NonNull<RbNode>,
    ) -> Result<(), RbTreeError> {
        if victim == new {
            return Ok(());
        }

        unsafe {
            if !self.contains(victim) {
                return Err(RbTreeError::NotInTree);
            }

            let parent = parent_of(victim);
            let left = left_of(victim);
            let right = right_of(victim);

            self.replace_child(parent, victim, Some(new));
            if let Some(l) = left {
                set_parent(l, Some(new));
            }
            if let Some(r) = right {
                set_parent(r, Some(new));
            }

            new.as_ptr().write(RbNode {
                parent,
                left,
                right,
                color: color_of(victim),
            });
            victim.as_ptr().write(RbNode::new());
        }
        Ok(())
    }

    /// Smallest node.
    #[must_use]
    pub fn first(&self) -> Link {
        let mut n = self.node?;
        // SAFETY: reachable nodes are valid per the insert contract.
        unsafe {
            while let Some(l) = left_of(n) {
                n = l;
            }
        }
        Some(n)
    }

    /// Largest node.
    #[must_use]
    pub fn last(&self) -> Link {
        let mut n = self.node?;
        // SAFETY: reachable nodes are valid per the insert contract.
        unsafe {
            while let Some(r) = right_of(n) {
                n = r;
            }
        }
        Some(n)
    }

    /// Ascending in-order traversal.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            next: self.first(),
            _tree: PhantomData,
        }
    }

    /// Call `f` on `node` and then on each of its ancestors up to the root.
    ///
    /// Used to refresh per-subtree aggregates after a node changed.
    ///
    /// # Safety
    /// `node` and all of its ancestors must be valid.
    pub unsafe fn augment_path<F>(node: NonNull<RbNode>, mut f: F)
    where
        F: FnMut(NonNull<RbNode>),
    {
        let mut cursor = Some(node);
        while let Some(n) = cursor {
            f(n);
            cursor = unsafe { parent_of(n) };
        }
    }

    /// Re-derive the red–black properties from scratch.
    ///
    /// Returns the black height of the tree (an empty tree has height 1,
    /// counting the absent leaves).
    ///
    /// # Errors
    /// The first violation found.
    pub fn validate(&self) -> Result<usize, RbTreeError> {
        let Some(root) = self.node else {
            return Ok(1);
        };

        // SAFETY: reachable nodes are valid per the insert contract.
        unsafe {
            if color_of(root) == Color::Red {
                return Err(RbTreeError::RedRoot);
            }
            if parent_of(root).is_some() {
                return Err(RbTreeError::BrokenParentLink);
            }
            validate_subtree(root)
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Point `parent`'s link to `old` (or the root, if `parent` is `None`)
    /// at `new`.
    unsafe fn replace_child(&mut self, parent: Link, old: NonNull<RbNode>, new: Link) {
        unsafe {
            match parent {
                None => self.node = new,
                Some(p) if left_of(p) == Some(old) => set_left(p, new),
                Some(p) => set_right(p, new),
            }
        }
    }

    unsafe fn rotate_left(&mut self, node: NonNull<RbNode>) {
        unsafe {
            let Some(right) = right_of(node) else {
                return;
            };
            let parent = parent_of(node);

            let inner = left_of(right);
            set_right(node, inner);
            if let Some(i) = inner {
                set_parent(i, Some(node));
            }

            set_left(right, Some(node));
            set_parent(right, parent);
            self.replace_child(parent, node, Some(right));
            set_parent(node, Some(right));
        }
    }

    unsafe fn rotate_right(&mut self, node: NonNull<RbNode>) {
        unsafe {
            let Some(left) = left_of(node) else {
                return;
            };
            let parent = parent_of(node);

            let inner = right_of(left);
            set_left(node, inner);
            if let Some(i) = inner {
                set_parent(i, Some(node));
            }

            set_right(left, Some(node));
            set_parent(left, parent);
            self.replace_child(parent, node, Some(left));
            set_parent(node, Some(left));
        }
    }

    unsafe fn insert_color(&mut self, mut node: NonNull<RbNode>) {
        unsafe {
            while let Some(mut parent) = parent_of(node) {
                if color_of(parent) == Color::Black {
                    break;
                }
                // A red parent is never the root.
                let Some(grandparent) = parent_of(parent) else {
                    break;
                };

                if left_of(grandparent) == Some(parent) {
                    if let Some(uncle) = right_of(grandparent)
                        && color_of(uncle) == Color::Red
                    {
                        set_color(uncle, Color::Black);
                        set_color(parent, Color::Black);
                        set_color(grandparent, Color::Red);
                        node = grandparent;
                        continue;
                    }

                    if right_of(parent) == Some(node) {
                        self.rotate_left(parent);
                        core::mem::swap(&mut parent, &mut node);
                    }

                    set_color(parent, Color::Black);
                    set_color(grandparent, Color::Red);
                    self.rotate_right(grandparent);
                } else {
                    if let Some(uncle) = left_of(grandparent)
                        && color_of(uncle) == Color::Red
                    {
                        set_color(uncle, Color::Black);
                        set_color(parent, Color::Black);
                        set_color(grandparent, Color::Red);
                        node = grandparent;
                        continue;
                    }

                    if left_of(parent) == Some(node) {
                        self.rotate_right(parent);
                        core::mem::swap(&mut parent, &mut node);
                    }

                    set_color(parent, Color::Black);
                    set_color(grandparent, Color::Red);
                    self.rotate_left(grandparent);
                }
            }

            if let Some(root) = self.node {
                set_color(root, Color::Black);
            }
        }
    }

    /// Restore the black height after a black node was removed above `node`.
    /// `node` may be absent, hence the separate `parent`.
    unsafe fn erase_color(&mut self, mut node: Link, mut parent: Link) {
        unsafe {
            while is_black(node) && node != self.node {
                let Some(p) = parent else {
                    break;
                };

                if left_of(p) == node {
                    let Some(mut sibling) = right_of(p) else {
                        break;
                    };
                    if color_of(sibling) == Color::Red {
                        set_color(sibling, Color::Black);
                        set_color(p, Color::Red);
                        self.rotate_left(p);
                        let Some(s) = right_of(p) else {
                            break;
                        };
                        sibling = s;
                    }

                    if is_black(left_of(sibling)) && is_black(right_of(sibling)) {
                        set_color(sibling, Color::Red);
                        node = Some(p);
                        parent = parent_of(p);
                        continue;
                    }

                    if is_black(right_of(sibling)) {
                        if let Some(inner) = left_of(sibling) {
                            set_color(inner, Color::Black);
                        }
                        set_color(sibling, Color::Red);
                        self.rotate_right(sibling);
                        let Some(s) = right_of(p) else {
                            break;
                        };
                        sibling = s;
                    }

                    set_color(sibling, color_of(p));
                    set_color(p, Color::Black);
                    if let Some(outer) = right_of(sibling) {
                        set_color(outer, Color::Black);
                    }
                    self.rotate_left(p);
                } else {
                    let Some(mut sibling) = left_of(p) else {
                        break;
                    };
                    if color_of(sibling) == Color::Red {
                        set_color(sibling, Color::Black);
                        set_color(p, Color::Red);
                        self.rotate_right(p);
                        let Some(s) = left_of(p) else {
                            break;
                        };
                        sibling = s;
                    }

                    if is_black(left_of(sibling)) && is_black(right_of(sibling)) {
                        set_color(sibling, Color::Red);
                        node = Some(p);
                        parent = parent_of(p);
                        continue;
                    }

                    if is_black(left_of(sibling)) {
                        if let Some(inner) = right_of(sibling) {
                            set_color(inner, Color::Black);
                        }
                        set_color(sibling, Color::Red);
                        self.rotate_left(sibling);
                        let Some(s) = left_of(p) else {
                            break;
                        };
                        sibling = s;
                    }

                    set_color(sibling, color_of(p));
                    set_color(p, Color::Black);
                    if let Some(outer) = left_of(sibling) {
                        set_color(outer, Color::Black);
                    }
                    self.rotate_right(p);
                }

                node = self.node;
                break;
            }

            if let Some(n) = node {
                set_color(n, Color::Black);
            }
        }
    }
}

unsafe fn validate_subtree(node: NonNull<RbNode>) -> Result<usize, RbTreeError> {
    unsafe {
        let left = left_of(node);
        let right = right_of(node);

        if color_of(node) == Color::Red && (is_red(left) || is_red(right)) {
            return Err(RbTreeError::RedChildOfRed);
        }

        for child in [left, right].into_iter().flatten() {
            if parent_of(child) != Some(node) {
                return Err(RbTreeError::BrokenParentLink);
            }
        }

        let left_height = match left {
            Some(l) => validate_subtree(l)?,
            None => 1,
        };
        let right_height = match right {
            Some(r) => validate_subtree(r)?,
            None => 1,
        };

        if left_height != right_height {
            return Err(RbTreeError::BlackHeightMismatch {
                left: left_height,
                right: right_height,
            });
        }

        Ok(left_height + usize::from(color_of(node) == Color::Black))
    }
}

/// In-order iterator over the nodes of an [`RbRoot`].
pub struct Iter<'a> {
    next: Link,
    _tree: PhantomData<&'a RbRoot>,
}

impl Iterator for Iter<'_> {
    type Item = NonNull<RbNode>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        // SAFETY: the borrow of the root keeps the tree unmodified.
        self.next = unsafe { RbNode::next(current) };
        Some(current)
    }
}

impl<'a> IntoIterator for &'a RbRoot {
    type Item = NonNull<RbNode>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
