//! # Intrusive Red–Black Tree
//!
//! A balanced ordered index whose link fields ([`RbNode`]) live inside the
//! caller's own records. The tree never allocates; inserting and erasing only
//! rewrite links, which lets kernel records that sit in pool pages be indexed
//! without a heap.
//!
//! Ordering is not a property of the node type: every operation that needs it
//! takes a comparator closure, so a record can be keyed by a single field, an
//! interval, or anything else the caller can compare.
//!
//! ## Example
//!
//! ```rust
//! use core::cmp::Ordering;
//! use core::ptr::NonNull;
//! use kernel_rbtree::{RbNode, RbRoot, container_of};
//!
//! struct Item {
//!     key: u64,
//!     rb: RbNode,
//! }
//!
//! fn key(node: NonNull<RbNode>) -> u64 {
//!     unsafe { (*container_of!(node, Item, rb)).key }
//! }
//!
//! let items: Vec<*mut Item> = [30, 10, 20]
//!     .into_iter()
//!     .map(|key| Box::into_raw(Box::new(Item { key, rb: RbNode::new() })))
//!     .collect();
//!
//! let mut tree = RbRoot::new();
//! for &item in &items {
//!     let node = unsafe { NonNull::new_unchecked(&raw mut (*item).rb) };
//!     unsafe { tree.insert(node, |a, b| key(a).cmp(&key(b))) };
//! }
//!
//! let keys: Vec<u64> = tree.iter().map(key).collect();
//! assert_eq!(keys, [10, 20, 30]);
//! assert!(tree.find(&20, |k, n| k.cmp(&key(n))).is_some());
//!
//! for item in items {
//!     let node = unsafe { NonNull::new_unchecked(&raw mut (*item).rb) };
//!     unsafe { tree.erase(node).unwrap() };
//!     drop(unsafe { Box::from_raw(item) });
//! }
//! assert!(tree.is_empty());
//! ```
//!
//! ## Safety Model
//!
//! Nodes are referenced through [`NonNull`](core::ptr::NonNull) links. A node
//! handed to [`RbRoot::insert`] must stay valid and must not move until it is
//! erased again. Given that, lookups and traversal are safe; everything that
//! takes a node pointer from the caller is `unsafe`.
//!
//! [`RbRoot::erase`] checks membership by walking to the root and refuses
//! nodes of other trees with [`RbTreeError::NotInTree`] instead of corrupting
//! either tree.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod node;
mod tree;

pub use node::{Color, Link, RbNode};
pub use tree::{Iter, RbRoot, RbTreeError};

/// Recover a `*mut $Container` from a `NonNull<RbNode>` that points at its
/// `$field`.
///
/// Expands to a raw pointer offset and must be used inside `unsafe`. The
/// node pointer must have been derived from a pointer to the whole
/// container, not from a reference to the field alone.
#[macro_export]
macro_rules! container_of {
    ($node:expr, $Container:ty, $field:ident) => {
        ::core::ptr::NonNull::<$crate::RbNode>::as_ptr($node)
            .byte_sub(::core::mem::offset_of!($Container, $field))
            .cast::<$Container>()
    };
}
