//! Intrusive circular doubly-linked list.
//!
//! Every node carries its own [`Link`] at offset 0, so threading a node onto
//! a list never allocates. The list closes on a sentinel `root` that is
//! never a payload: `root.next == root` is the empty state, and every
//! mutation is an unconditional rewrite of three or four pointers.
//!
//! The sentinel is allocated once in [`PoolList::new`] and wired to itself
//! afterwards, so the `PoolList` value can be moved without invalidating
//! the links of its nodes.

use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

/// Two-word link overlaid on the first bytes of a node.
///
/// A detached link has both pointers null. `Copy` guarantees it has no
/// teardown, so the bytes can be overwritten by application data the moment
/// a node leaves its list.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Link {
    prev: *mut Link,
    next: *mut Link,
}

impl Link {
    /// A link that belongs to no list.
    #[must_use]
    pub const fn detached() -> Self {
        Self {
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    /// True when the link is not threaded onto any list.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.prev.is_null() && self.next.is_null()
    }
}

impl Default for Link {
    fn default() -> Self {
        Self::detached()
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("prev", &self.prev)
            .field("next", &self.next)
            .finish()
    }
}

/// Node types that can be threaded onto a [`PoolList`].
///
/// The `Copy` bound is what rules out node types with a destructor.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` (or `#[repr(transparent)]`) with a
/// [`Link`] as their first field, so that a `*mut Self` can be used as a
/// `*mut Link` and back.
pub unsafe trait Linked: Copy {}

// SAFETY: a link is trivially its own first field.
unsafe impl Linked for Link {}

/// Circular doubly-linked list of intrusive nodes.
///
/// The list owns the traversal order, never the memory of its nodes. It is
/// not synchronized and is `!Send`/`!Sync` by default; owners that
/// guarantee exclusivity (such as a free store) opt in explicitly.
pub struct PoolList<T: Linked> {
    root: NonNull<Link>,
    len: usize,
    _marker: PhantomData<*mut T>,
}

impl<T: Linked> PoolList<T> {
    /// Create an empty list.
    ///
    /// This is the only allocation the list ever performs: one `Link` for the
    /// sentinel, freed again on drop.
    #[must_use]
    pub fn new() -> Self {
        let root = NonNull::from(Box::leak(Box::new(Link::detached())));
        // SAFETY: `root` was just leaked from a box and is uniquely owned here.
        unsafe {
            (*root.as_ptr()).prev = root.as_ptr();
            (*root.as_ptr()).next = root.as_ptr();
        }
        Self {
            root,
            len: 0,
            _marker: PhantomData,
        }
    }

    fn root_link(&self) -> &Link {
        // SAFETY: the sentinel lives as long as `self`.
        unsafe { self.root.as_ref() }
    }

    /// True iff no node is linked.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root_link().next == self.root.as_ptr()
    }

    /// Number of linked nodes, maintained incrementally.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// First node in iteration order.
    #[inline]
    #[must_use]
    pub fn head(&self) -> Option<NonNull<T>> {
        if self.is_empty() {
            return None;
        }
        NonNull::new(self.root_link().next.cast())
    }

    /// Last node in iteration order.
    #[inline]
    #[must_use]
    pub fn tail(&self) -> Option<NonNull<T>> {
        if self.is_empty() {
            return None;
        }
        NonNull::new(self.root_link().prev.cast())
    }

    /// Insert `node` at the back; it becomes the new tail.
    ///
    /// # Safety
    ///
    /// `node` must be valid for reads and writes for as long as it stays
    /// linked, must carry a detached link, and must not be linked into any
    /// other list.
    #[inline]
    pub unsafe fn push(&mut self, node: NonNull<T>) {
        let tail = self.root_link().prev;
        // SAFETY: forwarded caller contract; `tail` is the sentinel or a live node.
        unsafe { self.link_after(tail, node.as_ptr().cast()) };
    }

    /// Insert `node` at the front; it becomes the new head.
    ///
    /// # Safety
    ///
    /// Same contract as [`PoolList::push`].
    #[inline]
    pub unsafe fn push_front(&mut self, node: NonNull<T>) {
        // SAFETY: forwarded caller contract.
        unsafe { self.link_after(self.root.as_ptr(), node.as_ptr().cast()) };
    }

    /// Splice `node` immediately after `anchor`, or after the sentinel
    /// (at the front) when `anchor` is `None`.
    ///
    /// # Safety
    ///
    /// Same contract as [`PoolList::push`], and `anchor`, if given, must be
    /// linked into this list.
    #[inline]
    pub unsafe fn insert_after(&mut self, anchor: Option<NonNull<T>>, node: NonNull<T>) {
        let prev = anchor.map_or(self.root.as_ptr(), |a| a.as_ptr().cast::<Link>());
        debug_assert!(
            // SAFETY: `anchor` is linked per the caller contract.
            unsafe { !(*prev).is_detached() },
            "anchor is not linked into a list"
        );
        // SAFETY: forwarded caller contract.
        unsafe { self.link_after(prev, node.as_ptr().cast()) };
    }

    /// Remove and return the tail.
    #[inline]
    pub fn pop(&mut self) -> Option<NonNull<T>> {
        let tail = self.tail()?;
        // SAFETY: `tail` came from this list's own links.
        unsafe { self.unlink(tail.as_ptr().cast()) };
        Some(tail)
    }

    /// Remove and return the head.
    #[inline]
    pub fn pop_front(&mut self) -> Option<NonNull<T>> {
        let head = self.head()?;
        // SAFETY: `head` came from this list's own links.
        unsafe { self.unlink(head.as_ptr().cast()) };
        Some(head)
    }

    /// Detach `node`, relinking its former neighbours. Its own link is
    /// reset to the detached state.
    ///
    /// # Safety
    ///
    /// `node` must currently be linked into *this* list, not merely into
    /// some list: the node count of each list is its own. Removing a
    /// detached node or a node of another list trips a debug assertion
    /// (the latter walks the list); in release builds both are undefined
    /// behaviour.
    #[inline]
    pub unsafe fn remove(&mut self, node: NonNull<T>) {
        let link = node.as_ptr().cast::<Link>();
        debug_assert!(
            // SAFETY: `node` is valid per the caller contract.
            unsafe { !(*link).is_detached() },
            "removing a node that is not linked"
        );
        debug_assert!(self.contains(node), "removing a node linked into another list");
        // SAFETY: `node` is linked into this list per the caller contract.
        unsafe { self.unlink(link) };
    }

    /// Move every node of `other` to the back of `self` in O(1), keeping
    /// their order. `other` is left empty.
    pub fn append(&mut self, other: &mut PoolList<T>) {
        if other.is_empty() {
            return;
        }
        let root = self.root.as_ptr();
        let other_root = other.root.as_ptr();
        // SAFETY: both sentinels are live and every pointer read here belongs
        // to one of the two lists, which `&mut` makes exclusive.
        unsafe {
            let first = (*other_root).next;
            let last = (*other_root).prev;
            let tail = (*root).prev;

            (*tail).next = first;
            (*first).prev = tail;
            (*last).next = root;
            (*root).prev = last;

            (*other_root).next = other_root;
            (*other_root).prev = other_root;
        }
        self.len += other.len;
        other.len = 0;
    }

    /// O(n) membership test.
    #[must_use]
    pub fn contains(&self, node: NonNull<T>) -> bool {
        self.iter().any(|n| n == node)
    }

    /// Iterate from head to tail.
    ///
    /// The shared borrow keeps the list from being mutated while the
    /// iterator is alive.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            cursor: self.root_link().next,
            root: self.root.as_ptr(),
            remaining: self.len,
            _marker: PhantomData,
        }
    }

    /// Walk the whole ring and verify `n.next.prev == n` and
    /// `n.prev.next == n` for every node including the sentinel, and that
    /// the ring holds exactly `len` nodes.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let root = self.root.as_ptr();
        let mut node = root;
        let mut seen = 0usize;
        // SAFETY: every pointer followed here is reachable from the sentinel;
        // the walk is bounded by `len + 1` so a corrupt ring cannot spin.
        unsafe {
            loop {
                let next = (*node).next;
                let prev = (*node).prev;
                if next.is_null() || prev.is_null() {
                    return false;
                }
                if (*next).prev != node || (*prev).next != node {
                    return false;
                }
                node = next;
                if node == root {
                    return seen == self.len;
                }
                seen += 1;
                if seen > self.len {
                    return false;
                }
            }
        }
    }

    /// # Safety
    ///
    /// `prev` is the sentinel or a node of this list; `node` is valid and
    /// detached.
    #[inline]
    unsafe fn link_after(&mut self, prev: *mut Link, node: *mut Link) {
        // SAFETY: upheld by the callers' contracts.
        unsafe {
            debug_assert!((*node).is_detached(), "node is already linked into a list");
            let next = (*prev).next;

            (*node).next = next;
            (*next).prev = node;

            (*node).prev = prev;
            (*prev).next = node;
        }
        self.len += 1;
    }

    /// # Safety
    ///
    /// `node` is a payload node of this list.
    #[inline]
    unsafe fn unlink(&mut self, node: *mut Link) {
        debug_assert_ne!(node, self.root.as_ptr(), "the sentinel cannot be removed");
        // SAFETY: upheld by the callers' contracts.
        unsafe {
            let next = (*node).next;
            let prev = (*node).prev;

            (*next).prev = prev;
            (*prev).next = next;

            (*node).prev = ptr::null_mut();
            (*node).next = ptr::null_mut();
        }
        self.len -= 1;
    }
}

impl<T: Linked> Default for PoolList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Linked> Drop for PoolList<T> {
    fn drop(&mut self) {
        // Nodes are not touched: their memory belongs to whoever carved it.
        // SAFETY: the sentinel was leaked from a box in `new` and is freed once.
        unsafe { drop(Box::from_raw(self.root.as_ptr())) };
    }
}

impl<T: Linked> fmt::Debug for PoolList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolList").field("len", &self.len).finish()
    }
}

impl<'a, T: Linked> IntoIterator for &'a PoolList<T> {
    type Item = NonNull<T>;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Head-to-tail iterator over a [`PoolList`].
pub struct Iter<'a, T: Linked> {
    cursor: *mut Link,
    root: *mut Link,
    remaining: usize,
    _marker: PhantomData<&'a PoolList<T>>,
}

impl<T: Linked> Iterator for Iter<'_, T> {
    type Item = NonNull<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == self.root || self.remaining == 0 {
            return None;
        }
        let node = self.cursor;
        // SAFETY: `node` is a live node; the list is borrowed for `'a`.
        self.cursor = unsafe { (*node).next };
        self.remaining -= 1;
        NonNull::new(node.cast())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T: Linked> ExactSizeIterator for Iter<'_, T> {}

impl<T: Linked> FusedIterator for Iter<'_, T> {}
