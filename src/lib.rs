//! An intrusive AVL tree.
//!
//! Nodes carry their own [`Links`] and are handed to the tree as owned [`Linked::Handle`]s. The
//! tree keeps them until they are removed, replaced by a node with an equal key, or the tree is
//! cleared.
//!
//! [`Bst`] is the plain, unbalanced node store. [`AvlTree`] layers balance factors and rotations on
//! top of it, and [`AvlMap`] wraps an [`AvlTree`] in a key-value interface.

// Conventions used in comments:
// - The height of an empty subtree is 0; a leaf has height 1.
// - The balance factor of a node `x` is `b(x) = h(right(x)) - h(left(x))`.
// - A node "leans" towards the side with the greater height.
//
// The invariants of an AVL tree are:
// 1. In-order keys are strictly increasing.
// 2. Every node's balance factor is its true height difference and lies in {-1, 0, 1}.
// 3. Every child's parent link points back at the node owning it.
//
// Between the structural edit and the end of rebalancing, exactly one node on the path to the root
// may transiently reach a balance factor of -2 or 2.

use core::{cell::UnsafeCell, fmt, marker::PhantomPinned, mem, ops::Not, pin::Pin, ptr::NonNull};
use std::borrow::Borrow;

use cordyceps::Linked;

mod balance;
mod bst;
mod debug;
mod error;
mod iter;
pub mod map;
#[cfg(any(test, feature = "model"))]
pub mod model;
mod paths;

#[cfg(test)]
mod tests;

pub use bst::Bst;
pub use error::KeyError;
pub use iter::Iter;
pub use map::AvlMap;

use balance::{double_rotation_balances, single_rotation_balances};

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord;

    fn key(&self) -> &Self::Key;
}

/// An intrusive AVL tree.
///
/// Every node stores the height difference of its subtrees, and insertions and removals restore
/// the difference to at most one with rotations on the way back to the root. Lookups, insertions
/// and removals complete in _O(log(n))_ time.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>>,
{
    bst: Bst<T>,
}

pub struct Links<T> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Dir {
    Left = 0,
    Right = 1,
}

impl Dir {
    /// The change in a parent's balance factor when its subtree on this side grows by one level.
    #[inline]
    pub(crate) const fn sign(self) -> i8 {
        match self {
            Dir::Left => -1,
            Dir::Right => 1,
        }
    }
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T> {
    parent: Link<T>,
    children: [Link<T>; 2],
    balance: i8,
    _unpin: PhantomPinned,
}

pub(crate) type Link<T> = Option<NonNull<T>>;

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>>,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree { bst: Bst::new() }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.bst.is_empty()
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.bst.len()
    }

    /// Returns the underlying node store.
    pub fn as_bst(&self) -> &Bst<T> {
        &self.bst
    }

    /// Returns the number of levels in the tree.
    pub fn height(&self) -> usize {
        self.bst.height()
    }

    /// Returns `true` if every leaf of the tree is at the same depth.
    pub fn has_equal_paths(&self) -> bool {
        self.bst.has_equal_paths()
    }

    /// Returns an iterator over the elements of the tree in key order.
    pub fn iter(&self) -> Iter<'_, T> {
        self.bst.iter()
    }

    /// Returns a reference to the node corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.bst.get(key)
    }

    /// Returns a mutable reference to the node corresponding to `key`.
    ///
    /// The node's key must not be changed in a way that alters its ordering.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<Pin<&mut T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.bst.get_mut(key)
    }

    /// Returns `true` if the tree contains a node corresponding to `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.bst.contains_key(key)
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        self.bst.first()
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        self.bst.last()
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let height = self.bst.check_invariants(true);

        // The AVL height bound: h <= 1.44 * log2(n + 2).
        let bound = 1.44 * ((self.len() + 2) as f64).log2();
        assert!(
            height as f64 <= bound,
            "height {height} exceeds the AVL bound {bound:.2} for {} nodes",
            self.len()
        );
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already holds a node with an equal key, `item` takes over that node's position
    /// and the old node is returned. The shape of the tree is unchanged in that case.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        let ptr = T::into_ptr(item);

        unsafe {
            if let Some(replaced) = self.bst.insert_raw(ptr) {
                tracing::debug!(len = self.len(), "replaced node with an equal key");
                return Some(T::from_ptr(replaced));
            }

            self.rebalance_inserted(ptr);
        }

        None
    }

    /// Removes the node corresponding to `key` from the tree, returning it.
    ///
    /// Returns `None` if no node matches `key`.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.bst.get_raw(key)?;
        Some(unsafe { self.remove_at(node) })
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let root = self.bst.root?;
        unsafe {
            let first = self.bst.min_in_subtree(root);
            Some(self.remove_at(first))
        }
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let root = self.bst.root?;
        unsafe {
            let last = self.bst.max_in_subtree(root);
            Some(self.remove_at(last))
        }
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        unsafe {
            // A node with two children trades places with its in-order predecessor, which has no
            // right child. Balance factors describe positions, not nodes, so they are traded back.
            if T::links(node).as_ref().left().is_some() && T::links(node).as_ref().right().is_some()
            {
                let predecessor = self
                    .bst
                    .predecessor(node)
                    .expect("a node with a left child has a predecessor");

                self.bst.swap_nodes(node, predecessor);

                let node_balance = T::links(node).as_ref().balance();
                let predecessor_balance = T::links(predecessor).as_mut().set_balance(node_balance);
                T::links(node).as_mut().set_balance(predecessor_balance);
            }

            if let Some((parent, shrunk)) = self.bst.splice(node) {
                self.rebalance_removed(parent, shrunk);
            }

            T::from_ptr(node)
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        self.bst.clear();
    }

    // Performs a bottom-up rebalance of the tree after `node` was attached as a leaf.
    //
    // On each iteration the subtree rooted at `child` has just grown by one level.
    unsafe fn rebalance_inserted(&mut self, node: NonNull<T>) {
        let mut child = node;

        unsafe {
            while let Some(parent) = T::links(child).as_ref().parent() {
                let dir = self.bst.which_child(parent, child);
                let balance = T::links(parent).as_ref().balance() + dir.sign();
                T::links(parent).as_mut().set_balance(balance);

                match balance {
                    // The short side caught up; the height of `parent` is unchanged.
                    0 => return,

                    // `parent` grew as well.
                    -1 | 1 => child = parent,

                    // `parent` is two levels taller on the `dir` side.
                    _ => {
                        if T::links(child).as_ref().balance() == dir.sign() {
                            self.rotate(parent, !dir);
                            T::links(parent).as_mut().set_balance(0);
                            T::links(child).as_mut().set_balance(0);
                        } else {
                            self.rotate_twice(parent, !dir);
                        }

                        // Either rotation restores the height `parent` had before the insertion.
                        return;
                    }
                }
            }
        }

        tracing::trace!("insert rebalance reached the root");
    }

    // Performs a bottom-up rebalance of the tree after the `shrunk` subtree of `node` lost a level.
    unsafe fn rebalance_removed(&mut self, mut node: NonNull<T>, mut shrunk: Dir) {
        unsafe {
            loop {
                // Whatever ends up rooting this subtree occupies the same slot in the parent.
                let slot = T::links(node)
                    .as_ref()
                    .parent()
                    .map(|parent| (parent, self.bst.which_child(parent, node)));

                let balance = T::links(node).as_ref().balance() - shrunk.sign();
                T::links(node).as_mut().set_balance(balance);

                match balance {
                    // The other side was already shorter; the height of `node` is unchanged.
                    -1 | 1 => return,

                    // `node` lost a level.
                    0 => {}

                    // `node` is two levels taller on the side opposite `shrunk`.
                    _ => {
                        let tall = !shrunk;
                        let child = T::links(node)
                            .as_ref()
                            .child(tall)
                            .expect("the tall side of an unbalanced node is not empty");
                        let child_balance = T::links(child).as_ref().balance();

                        if child_balance == shrunk.sign() {
                            self.rotate_twice(node, shrunk);
                        } else {
                            self.rotate(node, shrunk);

                            let (lowered, risen) = single_rotation_balances(tall, child_balance);
                            T::links(node).as_mut().set_balance(lowered);
                            T::links(child).as_mut().set_balance(risen);

                            // A level child leaves the rotated subtree as tall as before.
                            if child_balance == 0 {
                                tracing::trace!("remove rebalance stopped after rotation");
                                return;
                            }
                        }
                    }
                }

                match slot {
                    Some((parent, dir)) => {
                        node = parent;
                        shrunk = dir;
                    }
                    None => return,
                }
            }
        }
    }

    // Performs a rotation, moving `down` down towards `dir` and raising its child on the other
    // side.
    //
    // Balance factors are not updated.
    unsafe fn rotate(&mut self, down: NonNull<T>, dir: Dir) -> NonNull<T> {
        unsafe {
            let up = T::links(down)
                .as_ref()
                .child(!dir)
                .expect("rotation requires a child to raise");

            // `across` goes from the `dir` child of `up` to the `!dir` child of `down`.
            let across = T::links(up).as_ref().child(dir);
            T::links(down).as_mut().set_child(!dir, across);
            self.bst.maybe_set_parent(across, Some(down));

            let parent = T::links(down).as_mut().set_parent(Some(up));
            T::links(up).as_mut().set_parent(parent);
            self.bst.replace_child_or_set_root(parent, down, Some(up));

            T::links(up).as_mut().set_child(dir, Some(down));

            tracing::trace!(?dir, "rotated");

            up
        }
    }

    // Performs a double rotation at `down`, whose child opposite `dir` leans towards `dir`.
    //
    // That child's inner child rises two levels to replace `down`. All three balance factors are
    // updated.
    unsafe fn rotate_twice(&mut self, down: NonNull<T>, dir: Dir) -> NonNull<T> {
        unsafe {
            let child = T::links(down)
                .as_ref()
                .child(!dir)
                .expect("double rotation requires a child");
            let middle = T::links(child)
                .as_ref()
                .child(dir)
                .expect("double rotation requires an inner grandchild");
            let middle_balance = T::links(middle).as_ref().balance();

            self.rotate(child, !dir);
            self.rotate(down, dir);

            let (left, right) = double_rotation_balances(middle_balance);
            for (side, balance) in [(Dir::Left, left), (Dir::Right, right)] {
                let lowered = T::links(middle)
                    .as_ref()
                    .child(side)
                    .expect("both lowered nodes hang below the risen node");
                T::links(lowered).as_mut().set_balance(balance);
            }
            T::links(middle).as_mut().set_balance(0);

            middle
        }
    }
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for AvlTree<T>
where
    T: TreeNode<Links<T>> + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'tree, T> IntoIterator for &'tree AvlTree<T>
where
    T: TreeNode<Links<T>>,
{
    type Item = &'tree T;
    type IntoIter = Iter<'tree, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                balance: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    #[inline]
    fn balance(&self) -> i8 {
        unsafe { (*self.inner.get()).balance }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn children(&self) -> [Link<T>; 2] {
        unsafe { (*self.inner.get()).children }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_children(&mut self, children: [Link<T>; 2]) {
        self.inner.get_mut().children = children;
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_balance(&mut self, balance: i8) -> i8 {
        mem::replace(&mut self.inner.get_mut().balance, balance)
    }

    // Detaches the links from any tree.
    #[inline]
    fn unlink(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.balance = 0;
    }
}

impl<T> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("balance", &self.balance())
            .finish()
    }
}
