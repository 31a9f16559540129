use core::{cmp::Ordering, fmt, pin::Pin, ptr::NonNull};
use std::borrow::Borrow;

use crate::{Dir, Iter, Link, Links, TreeNode};

/// An intrusive, unbalanced binary search tree.
///
/// This is the node store underneath [`AvlTree`](crate::AvlTree). Used on its own, its shape is
/// entirely determined by the order of insertions and removals; the balance factors stored in
/// [`Links`] are left untouched.
pub struct Bst<T>
where
    T: TreeNode<Links<T>>,
{
    pub(crate) root: Link<T>,
    len: usize,
}

// Where a key lives in the tree, or where it would be attached.
pub(crate) enum Slot<T> {
    Occupied(NonNull<T>),
    Vacant { parent: Link<T>, dir: Dir },
}

impl<T> Bst<T>
where
    T: TreeNode<Links<T>>,
{
    /// Returns a new empty tree.
    pub const fn new() -> Bst<T> {
        Bst { root: None, len: 0 }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns an iterator over the elements of the tree in key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Returns the number of levels in the tree.
    ///
    /// An empty tree has height 0 and a single node has height 1.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut level: Vec<NonNull<T>> = self.root.into_iter().collect();

        while !level.is_empty() {
            height += 1;
            level = level
                .into_iter()
                .flat_map(|node| unsafe { T::links(node).as_ref().children() })
                .flatten()
                .collect();
        }

        height
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        self.check_invariants(false);
    }

    // Checks ordering, parent links and the element count, and balance factors if `balanced`.
    //
    // Returns the height of the tree.
    pub(crate) fn check_invariants(&self, balanced: bool) -> usize {
        let Some(root) = self.root else {
            assert_eq!(self.len, 0, "empty tree has a nonzero length");
            return 0;
        };

        unsafe {
            assert_eq!(
                T::links(root).as_ref().parent(),
                None,
                "root has a parent pointer"
            );

            let (height, count) = self.check_subtree(root, None, None, balanced);
            assert_eq!(count, self.len, "length does not match the number of nodes");
            height
        }
    }

    // Returns the height and the number of nodes of the subtree rooted at `node`.
    unsafe fn check_subtree(
        &self,
        node: NonNull<T>,
        lower: Option<&T::Key>,
        upper: Option<&T::Key>,
        balanced: bool,
    ) -> (usize, usize) {
        unsafe {
            let key = node.as_ref().key();

            // Ensure the key sits strictly between its bounds.
            if let Some(lower) = lower {
                assert!(lower < key, "keys out of order");
            }
            if let Some(upper) = upper {
                assert!(key < upper, "keys out of order");
            }

            let mut heights = [0; 2];
            let mut count = 1;

            for dir in [Dir::Left, Dir::Right] {
                let Some(child) = T::links(node).as_ref().child(dir) else {
                    continue;
                };

                // Ensure child's parent link points to this node.
                let parent = T::links(child)
                    .as_ref()
                    .parent()
                    .expect("child parent pointer not set");
                assert_eq!(node, parent, "child parent pointer is stale");

                let (lower, upper) = match dir {
                    Dir::Left => (lower, Some(key)),
                    Dir::Right => (Some(key), upper),
                };
                let (height, child_count) = self.check_subtree(child, lower, upper, balanced);
                heights[dir as usize] = height;
                count += child_count;
            }

            if balanced {
                let actual =
                    heights[Dir::Right as usize] as isize - heights[Dir::Left as usize] as isize;
                let recorded = T::links(node).as_ref().balance();

                // Ensure the stored balance factor is accurate and within bounds.
                assert_eq!(recorded as isize, actual, "stale balance factor");
                assert!((-1..=1).contains(&recorded), "unbalanced node");
            }

            (1 + heights[0].max(heights[1]), count)
        }
    }

    /// Returns a reference to the node corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns a mutable reference to the node corresponding to `key`.
    ///
    /// The node's key must not be changed in a way that alters its ordering.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<Pin<&mut T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_mut())) }
    }

    /// Returns `true` if the tree contains a node corresponding to `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    pub(crate) fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self.search(key) {
            Slot::Occupied(node) => Some(node),
            Slot::Vacant { .. } => None,
        }
    }

    // Descends the tree, looking for `key` or the empty slot it would be attached at.
    pub(crate) fn search<Q>(&self, key: &Q) -> Slot<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut parent = None;
        let mut dir = Dir::Left;
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                dir = match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => Dir::Left,
                    Ordering::Equal => return Slot::Occupied(cur),
                    Ordering::Greater => Dir::Right,
                };

                parent = Some(cur);
                opt_cur = T::links(cur).as_ref().child(dir);
            }
        }

        Slot::Vacant { parent, dir }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        let root = self.root?;
        unsafe {
            let first = self.min_in_subtree(root);
            Some(Pin::new_unchecked(first.as_ref()))
        }
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        let root = self.root?;
        unsafe {
            let last = self.max_in_subtree(root);
            Some(Pin::new_unchecked(last.as_ref()))
        }
    }

    /// Inserts an item into the tree without rebalancing.
    ///
    /// If the tree already holds a node with an equal key, `item` takes over that node's position
    /// and the old node is returned.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        let ptr = T::into_ptr(item);
        unsafe { self.insert_raw(ptr).map(|replaced| T::from_ptr(replaced)) }
    }

    /// Removes the node corresponding to `key` from the tree without rebalancing, returning it.
    ///
    /// A node with two children is replaced by its in-order predecessor.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;

        unsafe {
            if T::links(node).as_ref().left().is_some() && T::links(node).as_ref().right().is_some()
            {
                let predecessor = self
                    .predecessor(node)
                    .expect("a node with a left child has a predecessor");
                self.swap_nodes(node, predecessor);
            }

            self.splice(node);
            Some(T::from_ptr(node))
        }
    }

    // Attaches `ptr` at the slot matching its key, or in place of the node with an equal key.
    //
    // Returns the replaced node, if any. A newly attached node is a leaf with balance 0.
    pub(crate) unsafe fn insert_raw(&mut self, ptr: NonNull<T>) -> Link<T> {
        unsafe {
            match self.search(ptr.as_ref().key()) {
                Slot::Occupied(old) => {
                    self.replace_node(old, ptr);
                    Some(old)
                }
                Slot::Vacant { parent, dir } => {
                    T::links(ptr).as_mut().unlink();
                    T::links(ptr).as_mut().set_parent(parent);
                    self.set_child_or_root(parent.map(|p| (p, dir)), Some(ptr));
                    self.len += 1;
                    None
                }
            }
        }
    }

    // Puts `new` in the position of `old`, including its balance factor, and detaches `old`.
    unsafe fn replace_node(&mut self, old: NonNull<T>, new: NonNull<T>) {
        unsafe {
            let parent = T::links(old).as_ref().parent();
            let children = T::links(old).as_ref().children();
            let balance = T::links(old).as_ref().balance();

            let new_links = T::links(new).as_mut();
            new_links.set_parent(parent);
            new_links.set_children(children);
            new_links.set_balance(balance);

            self.replace_child_or_set_root(parent, old, Some(new));
            for child in children.into_iter().flatten() {
                T::links(child).as_mut().set_parent(Some(new));
            }

            T::links(old).as_mut().unlink();
        }
    }

    // Returns the in-order predecessor of `node`.
    pub(crate) unsafe fn predecessor(&self, node: NonNull<T>) -> Link<T> {
        unsafe {
            if let Some(left) = T::links(node).as_ref().left() {
                return Some(self.max_in_subtree(left));
            }

            // Ascend until arriving from a right child.
            let mut cur = node;
            while let Some(parent) = T::links(cur).as_ref().parent() {
                if self.which_child(parent, cur) == Dir::Right {
                    return Some(parent);
                }
                cur = parent;
            }

            None
        }
    }

    // Exchanges the positions of `a` and `b` in the tree.
    //
    // Each node takes over the other's parent, children and root status; balance factors stay with
    // the nodes. The nodes may be adjacent.
    pub(crate) unsafe fn swap_nodes(&mut self, a: NonNull<T>, b: NonNull<T>) {
        if a == b {
            return;
        }

        unsafe {
            let a_parent = T::links(a).as_ref().parent();
            let b_parent = T::links(b).as_ref().parent();
            let a_slot = a_parent.map(|p| (p, self.which_child(p, a)));
            let b_slot = b_parent.map(|p| (p, self.which_child(p, b)));
            let a_children = T::links(a).as_ref().children();
            let b_children = T::links(b).as_ref().children();

            // A link between the two nodes keeps connecting them, in the opposite direction.
            let swap = move |link: Link<T>| match link {
                Some(n) if n == a => Some(b),
                Some(n) if n == b => Some(a),
                other => other,
            };

            T::links(a).as_mut().set_parent(swap(b_parent));
            T::links(a).as_mut().set_children(b_children.map(swap));
            T::links(b).as_mut().set_parent(swap(a_parent));
            T::links(b).as_mut().set_children(a_children.map(swap));

            if a_parent != Some(b) {
                self.set_child_or_root(a_slot, Some(b));
            }
            if b_parent != Some(a) {
                self.set_child_or_root(b_slot, Some(a));
            }

            for (node, children) in [(a, b_children), (b, a_children)] {
                for child in children.map(swap).into_iter().flatten() {
                    T::links(child).as_mut().set_parent(Some(node));
                }
            }
        }

        tracing::trace!("swapped node positions");
    }

    // Detaches `node`, which has at most one child, elevating that child into its place.
    //
    // Returns the former parent of `node` and the side of it that lost a level.
    pub(crate) unsafe fn splice(&mut self, node: NonNull<T>) -> Option<(NonNull<T>, Dir)> {
        unsafe {
            let parent = T::links(node).as_ref().parent();
            let child = match (T::links(node).as_ref().left(), T::links(node).as_ref().right()) {
                (Some(_), Some(_)) => unreachable!("cannot splice a node with two children"),
                (child, None) | (None, child) => child,
            };
            let slot = parent.map(|p| (p, self.which_child(p, node)));

            self.replace_child_or_set_root(parent, node, child);
            self.maybe_set_parent(child, parent);
            T::links(node).as_mut().unlink();
            self.len -= 1;

            slot
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let cur = self.min_in_subtree(cur);
                let parent = T::links(cur).as_ref().parent();
                let right = T::links(cur).as_ref().right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                T::links(cur).as_mut().unlink();
                drop(T::from_ptr(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    // Support methods ========================================================

    #[inline]
    pub(crate) unsafe fn min_in_subtree(&self, root: NonNull<T>) -> NonNull<T> {
        let mut cur = root;
        while let Some(left) = unsafe { T::links(cur).as_ref().left() } {
            cur = left;
        }
        cur
    }

    #[inline]
    pub(crate) unsafe fn max_in_subtree(&self, root: NonNull<T>) -> NonNull<T> {
        let mut cur = root;
        while let Some(right) = unsafe { T::links(cur).as_ref().right() } {
            cur = right;
        }
        cur
    }

    pub(crate) unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { T::links(node).as_mut().set_parent(parent) };
    }

    // Points the `dir` child of the slot's parent at `child`, or the root if there is no slot.
    //
    // `child`'s parent pointer is not updated.
    unsafe fn set_child_or_root(&mut self, slot: Option<(NonNull<T>, Dir)>, child: Link<T>) {
        match slot {
            Some((parent, dir)) => unsafe {
                T::links(parent).as_mut().set_child(dir, child);
            },
            None => self.root = child,
        }
    }

    #[inline]
    pub(crate) unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that `old_child` is a child node of `parent`.
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        unsafe {
            let dir = self.which_child(parent, old_child);
            debug_assert_eq!(
                T::links(parent).as_ref().child(dir),
                Some(old_child),
                "`old_child` must be a child of `parent`"
            );
            T::links(parent).as_mut().set_child(dir, new_child);
        }
    }

    pub(crate) unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        if unsafe { T::links(parent).as_ref().left() } == Some(child) {
            Dir::Left
        } else {
            Dir::Right
        }
    }
}

impl<T> Default for Bst<T>
where
    T: TreeNode<Links<T>>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Bst<T>
where
    T: TreeNode<Links<T>>,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> fmt::Debug for Bst<T>
where
    T: TreeNode<Links<T>> + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'tree, T> IntoIterator for &'tree Bst<T>
where
    T: TreeNode<Links<T>>,
{
    type Item = &'tree T;
    type IntoIter = Iter<'tree, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
