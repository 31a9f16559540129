use core::iter::FusedIterator;

use crate::{Bst, Dir, Link, Links, TreeNode};

enum CameFrom {
    Parent,
    LeftChild,
    Here,
    RightChild,
}

/// An in-order iterator over the elements of a [`Bst`] or [`AvlTree`](crate::AvlTree).
pub struct Iter<'tree, T: TreeNode<Links<T>>> {
    tree: &'tree Bst<T>,

    front_cur: Link<T>,
    front_from: CameFrom,

    len: usize,
}

impl<'tree, T: TreeNode<Links<T>>> Iter<'tree, T> {
    pub(crate) fn new(tree: &'tree Bst<T>) -> Self {
        Iter {
            tree,

            front_cur: tree.root,
            front_from: CameFrom::Parent,
            len: tree.len(),
        }
    }
}

impl<'tree, T: TreeNode<Links<T>>> Iterator for Iter<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        let mut cur = self.front_cur?;

        loop {
            match self.front_from {
                CameFrom::Parent => {
                    // Upon entering a new subtree, find the minimum element.
                    cur = unsafe { self.tree.min_in_subtree(cur) };

                    // Once the minimum is found, its (empty) left subtree has been exhausted.
                    self.front_from = CameFrom::LeftChild;
                }

                CameFrom::LeftChild => {
                    // The left subtree has been exhausted, so this node is up next. Save off the
                    // iterator state and return it.
                    self.front_cur = Some(cur);
                    self.front_from = CameFrom::Here;
                    self.len -= 1;

                    return Some(unsafe { cur.as_ref() });
                }

                CameFrom::Here => {
                    // The current node was just yielded. If the right subtree is not empty, go
                    // there; otherwise the whole subtree rooted here is exhausted.
                    match unsafe { T::links(cur).as_ref().right() } {
                        Some(right) => {
                            self.front_from = CameFrom::Parent;
                            cur = right;
                        }
                        None => self.front_from = CameFrom::RightChild,
                    }
                }

                CameFrom::RightChild => {
                    // The subtree rooted at `cur` is exhausted; ascend one level. The root can't
                    // be exhausted while elements remain.
                    let parent = unsafe { T::links(cur).as_ref().parent() }
                        .expect("iterator ran out of nodes before its length");

                    self.front_from = match unsafe { self.tree.which_child(parent, cur) } {
                        Dir::Left => CameFrom::LeftChild,
                        Dir::Right => CameFrom::RightChild,
                    };

                    cur = parent;
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<T: TreeNode<Links<T>>> ExactSizeIterator for Iter<'_, T> {}

impl<T: TreeNode<Links<T>>> FusedIterator for Iter<'_, T> {}
