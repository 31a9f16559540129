use crate::{Bst, Links, TreeNode};

impl<T> Bst<T>
where
    T: TreeNode<Links<T>>,
{
    /// Returns `true` if every leaf of the tree is at the same depth.
    ///
    /// An empty tree trivially satisfies this. Nodes with a single child are not leaves; only the
    /// depths of childless nodes are compared.
    pub fn has_equal_paths(&self) -> bool {
        let Some(root) = self.root else {
            return true;
        };

        let mut leaf_depth = None;
        let mut stack = vec![(root, 0_usize)];

        while let Some((node, depth)) = stack.pop() {
            let children = unsafe { T::links(node).as_ref().children() };

            if children.iter().all(Option::is_none) {
                match leaf_depth {
                    None => leaf_depth = Some(depth),
                    Some(first) if first != depth => return false,
                    Some(_) => {}
                }
                continue;
            }

            stack.extend(children.into_iter().flatten().map(|child| (child, depth + 1)));
        }

        true
    }
}
