extern crate std;

use std::{ops::Range, prelude::v1::*};

use proptest::prelude::*;

use crate::model::{self, TestNode};

use super::*;

// Calls `f` with every permutation of `keys`.
fn for_each_permutation(keys: &mut [u32], f: &mut impl FnMut(&[u32])) {
    fn permute(keys: &mut [u32], k: usize, f: &mut impl FnMut(&[u32])) {
        if k <= 1 {
            f(keys);
            return;
        }

        permute(keys, k - 1, f);
        for i in 0..k - 1 {
            let j = if k % 2 == 0 { i } else { 0 };
            keys.swap(j, k - 1);
            permute(keys, k - 1, f);
        }
    }

    let len = keys.len();
    permute(keys, len, f);
}

fn keys_of<T: TreeNode<Links<T>, Key = u32>>(iter: Iter<'_, T>) -> Vec<u32> {
    iter.map(|node| *node.key()).collect()
}

// Returns the (key, balance) pairs of the root and its direct children.
fn top(tree: &AvlTree<TestNode>) -> (u32, i8, Option<(u32, i8)>, Option<(u32, i8)>) {
    let root = tree.as_bst().root.expect("tree is empty");
    unsafe {
        let links = TestNode::links(root).as_ref();
        let entry = |node: NonNull<TestNode>| {
            (node.as_ref().key, TestNode::links(node).as_ref().balance())
        };
        (
            root.as_ref().key,
            links.balance(),
            links.left().map(entry),
            links.right().map(entry),
        )
    }
}

fn insert_find_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        assert!(tree.insert(TestNode::new(key)).is_none());
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.get(key).expect("item not found");
        assert_eq!(node.key(), key);
    }

    let mut sorted = keys.to_vec();
    sorted.sort_unstable();
    assert_eq!(keys_of(tree.iter()), sorted);
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn permutations_find() {
    for len in 2..=7 {
        let mut keys: Vec<u32> = (0..len).collect();
        for_each_permutation(&mut keys, &mut |keys| insert_find_all(keys));
    }
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.remove(key).expect("item not found");
        assert_eq!(node.key, *key);
        assert!(tree.get(key).is_none());
        tree.assert_invariants();
    }
    assert!(tree.is_empty());

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        let node = tree.get(key).expect("item not found");
        let node = NonNull::from(node.get_ref());
        unsafe { tree.remove_at(node) };
        tree.assert_invariants();
    }
    assert!(tree.is_empty());
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn permutations_remove() {
    for len in 2..=7 {
        let mut keys: Vec<u32> = (0..len).collect();
        for_each_permutation(&mut keys, &mut |keys| insert_remove_all(keys));
    }
}

#[test]
fn ascending_inserts_rotate_left() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [10, 20, 30] {
        tree.insert(TestNode::new(key));
    }
    tree.assert_invariants();

    assert_eq!(top(&tree), (20, 0, Some((10, 0)), Some((30, 0))));
}

#[test]
fn descending_inserts_rotate_right() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [30, 20, 10] {
        tree.insert(TestNode::new(key));
    }
    tree.assert_invariants();

    assert_eq!(top(&tree), (20, 0, Some((10, 0)), Some((30, 0))));
}

#[test]
fn zig_zag_inserts_rotate_twice() {
    for keys in [[30, 10, 20], [10, 30, 20]] {
        let mut tree: AvlTree<TestNode> = AvlTree::new();
        for key in keys {
            tree.insert(TestNode::new(key));
        }
        tree.assert_invariants();

        assert_eq!(top(&tree), (20, 0, Some((10, 0)), Some((30, 0))), "{keys:?}");
    }
}

#[test]
fn remove_root_with_two_children() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [5, 3, 8, 1, 4, 7, 9, 2] {
        tree.insert(TestNode::with_value(key, key * 100));
        tree.assert_invariants();
    }

    let removed = tree.remove(&5).expect("5 is in the tree");
    assert_eq!((removed.key, removed.value), (5, 500));
    tree.assert_invariants();

    // The predecessor took the root's place and kept its own value.
    let (root, ..) = top(&tree);
    assert_eq!(root, 4);
    assert_eq!(tree.get(&4).map(|n| n.value), Some(400));
    assert_eq!(keys_of(tree.iter()), [1, 2, 3, 4, 7, 8, 9]);
}

#[test]
fn remove_node_whose_predecessor_is_its_child() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [2, 1, 3] {
        tree.insert(TestNode::new(key));
    }

    let removed = tree.remove(&2).expect("2 is in the tree");
    assert!(removed.links.parent().is_none());
    tree.assert_invariants();

    assert_eq!(top(&tree), (1, 1, None, Some((3, 0))));

    // The same swap deeper in the tree, with the predecessor's own left child moving up.
    for key in [4, 0] {
        tree.insert(TestNode::new(key));
    }
    tree.remove(&3).expect("3 is in the tree");
    tree.assert_invariants();
    assert_eq!(top(&tree), (1, 0, Some((0, 0)), Some((4, 0))));
}

#[test]
fn remove_continues_after_rotation() {
    // A Fibonacci-shaped tree where a removal on the short side triggers rotations on two levels.
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [8, 5, 11, 3, 7, 10, 12, 2, 4, 6, 9, 1] {
        tree.insert(TestNode::new(key));
    }
    tree.assert_invariants();
    assert_eq!(tree.height(), 5);

    tree.remove(&12);
    tree.assert_invariants();
    assert_eq!(tree.height(), 4);
    assert_eq!(keys_of(tree.iter()), [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
}

#[test]
fn remove_stops_at_level_sibling() {
    // Removing 1 leaves 2 with a level right child, so a single rotation keeps the height.
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [2, 1, 4, 3, 5] {
        tree.insert(TestNode::new(key));
    }

    tree.remove(&1);
    tree.assert_invariants();

    assert_eq!(top(&tree), (4, -1, Some((2, 1)), Some((5, 0))));
}

#[test]
fn duplicate_insert_overwrites() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in 0..10 {
        tree.insert(TestNode::with_value(key, 1));
    }
    let shape_before = top(&tree);

    let replaced = tree.insert(TestNode::with_value(3, 2)).expect("3 was present");
    assert_eq!((replaced.key, replaced.value), (3, 1));
    assert!(replaced.links.parent().is_none());
    assert!(replaced.links.children().iter().all(Option::is_none));

    let replaced = tree.insert(TestNode::with_value(3, 3)).expect("3 was present");
    assert_eq!(replaced.value, 2);

    tree.assert_invariants();
    assert_eq!(tree.len(), 10);
    assert_eq!(tree.get(&3).map(|n| n.value), Some(3));
    assert_eq!(top(&tree), shape_before);
}

#[test]
fn duplicate_insert_replaces_root() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [2, 1, 3] {
        tree.insert(TestNode::new(key));
    }

    tree.insert(TestNode::with_value(2, 9));
    tree.assert_invariants();
    assert_eq!(top(&tree), (2, 0, Some((1, 0)), Some((3, 0))));
    assert_eq!(tree.first().map(|n| n.key), Some(1));
}

#[test]
fn insert_then_remove_round_trip() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in (0..50).map(|k| k * 2) {
        tree.insert(TestNode::new(key));
    }

    for key in (0..50).map(|k| k * 2 + 1) {
        let before = keys_of(tree.iter());
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
        tree.remove(&key);
        tree.assert_invariants();
        assert_eq!(keys_of(tree.iter()), before);
    }
}

#[test]
fn remove_missing_is_noop() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    assert!(tree.remove(&1).is_none());

    for key in [1, 2, 3] {
        tree.insert(TestNode::new(key));
    }
    assert!(tree.remove(&4).is_none());
    assert_eq!(tree.len(), 3);
    tree.assert_invariants();
}

#[test]
fn pop_first_and_last() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in 0..20 {
        tree.insert(TestNode::new(key));
    }

    for expected in 0..10 {
        assert_eq!(tree.pop_first().map(|n| n.key), Some(expected));
        tree.assert_invariants();
        assert_eq!(tree.pop_last().map(|n| n.key), Some(19 - expected));
        tree.assert_invariants();
    }

    assert!(tree.pop_first().is_none());
    assert!(tree.pop_last().is_none());
}

#[test]
fn height_stays_logarithmic() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in 0..1023 {
        tree.insert(TestNode::new(key));
    }
    tree.assert_invariants();

    // Ascending inserts produce a perfect tree at every power of two minus one.
    assert_eq!(tree.height(), 10);
    assert!(tree.has_equal_paths());
}

#[test]
fn clear_empties_tree() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in 0..100 {
        tree.insert(TestNode::new(key));
    }

    tree.clear();
    tree.assert_invariants();
    assert!(tree.is_empty());
    assert_eq!(tree.height(), 0);
    assert!(tree.iter().next().is_none());

    tree.insert(TestNode::new(7));
    assert_eq!(keys_of(tree.iter()), [7]);
}

#[test]
fn bst_keeps_insertion_shape() {
    let mut bst: Bst<TestNode> = Bst::new();
    for key in 0..8 {
        bst.insert(TestNode::new(key));
        bst.assert_invariants();
    }

    assert_eq!(bst.height(), 8);
    assert_eq!(keys_of(bst.iter()), (0..8).collect::<Vec<_>>());
}

fn bst_insert_remove_all(keys: &[u32]) {
    let mut bst: Bst<TestNode> = Bst::new();
    for &key in keys {
        bst.insert(TestNode::new(key));
    }

    for key in keys {
        assert_eq!(bst.remove(key).map(|n| n.key), Some(*key));
        bst.assert_invariants();
    }
    assert!(bst.is_empty());
}

#[test]
fn bst_permutations_remove() {
    for len in 1..=6 {
        let mut keys: Vec<u32> = (0..len).collect();
        for_each_permutation(&mut keys, &mut |keys| bst_insert_remove_all(keys));
    }
}

#[test]
fn predecessor_walks_in_order() {
    let mut bst: Bst<TestNode> = Bst::new();
    for key in [50, 30, 70, 20, 40, 60, 80, 35, 45, 65] {
        bst.insert(TestNode::new(key));
    }

    let mut cur = bst.get(&80).map(|n| NonNull::from(n.get_ref()));
    let mut seen = Vec::new();
    while let Some(node) = cur {
        seen.push(unsafe { node.as_ref().key });
        cur = unsafe { bst.predecessor(node) };
    }

    assert_eq!(seen, [80, 70, 65, 60, 50, 45, 40, 35, 30, 20]);
}

fn swap_and_check(keys: &[u32], a: u32, b: u32) {
    let mut bst: Bst<TestNode> = Bst::new();
    for &key in keys {
        bst.insert(TestNode::new(key));
    }

    let ptr = |key: u32| NonNull::from(bst.get(&key).expect("key present").get_ref());
    let (pa, pb) = (ptr(a), ptr(b));
    unsafe { bst.swap_nodes(pa, pb) };

    // The nodes traded places, so the in-order sequence has `a` and `b` exchanged.
    let expected: Vec<u32> = {
        let mut sorted = keys.to_vec();
        sorted.sort_unstable();
        sorted
            .into_iter()
            .map(|k| if k == a { b } else if k == b { a } else { k })
            .collect()
    };
    assert_eq!(keys_of(bst.iter()), expected, "swap {a} <-> {b}");

    // Swapping back restores a valid tree.
    unsafe { bst.swap_nodes(pa, pb) };
    bst.assert_invariants();
}

#[test]
fn swap_nodes_parent_and_child() {
    let keys = [4, 2, 6, 1, 3, 5, 7];
    swap_and_check(&keys, 4, 2);
    swap_and_check(&keys, 2, 4);
    swap_and_check(&keys, 6, 7);
    swap_and_check(&keys, 2, 1);
}

#[test]
fn swap_nodes_siblings_and_distant() {
    let keys = [4, 2, 6, 1, 3, 5, 7];
    swap_and_check(&keys, 2, 6);
    swap_and_check(&keys, 1, 7);
    swap_and_check(&keys, 4, 3);
    swap_and_check(&keys, 5, 5);
}

#[test]
fn drop_releases_nodes() {
    use std::rc::Rc;

    struct Tracked {
        links: Links<Tracked>,
        key: u32,
        _alive: Rc<()>,
    }

    unsafe impl Linked<Links<Tracked>> for Tracked {
        type Handle = Box<Tracked>;

        fn into_ptr(r: Self::Handle) -> NonNull<Self> {
            NonNull::from(Box::leak(r))
        }

        unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
            unsafe { Box::from_raw(ptr.as_ptr()) }
        }

        unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<Tracked>> {
            let ptr = ptr.as_ptr();
            unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*ptr).links)) }
        }
    }

    impl TreeNode<Links<Tracked>> for Tracked {
        type Key = u32;

        fn key(&self) -> &u32 {
            &self.key
        }
    }

    let alive = Rc::new(());
    {
        let mut tree: AvlTree<Tracked> = AvlTree::new();
        for key in 0..64 {
            tree.insert(Box::new(Tracked {
                links: Links::new(),
                key,
                _alive: Rc::clone(&alive),
            }));
        }
        assert_eq!(Rc::strong_count(&alive), 65);
    }
    assert_eq!(Rc::strong_count(&alive), 1);
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }

    #[test]
    fn bst_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_bst_equivalence(ops);
    }

    #[test]
    fn churn_small_key_range(ops in proptest::collection::vec((any::<bool>(), 0u32..64), 0..3000)) {
        let mut btree = std::collections::BTreeMap::new();
        let mut map: AvlMap<u32, u32> = AvlMap::new();

        for (i, (insert, key)) in ops.into_iter().enumerate() {
            if insert {
                prop_assert_eq!(btree.insert(key, i as u32), map.insert(key, i as u32));
            } else {
                prop_assert_eq!(btree.remove(&key), map.remove(&key));
            }

            map.assert_invariants();
            prop_assert!(btree.iter().eq(map.iter()));
        }
    }

    #[test]
    fn height_bound(keys in proptest::collection::vec(0u32..10_000, 0..2000)) {
        let map: AvlMap<u32, ()> = keys.iter().map(|&k| (k, ())).collect();
        map.assert_invariants();

        let n = map.len() as f64;
        prop_assert!(map.height() as f64 <= 1.44 * (n + 2.0).log2());
    }
}
