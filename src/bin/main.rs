use std::ptr::NonNull;

use cordyceps::Linked;
use cordyceps_avl::{AvlMap, AvlTree, Links, TreeNode};

#[derive(Debug)]
#[repr(C)]
struct TestNode {
    links: Links<TestNode>,
    key: u32,
}

impl TestNode {
    fn new(key: u32) -> Box<TestNode> {
        Box::new(TestNode {
            links: Links::new(),
            key,
        })
    }
}

unsafe impl Linked<Links<TestNode>> for TestNode {
    type Handle = Box<TestNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::new(Box::into_raw(r)).unwrap()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<TestNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<TestNode>> for TestNode {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

fn main() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in [5, 3, 8, 1, 4, 7, 9, 2] {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
        println!("{:?}", tree.iter().map(|node| node.key).collect::<Vec<_>>());
    }

    let mut graph = String::new();
    tree.dotgraph("before", &mut graph).unwrap();
    println!("{graph}");

    let five = tree.remove(&5).unwrap().key;
    assert_eq!(five, 5);
    tree.assert_invariants();

    let mut graph = String::new();
    tree.dotgraph("after", &mut graph).unwrap();
    println!("{graph}");

    let first = tree.pop_first().unwrap().key;
    assert_eq!(first, 1);
    tree.assert_invariants();
    println!("equal paths: {}", tree.has_equal_paths());

    let mut map: AvlMap<&str, u32> = AvlMap::new();
    map.insert("a", 1);
    map.insert("b", 2);
    map.insert("a", 3);
    println!("{map:?}");
    println!("{:?}", map.try_get("c"));

    drop(tree);
}
