//! Balance factors after rotations.

use crate::Dir;

/// Returns the balance factors of the nodes that end up as the left and right children of the
/// middle node of a double rotation, given the middle node's balance before the rotation.
///
/// The middle node itself always ends up level. The table is the same for both orientations and
/// for both insertion and removal: whatever the middle node held on its left moves under the new
/// left child, and likewise on the right.
pub(crate) const fn double_rotation_balances(middle: i8) -> (i8, i8) {
    match middle {
        -1 => (0, 1),
        0 => (0, 0),
        1 => (-1, 0),
        _ => panic!("balance factor out of range"),
    }
}

/// Returns the balance factors of the lowered and the risen node after a single rotation that
/// repairs a removal, given the side the lowered node was tall on and the risen node's balance
/// before the rotation.
pub(crate) const fn single_rotation_balances(tall: Dir, child: i8) -> (i8, i8) {
    if child == 0 {
        // The risen node's inner subtree is as tall as its outer one, so the lowered node keeps
        // leaning towards it and the risen node leans back.
        (tall.sign(), -tall.sign())
    } else {
        (0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // (middle before, left child after, right child after)
    const DOUBLE: [(i8, i8, i8); 3] = [(-1, 0, 1), (0, 0, 0), (1, -1, 0)];

    #[test]
    fn double_rotation_table() {
        for (middle, left, right) in DOUBLE {
            assert_eq!(double_rotation_balances(middle), (left, right), "middle = {middle}");
        }
    }

    // An insertion into the left-right grandchild of `g` produces `g`, its left child `p`, and
    // `p`'s right child `c`. After the rotations `p` is `c`'s left child and `g` its right child.
    #[test]
    fn insert_left_right() {
        // (c before, p after, g after)
        let cases = [(-1, 0, 1), (0, 0, 0), (1, -1, 0)];
        for (c, p, g) in cases {
            assert_eq!(double_rotation_balances(c), (p, g), "c = {c}");
        }
    }

    // Mirror image: `p` is `g`'s right child and `c` is `p`'s left child, so `g` ends up on the
    // left.
    #[test]
    fn insert_right_left() {
        // (c before, p after, g after)
        let cases = [(1, 0, -1), (0, 0, 0), (-1, 1, 0)];
        for (c, p, g) in cases {
            let (left, right) = double_rotation_balances(c);
            assert_eq!((right, left), (p, g), "c = {c}");
        }
    }

    // A removal on the left of `n` whose right child `r` leans left through `rl`. After the
    // rotations `n` is `rl`'s left child and `r` its right child.
    #[test]
    fn remove_right_left() {
        // (rl before, n after, r after)
        let cases = [(0, 0, 0), (1, -1, 0), (-1, 0, 1)];
        for (rl, n, r) in cases {
            assert_eq!(double_rotation_balances(rl), (n, r), "rl = {rl}");
        }
    }

    // Mirror image: a removal on the right of `n` whose left child `l` leans right through `lr`.
    #[test]
    fn remove_left_right() {
        // (lr before, n after, l after)
        let cases = [(0, 0, 0), (-1, 1, 0), (1, 0, -1)];
        for (lr, n, l) in cases {
            let (left, right) = double_rotation_balances(lr);
            assert_eq!((right, left), (n, l), "lr = {lr}");
        }
    }

    #[test]
    fn single_rotation_with_level_child() {
        assert_eq!(single_rotation_balances(Dir::Right, 0), (1, -1));
        assert_eq!(single_rotation_balances(Dir::Left, 0), (-1, 1));
    }

    #[test]
    fn single_rotation_with_leaning_child() {
        assert_eq!(single_rotation_balances(Dir::Right, 1), (0, 0));
        assert_eq!(single_rotation_balances(Dir::Left, -1), (0, 0));
    }

    #[test]
    #[should_panic]
    fn double_rotation_rejects_unbalanced_middle() {
        double_rotation_balances(2);
    }
}
