//! Index arithmetic for an array-packed complete binary tree.
//!
//! For `n` leaves (a power of two) the tree occupies `2n - 1` slots. The root
//! lives at index 0, the children of node `p` are `2p + 1` (left, always odd)
//! and `2p + 2` (right, always even), and the leaves fill the second half of
//! the array starting at `n - 1`.

/// Number of leaves backing a tree asked to hold `capacity` items:
/// the smallest power of two that is at least `capacity` (and at least 1).
pub fn leaf_count_for(capacity: usize) -> usize {
    capacity.max(1).next_power_of_two()
}

/// Total number of nodes for `leaves` leaves.
pub fn tree_size(leaves: usize) -> usize {
    2 * leaves - 1
}

/// Array index of the first leaf. Equal to `tree_size(leaves) / 2`.
pub fn leaf_offset(leaves: usize) -> usize {
    leaves - 1
}

/// Array index of the leaf holding slot `slot`.
pub fn leaf_position(leaves: usize, slot: usize) -> usize {
    leaf_offset(leaves) + slot
}

pub fn is_left_child(i: usize) -> bool {
    i % 2 == 1
}

/// Parent of node `i`, or `None` for the root.
///
/// A right child `i` (even) has parent `(i - 2) / 2`; a left child (odd) has
/// parent `(i - 1) / 2`. Integer division makes both `(i - 1) / 2`.
pub fn parent(i: usize) -> Option<usize> {
    if i == 0 { None } else { Some((i - 1) / 2) }
}

/// Sibling of node `i`, or `None` for the root.
pub fn sibling(i: usize) -> Option<usize> {
    match i {
        0 => None,
        i if is_left_child(i) => Some(i + 1),
        i => Some(i - 1),
    }
}

pub fn left_child(p: usize) -> usize {
    2 * p + 1
}

pub fn right_child(p: usize) -> usize {
    2 * p + 2
}

/// Number of edges between a leaf and the root.
pub fn depth(leaves: usize) -> usize {
    leaves.trailing_zeros() as usize
}
