pub mod index;
pub mod proof;
pub mod tree;

pub use proof::{MerkleProof, ProofStep, Side};
pub use tree::{FixedMerkleTree, Slot};

use crate::hashing::sha256_hex;

/// Preimage hashed for an empty slot so the tree is always complete.
pub const EMPTY_LEAF: &str = " ";

/// Anything with a stable string identity can be stored in a tree.
pub trait MerkleLeaf {
    fn leaf_id(&self) -> String;
}

impl MerkleLeaf for String {
    fn leaf_id(&self) -> String {
        self.clone()
    }
}

pub fn leaf_hash<T: MerkleLeaf + ?Sized>(leaf: &T) -> String {
    sha256_hex(&leaf.leaf_id())
}

pub fn empty_leaf_hash() -> String {
    sha256_hex(EMPTY_LEAF)
}

/// Hash of an internal node: `H(left + "," + right)` over hex child hashes.
pub fn node_hash(left: &str, right: &str) -> String {
    sha256_hex(&format!("{left},{right}"))
}
