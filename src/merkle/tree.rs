use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

use super::index;
use super::{MerkleLeaf, MerkleProof, ProofStep, Side, empty_leaf_hash, leaf_hash, node_hash};
use crate::error::MerkleError;

/// One leaf position of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<T> {
    Empty,
    Occupied(T),
}

impl<T> Slot<T> {
    pub fn as_option(&self) -> Option<&T> {
        match self {
            Slot::Empty => None,
            Slot::Occupied(leaf) => Some(leaf),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }
}

/// Fixed-capacity, array-packed Merkle tree. Slots are filled left to right
/// and never reordered; every insert recomputes all hashes.
#[derive(Debug, Clone)]
pub struct FixedMerkleTree<T> {
    slots: Vec<Slot<T>>,
    hashes: Vec<String>,
    // leaf hash -> array index, occupied leaves only
    lookup: HashMap<String, usize>,
}

impl<T: MerkleLeaf> FixedMerkleTree<T> {
    /// Create an empty tree; `capacity` is rounded up to a power of two.
    pub fn new(capacity: usize) -> Self {
        let leaves = index::leaf_count_for(capacity);
        let mut tree = Self {
            slots: (0..leaves).map(|_| Slot::Empty).collect(),
            hashes: vec![String::new(); index::tree_size(leaves)],
            lookup: HashMap::new(),
        };
        tree.build();
        tree
    }

    /// Rebuild a tree from its encoded slots and check it against `root`.
    pub fn from_slots(
        capacity: usize,
        transactions: Vec<Option<T>>,
        root: &str,
    ) -> Result<Self, MerkleError> {
        if !capacity.is_power_of_two() {
            return Err(MerkleError::InvalidEncoding(format!(
                "capacity {capacity} is not a power of two"
            )));
        }
        if transactions.len() != capacity {
            return Err(MerkleError::InvalidEncoding(format!(
                "expected {} slots, got {}",
                capacity,
                transactions.len()
            )));
        }
        if let Some(gap) = transactions.iter().position(Option::is_none) {
            if transactions[gap..].iter().any(Option::is_some) {
                return Err(MerkleError::InvalidEncoding(format!(
                    "occupied slot after empty slot {gap}"
                )));
            }
        }

        let mut tree = Self {
            slots: transactions
                .into_iter()
                .map(|tx| tx.map_or(Slot::Empty, Slot::Occupied))
                .collect(),
            hashes: vec![String::new(); index::tree_size(capacity)],
            lookup: HashMap::new(),
        };
        tree.build();

        if tree.root() != root {
            return Err(MerkleError::InvalidEncoding(format!(
                "root mismatch: encoded {root}, rebuilt {}",
                tree.root()
            )));
        }
        Ok(tree)
    }

    fn build(&mut self) {
        let leaves = self.slots.len();
        let offset = index::leaf_offset(leaves);
        self.lookup.clear();

        for (slot, entry) in self.slots.iter().enumerate() {
            let i = offset + slot;
            self.hashes[i] = match entry {
                Slot::Empty => empty_leaf_hash(),
                Slot::Occupied(leaf) => {
                    let h = leaf_hash(leaf);
                    self.lookup.insert(h.clone(), i);
                    h
                }
            };
        }

        for p in (0..offset).rev() {
            self.hashes[p] = node_hash(
                &self.hashes[index::left_child(p)],
                &self.hashes[index::right_child(p)],
            );
        }
    }

    /// Number of slots, always a power of two.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    /// True when no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.slots[0].is_empty()
    }

    /// True once the last slot is occupied.
    pub fn is_full(&self) -> bool {
        self.slots.last().is_some_and(|s| !s.is_empty())
    }

    /// Place `leaf` in the first empty slot and rebuild. No-op when full.
    pub fn insert(&mut self, leaf: T) {
        let Some(pos) = self.slots.iter().position(Slot::is_empty) else {
            debug!("merkle tree full ({} slots), ignoring insert", self.capacity());
            return;
        };
        self.slots[pos] = Slot::Occupied(leaf);
        self.build();
    }

    /// Membership by leaf hash.
    pub fn has(&self, leaf: &T) -> bool {
        self.lookup.contains_key(&leaf_hash(leaf))
    }

    /// Leaf in `slot`, if that slot is occupied.
    pub fn transaction(&self, slot: usize) -> Option<&T> {
        self.slots.get(slot).and_then(Slot::as_option)
    }

    /// Occupied slots in insertion order.
    pub fn transactions(&self) -> impl Iterator<Item = &T> + '_ {
        self.slots.iter().filter_map(Slot::as_option)
    }

    /// Every slot, empty ones included.
    pub fn slots(&self) -> &[Slot<T>] {
        &self.slots
    }

    /// Merkle root (node 0).
    pub fn root(&self) -> &str {
        &self.hashes[0]
    }

    pub fn generate_proof(&self, leaf: &T) -> Result<MerkleProof, MerkleError> {
        let mut i = *self
            .lookup
            .get(&leaf_hash(leaf))
            .ok_or_else(|| MerkleError::NotFound(leaf.leaf_id()))?;
        let leaf_index = i - index::leaf_offset(self.capacity());

        let mut steps = Vec::with_capacity(index::depth(self.capacity()));
        while let (Some(sib), Some(par)) = (index::sibling(i), index::parent(i)) {
            let side = if index::is_left_child(sib) {
                Side::Left
            } else {
                Side::Right
            };
            steps.push(ProofStep {
                hash: self.hashes[sib].clone(),
                side,
            });
            i = par;
        }

        Ok(MerkleProof { leaf_index, steps })
    }

    /// Verify `proof` for `leaf` against `expected_root`, using this tree's
    /// capacity to validate the shape of the path.
    pub fn verify_proof(
        &self,
        leaf: &T,
        proof: &MerkleProof,
        expected_root: &str,
    ) -> Result<bool, MerkleError> {
        proof.verify(self.capacity(), leaf, expected_root)
    }

    /// One row per level with hashes truncated to 6 characters.
    pub fn levels(&self) -> Vec<String> {
        let mut rows = Vec::new();
        let mut start = 0;
        let mut width = 1;
        while start < self.hashes.len() {
            let row: Vec<&str> = self.hashes[start..start + width]
                .iter()
                .map(|h| &h[..6])
                .collect();
            rows.push(row.join(" "));
            start += width;
            width *= 2;
        }
        rows
    }
}

#[derive(Serialize)]
struct TreeEncodingRef<'a, T> {
    capacity: usize,
    transactions: Vec<Option<&'a T>>,
    root: &'a str,
}

#[derive(Deserialize)]
struct TreeEncoding<T> {
    capacity: usize,
    transactions: Vec<Option<T>>,
    root: String,
}

impl<T: MerkleLeaf + Serialize> Serialize for FixedMerkleTree<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TreeEncodingRef {
            capacity: self.capacity(),
            transactions: self.slots.iter().map(Slot::as_option).collect(),
            root: self.root(),
        }
        .serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for FixedMerkleTree<T>
where
    T: MerkleLeaf + Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let enc = TreeEncoding::<T>::deserialize(deserializer)?;
        FixedMerkleTree::from_slots(enc.capacity, enc.transactions, &enc.root)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::sha256_hex;

    fn tx(s: &str) -> String {
        s.to_string()
    }

    fn filled(capacity: usize, count: usize) -> FixedMerkleTree<String> {
        let mut tree = FixedMerkleTree::new(capacity);
        for i in 0..count {
            tree.insert(format!("tx{i}"));
        }
        tree
    }

    #[test]
    fn capacity_four_fills_then_ignores_inserts() {
        let mut tree = FixedMerkleTree::new(4);
        tree.insert(tx("tx1"));
        tree.insert(tx("tx2"));
        assert!(!tree.is_full());

        tree.insert(tx("tx3"));
        tree.insert(tx("tx4"));
        assert!(tree.is_full());

        let root = tree.root().to_string();
        tree.insert(tx("tx5"));
        assert!(tree.is_full());
        assert_eq!(tree.root(), root);
        assert!(!tree.has(&tx("tx5")));
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn capacity_rounds_up() {
        assert_eq!(FixedMerkleTree::<String>::new(3).capacity(), 4);
        assert_eq!(FixedMerkleTree::<String>::new(0).capacity(), 1);
        assert_eq!(FixedMerkleTree::<String>::new(8).capacity(), 8);
    }

    #[test]
    fn single_slot_root_is_leaf_hash() {
        let mut tree = FixedMerkleTree::new(1);
        assert_eq!(tree.root(), empty_leaf_hash());
        tree.insert(tx("only"));
        assert_eq!(tree.root(), sha256_hex("only"));
        assert!(tree.is_full());
    }

    #[test]
    fn root_matches_manual_construction() {
        let tree = filled(4, 3);
        let l0 = sha256_hex("tx0");
        let l1 = sha256_hex("tx1");
        let l2 = sha256_hex("tx2");
        let l3 = sha256_hex(" ");
        let left = sha256_hex(&format!("{l0},{l1}"));
        let right = sha256_hex(&format!("{l2},{l3}"));
        assert_eq!(tree.root(), sha256_hex(&format!("{left},{right}")));
    }

    #[test]
    fn root_is_deterministic_across_instances() {
        let a = filled(8, 5);
        let b = filled(8, 5);
        assert_eq!(a.root(), b.root());

        let mut c = FixedMerkleTree::new(8);
        for i in (0..5).rev() {
            c.insert(format!("tx{i}"));
        }
        assert_ne!(a.root(), c.root());
    }

    #[test]
    fn preserves_insertion_order() {
        let tree = filled(8, 3);
        let all: Vec<&String> = tree.transactions().collect();
        assert_eq!(all, vec!["tx0", "tx1", "tx2"]);
        assert_eq!(tree.transaction(1).map(String::as_str), Some("tx1"));
        assert_eq!(tree.transaction(3), None);
        assert_eq!(tree.transaction(99), None);
    }

    #[test]
    fn proofs_verify_for_every_leaf() {
        for capacity in [1, 2, 4, 8, 16, 32] {
            for count in 1..=capacity {
                let tree = filled(capacity, count);
                for i in 0..count {
                    let leaf = format!("tx{i}");
                    let proof = tree.generate_proof(&leaf).unwrap();
                    assert_eq!(proof.leaf_index, i);
                    assert_eq!(proof.steps.len(), index::depth(capacity));
                    assert!(tree.verify_proof(&leaf, &proof, tree.root()).unwrap());
                }
            }
        }
    }

    #[test]
    fn absent_leaf_has_no_proof() {
        let tree = filled(4, 2);
        assert!(!tree.has(&tx("missing")));
        assert_eq!(
            tree.generate_proof(&tx("missing")),
            Err(MerkleError::NotFound("missing".into()))
        );
    }

    #[test]
    fn tampered_sibling_fails_verification() {
        let tree = filled(8, 6);
        let leaf = tx("tx3");
        let proof = tree.generate_proof(&leaf).unwrap();

        for level in 0..proof.steps.len() {
            let mut bad = proof.clone();
            let mut bytes = hex::decode(&bad.steps[level].hash).unwrap();
            bytes[0] ^= 0x01;
            bad.steps[level].hash = hex::encode(bytes);
            assert_eq!(tree.verify_proof(&leaf, &bad, tree.root()), Ok(false));
        }
    }

    #[test]
    fn proof_for_other_leaf_or_root_fails() {
        let tree = filled(8, 4);
        let proof = tree.generate_proof(&tx("tx1")).unwrap();
        assert_eq!(tree.verify_proof(&tx("tx2"), &proof, tree.root()), Ok(false));

        let other = filled(8, 5);
        assert_eq!(tree.verify_proof(&tx("tx1"), &proof, other.root()), Ok(false));
    }

    #[test]
    fn malformed_proofs_are_errors() {
        let tree = filled(8, 4);
        let leaf = tx("tx2");
        let proof = tree.generate_proof(&leaf).unwrap();

        let mut out_of_range = proof.clone();
        out_of_range.leaf_index = 8;
        assert!(matches!(
            tree.verify_proof(&leaf, &out_of_range, tree.root()),
            Err(MerkleError::MalformedProof(_))
        ));

        let mut short = proof.clone();
        short.steps.pop();
        assert!(matches!(
            tree.verify_proof(&leaf, &short, tree.root()),
            Err(MerkleError::MalformedProof(_))
        ));

        let mut flipped = proof.clone();
        flipped.steps[0].side = match flipped.steps[0].side {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        };
        assert!(matches!(
            tree.verify_proof(&leaf, &flipped, tree.root()),
            Err(MerkleError::MalformedProof(_))
        ));

        // Same path checked against a tree of a different size.
        assert!(matches!(
            proof.verify(16, &leaf, tree.root()),
            Err(MerkleError::MalformedProof(_))
        ));
    }

    #[test]
    fn encoding_restores_tree() {
        let tree = filled(8, 3);
        let json = serde_json::to_string(&tree).unwrap();
        let back: FixedMerkleTree<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.root(), tree.root());
        assert!(back.has(&tx("tx2")));
        assert_eq!(back.len(), 3);
    }

    #[test]
    fn encoding_rejects_gaps_and_bad_roots() {
        let tree = filled(4, 2);
        let root = tree.root().to_string();

        let gap = vec![Some(tx("tx0")), None, Some(tx("tx1")), None];
        assert!(matches!(
            FixedMerkleTree::from_slots(4, gap, &root),
            Err(MerkleError::InvalidEncoding(_))
        ));

        let slots = vec![Some(tx("tx0")), Some(tx("tx1")), None, None];
        assert!(FixedMerkleTree::from_slots(4, slots.clone(), &root).is_ok());
        assert!(FixedMerkleTree::from_slots(4, slots.clone(), "bogus").is_err());
        assert!(FixedMerkleTree::from_slots(3, slots[..3].to_vec(), &root).is_err());
    }

    #[test]
    fn encoding_rejects_oversized_capacity() {
        for capacity in [0, 3, usize::MAX, (1usize << 63) + 1] {
            assert!(matches!(
                FixedMerkleTree::<String>::from_slots(capacity, vec![], ""),
                Err(MerkleError::InvalidEncoding(_))
            ));
        }
        // A power of two too large to allocate fails on the slot count.
        assert!(matches!(
            FixedMerkleTree::<String>::from_slots(1usize << 63, vec![], ""),
            Err(MerkleError::InvalidEncoding(_))
        ));

        let json = format!(
            r#"{{"capacity":{},"transactions":[],"root":""}}"#,
            u64::MAX
        );
        assert!(serde_json::from_str::<FixedMerkleTree<String>>(&json).is_err());
    }

    #[test]
    fn levels_render_one_row_per_depth() {
        let rows = filled(4, 1).levels();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].split(' ').count(), 4);
    }
}
