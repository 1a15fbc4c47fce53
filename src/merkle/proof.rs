use serde::{Deserialize, Serialize};

use super::{MerkleLeaf, index, leaf_hash, node_hash};
use crate::error::MerkleError;

/// Where a sibling sits relative to the node being hashed upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub hash: String,
    pub side: Side,
}

/// Merkle authentication path: the leaf's slot plus one sibling per level,
/// ordered from the leaf up to (but excluding) the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub steps: Vec<ProofStep>,
}

impl MerkleProof {
    /// Fold the path starting from `leaf_hash` and return the resulting root.
    pub fn compute_root(&self, leaf_hash: &str) -> String {
        self.steps
            .iter()
            .fold(leaf_hash.to_string(), |acc, step| match step.side {
                Side::Left => node_hash(&step.hash, &acc),
                Side::Right => node_hash(&acc, &step.hash),
            })
    }

    /// Check that this path is consistent with a tree of `capacity` slots:
    /// the leaf is in range, there is one step per level, and every sibling
    /// sits on the side index arithmetic puts it.
    pub fn check_shape(&self, capacity: usize) -> Result<(), MerkleError> {
        let leaves = index::leaf_count_for(capacity);
        if self.leaf_index >= leaves {
            return Err(MerkleError::MalformedProof(format!(
                "leaf index {} outside capacity {}",
                self.leaf_index, leaves
            )));
        }
        let expected = index::depth(leaves);
        if self.steps.len() != expected {
            return Err(MerkleError::MalformedProof(format!(
                "expected {} steps, got {}",
                expected,
                self.steps.len()
            )));
        }

        let mut i = index::leaf_position(leaves, self.leaf_index);
        for (level, step) in self.steps.iter().enumerate() {
            // Both exist: we are below the root for exactly `depth` levels.
            let (Some(sib), Some(par)) = (index::sibling(i), index::parent(i)) else {
                return Err(MerkleError::MalformedProof(format!(
                    "path walks past the root at level {level}"
                )));
            };
            let side = if index::is_left_child(sib) {
                Side::Left
            } else {
                Side::Right
            };
            if step.side != side {
                return Err(MerkleError::MalformedProof(format!(
                    "sibling at level {level} should be {side:?}"
                )));
            }
            i = par;
        }
        Ok(())
    }

    /// Verify that `leaf` is included under `expected_root` in a tree of
    /// `capacity` slots. A malformed path is an error; a well-formed path that
    /// leads to a different root is `Ok(false)`.
    pub fn verify<T: MerkleLeaf>(
        &self,
        capacity: usize,
        leaf: &T,
        expected_root: &str,
    ) -> Result<bool, MerkleError> {
        self.check_shape(capacity)?;
        Ok(self.compute_root(&leaf_hash(leaf)) == expected_root)
    }
}
