//! Binary Merkle accumulator over record commitments.
//!
//! - Leaves are commitments and are NOT re-hashed.
//! - Each level pairs adjacent nodes with the tree's [`PairingRule`].
//! - A level with an odd number of nodes duplicates its last node.
//! - Depth is `ceil(log2(n))`; a single leaf is its own root.

use crate::error::{ZkError, ZkResult};
use crate::pairing::{PairingRule, Position, SortedPairing};
use crate::types::{fr_from_hex, fr_hex, fr_to_hex, Commitment};
use ark_bn254::Fr;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::debug;

/// One step of an inclusion proof, ordered leaf to root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    #[serde(with = "fr_hex")]
    pub sibling: Fr,
    pub position: Position,
}

/// Inclusion proof for one leaf. Only valid against the root it was generated for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerkleProof {
    pub steps: Vec<ProofStep>,
}

impl MerkleProof {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn siblings(&self) -> Vec<Fr> {
        self.steps.iter().map(|s| s.sibling).collect()
    }

    /// Path bits for the circuit: `true` when the sibling sits on the left.
    pub fn path_bits(&self) -> Vec<bool> {
        self.steps.iter().map(|s| s.position == Position::Left).collect()
    }
}

/// Walk a proof from the leaf up and return the root it implies.
pub fn compute_root<P: PairingRule>(leaf: &Commitment, proof: &MerkleProof) -> Fr {
    proof
        .steps
        .iter()
        .fold(leaf.0, |node, step| P::combine_step(&node, &step.sibling, step.position))
}

/// Recompute the root from a leaf and proof and compare. Needs no tree instance.
pub fn verify<P: PairingRule>(leaf: &Commitment, proof: &MerkleProof, root: &Fr) -> bool {
    compute_root::<P>(leaf, proof) == *root
}

/// [`verify`] under the default sorted pairing rule.
pub fn verify_sorted(leaf: &Commitment, proof: &MerkleProof, root: &Fr) -> bool {
    verify::<SortedPairing>(leaf, proof, root)
}

#[derive(Clone, Debug)]
pub struct MerkleTree<P: PairingRule = SortedPairing> {
    /// `levels[0]` holds the leaves, the last level holds only the root.
    levels: Vec<Vec<Fr>>,
    _rule: PhantomData<P>,
}

impl<P: PairingRule> MerkleTree<P> {
    /// Build a tree from an ordered list of commitments.
    pub fn build(leaves: Vec<Commitment>) -> ZkResult<Self> {
        if leaves.is_empty() {
            return Err(ZkError::EmptyAccumulator);
        }

        let mut levels = vec![leaves.into_iter().map(|c| c.0).collect::<Vec<Fr>>()];

        while levels[levels.len() - 1].len() > 1 {
            let current = &levels[levels.len() - 1];
            let mut next = Vec::with_capacity(current.len().div_ceil(2));

            for pair in current.chunks(2) {
                let right = pair.get(1).unwrap_or(&pair[0]);
                next.push(P::combine(&pair[0], right));
            }

            levels.push(next);
        }

        let tree = Self { levels, _rule: PhantomData };
        debug!(leaves = tree.len(), depth = tree.depth(), rule = P::NAME, "built merkle tree");
        Ok(tree)
    }

    /// Rebuild from `existing ++ new_leaves`.
    pub fn extend(&self, new_leaves: impl IntoIterator<Item = Commitment>) -> ZkResult<Self> {
        let mut leaves = self.leaves();
        leaves.extend(new_leaves);
        Self::build(leaves)
    }

    pub fn root(&self) -> Fr {
        self.levels[self.levels.len() - 1][0]
    }

    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn leaves(&self) -> Vec<Commitment> {
        self.levels[0].iter().copied().map(Commitment).collect()
    }

    /// All levels, leaves first.
    pub fn levels(&self) -> &[Vec<Fr>] {
        &self.levels
    }

    /// Index of the first occurrence of `target`.
    pub fn leaf_index(&self, target: &Commitment) -> Option<usize> {
        self.levels[0].iter().position(|x| *x == target.0)
    }

    pub fn contains(&self, target: &Commitment) -> bool {
        self.leaf_index(target).is_some()
    }

    /// Inclusion proof for `target`. Its length equals the tree depth.
    pub fn proof(&self, target: &Commitment) -> ZkResult<MerkleProof> {
        let index = self.leaf_index(target).ok_or(ZkError::LeafNotFound)?;
        self.proof_at(index)
    }

    pub fn proof_at(&self, leaf_index: usize) -> ZkResult<MerkleProof> {
        if leaf_index >= self.len() {
            return Err(ZkError::LeafNotFound);
        }

        let mut steps = Vec::with_capacity(self.depth());
        let mut index = leaf_index;

        for level in &self.levels[..self.depth()] {
            let (sibling_index, position) = if index % 2 == 0 {
                (index + 1, Position::Right)
            } else {
                (index - 1, Position::Left)
            };
            // Past the end of an odd level the node is paired with itself.
            let sibling = level.get(sibling_index).copied().unwrap_or(level[index]);
            steps.push(ProofStep { sibling, position });
            index /= 2;
        }

        Ok(MerkleProof { steps })
    }

    pub fn export(&self) -> TreeExport {
        TreeExport {
            rule: P::NAME.to_string(),
            root: fr_to_hex(&self.root()),
            leaves: self.leaves(),
        }
    }

    /// Rebuild a tree from an export, failing loudly if the stored root disagrees.
    pub fn import(export: &TreeExport) -> ZkResult<Self> {
        if export.rule != P::NAME {
            return Err(ZkError::Serialization(format!(
                "export uses pairing rule {:?}, expected {:?}",
                export.rule,
                P::NAME
            )));
        }

        // A malformed root is bad input, not a mismatch.
        let stored = fr_from_hex(&export.root)?;
        let tree = Self::build(export.leaves.clone())?;
        if tree.root() != stored {
            return Err(ZkError::RootMismatch { stored: fr_to_hex(&stored), recomputed: fr_to_hex(&tree.root()) });
        }
        Ok(tree)
    }
}

/// Serialized tree: enough to reconstruct and re-verify it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeExport {
    pub rule: String,
    pub root: String,
    pub leaves: Vec<Commitment>,
}

impl TreeExport {
    pub fn to_json(&self) -> ZkResult<String> {
        serde_json::to_string(self).map_err(|e| ZkError::Serialization(e.to_string()))
    }

    pub fn from_json(s: &str) -> ZkResult<Self> {
        serde_json::from_str(s).map_err(|e| ZkError::Serialization(e.to_string()))
    }
}
