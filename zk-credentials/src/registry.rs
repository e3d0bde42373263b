//! Interface to the batch registry ledger.
//!
//! The ledger stores one root per batch and answers membership queries. Membership is
//! checked with the same standalone verifier the issuer uses, so both sides hash leaves
//! and pairs identically.

use crate::merkle::{verify, MerkleProof};
use crate::pairing::{PairingRule, SortedPairing};
use crate::types::{fr_hex, Commitment};
use ark_bn254::Fr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Opaque sequential id assigned by the registry.
pub type BatchId = u64;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMetadata {
    pub institution: String,
    pub course: String,
    pub year: u16,
    pub total_students: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    #[serde(with = "fr_hex")]
    pub root: Fr,
    pub metadata: BatchMetadata,
    pub created_at: DateTime<Utc>,
    /// Cleared on revocation; the only mutable field.
    pub valid: bool,
}

pub trait Registry {
    fn issue_batch(&mut self, root: Fr, metadata: BatchMetadata) -> BatchId;

    fn get_batch(&self, id: BatchId) -> Option<Batch>;

    /// Returns `false` if the batch does not exist.
    fn revoke_batch(&mut self, id: BatchId) -> bool;

    /// True iff the batch exists, is still valid and `proof` links `leaf` to its root.
    fn verify_membership(&self, id: BatchId, leaf: &Commitment, proof: &MerkleProof) -> bool {
        self.verify_membership_with::<SortedPairing>(id, leaf, proof)
    }

    fn verify_membership_with<P: PairingRule>(&self, id: BatchId, leaf: &Commitment, proof: &MerkleProof) -> bool {
        self.get_batch(id)
            .is_some_and(|batch| batch.valid && verify::<P>(leaf, proof, &batch.root))
    }
}

/// Registry held in memory. Ids start at 1 and increase by one per batch.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    batches: Vec<Batch>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

impl Registry for InMemoryRegistry {
    fn issue_batch(&mut self, root: Fr, metadata: BatchMetadata) -> BatchId {
        let id = self.batches.len() as BatchId + 1;
        // Keep timestamps monotonic even if the wall clock steps back.
        let now = Utc::now();
        let created_at = self.batches.last().map_or(now, |b| b.created_at.max(now));

        self.batches.push(Batch { id, root, metadata, created_at, valid: true });
        info!(batch_id = id, "issued batch");
        id
    }

    fn get_batch(&self, id: BatchId) -> Option<Batch> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.batches.get(index).cloned()
    }

    fn revoke_batch(&mut self, id: BatchId) -> bool {
        let Some(index) = usize::try_from(id).ok().and_then(|i| i.checked_sub(1)) else {
            return false;
        };
        match self.batches.get_mut(index) {
            Some(batch) => {
                batch.valid = false;
                info!(batch_id = id, "revoked batch");
                true
            }
            None => false,
        }
    }
}
