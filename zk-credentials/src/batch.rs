//! Canonical backup/restore format for an issued batch.

use crate::commitment::commit;
use crate::error::{ZkError, ZkResult};
use crate::merkle::{compute_root, MerkleProof, MerkleTree, TreeExport};
use crate::pairing::PairingRule;
use crate::registry::BatchMetadata;
use crate::types::{fr_to_hex, Commitment, Record};
use serde::{Deserialize, Serialize};

/// Per-student certificate: the public half of a credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub student_id: String,
    pub commitment: Commitment,
    pub proof: MerkleProof,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchExport {
    #[serde(flatten)]
    pub tree: TreeExport,
    pub certificates: Vec<Certificate>,
    pub metadata: BatchMetadata,
}

impl BatchExport {
    /// Collect one certificate per record. Every record must already be a leaf of `tree`.
    pub fn assemble<P: PairingRule>(
        tree: &MerkleTree<P>,
        records: &[Record],
        metadata: BatchMetadata,
    ) -> ZkResult<Self> {
        let certificates = records
            .iter()
            .map(|record| {
                let commitment = commit(record);
                Ok(Certificate {
                    student_id: record.student_id().to_string(),
                    commitment,
                    proof: tree.proof(&commitment)?,
                })
            })
            .collect::<ZkResult<Vec<_>>>()?;

        Ok(Self { tree: tree.export(), certificates, metadata })
    }

    /// Rebuild the tree and re-check every certificate against it.
    pub fn restore<P: PairingRule>(&self) -> ZkResult<MerkleTree<P>> {
        let tree = MerkleTree::<P>::import(&self.tree)?;
        let root = tree.root();

        for cert in &self.certificates {
            if !tree.contains(&cert.commitment) {
                return Err(ZkError::LeafNotFound);
            }
            let implied = compute_root::<P>(&cert.commitment, &cert.proof);
            if implied != root {
                return Err(ZkError::RootMismatch {
                    stored: fr_to_hex(&root),
                    recomputed: fr_to_hex(&implied),
                });
            }
        }

        Ok(tree)
    }

    pub fn to_json(&self) -> ZkResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ZkError::Serialization(e.to_string()))
    }

    pub fn from_json(s: &str) -> ZkResult<Self> {
        serde_json::from_str(s).map_err(|e| ZkError::Serialization(e.to_string()))
    }
}
