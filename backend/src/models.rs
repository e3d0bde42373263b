use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zk_credentials::{BatchExport, BatchId, Commitment, MerkleProof, ProofArtifact, RejectReason, Salt};

#[derive(Debug, Serialize, Deserialize)]
pub struct StudentInput {
    pub student_id: String,
    /// One grade per subject, in [0, 100].
    pub subjects: Vec<u16>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchInfo {
    pub institution: String,
    pub course: String,
    pub year: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrepareRequest {
    pub batch: BatchInfo,
    pub students: Vec<StudentInput>,
}

/// What the issuer hands to each student. The salt is the student's secret.
#[derive(Debug, Serialize, Deserialize)]
pub struct PreparedStudent {
    pub student_id: String,
    pub salt: Salt,
    pub commitment: Commitment,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrepareResponse {
    pub session_id: Uuid,
    pub expires_in_secs: u64,
    pub students: Vec<PreparedStudent>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublishResponse {
    pub batch_id: BatchId,
    pub export: BatchExport,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub batch_id: BatchId,
    pub root: String,
    pub institution: String,
    pub course: String,
    pub year: u16,
    pub total_students: u64,
    pub leaf_count: u64,
    pub depth: usize,
    pub created_at: DateTime<Utc>,
    pub valid: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RevokeResponse {
    pub batch_id: BatchId,
    pub valid: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MembershipRequest {
    pub commitment: Commitment,
    pub proof: MerkleProof,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MembershipResponse {
    pub member: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProofRequest {
    pub batch_id: BatchId,
    pub student_id: String,
    pub subjects: Vec<u16>,
    pub salt: Salt,
    pub merkle_proof: MerkleProof,
    pub threshold_grade: u16,

    /// When false the proof attests membership only.
    #[serde(default = "default_require_all")]
    pub require_all: bool,
}

fn default_require_all() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub batch_id: BatchId,
    pub threshold_grade: u16,
    #[serde(default = "default_require_all")]
    pub require_all: bool,
    pub artifact: ProofArtifact,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub reason: Option<RejectReason>,
    /// False when the batch has been revoked, regardless of the proof.
    pub batch_valid: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VkQuery {
    pub depth: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ZkVkResponse {
    pub curve: String,
    pub proof_system: String,
    pub key_id: String,
    pub subjects: usize,
    pub depth: usize,
    pub vk_b64: String,
}
