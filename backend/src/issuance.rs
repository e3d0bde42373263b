//! Turns validated request DTOs into records, trees and proof witnesses.
//!
//! Nothing here touches the database or the network, and raw grades never leave memory.

use crate::errors::ApiError;
use crate::models::{BatchInfo, ProofRequest, StudentInput};
use crate::sessions::PreparedBatch;
use ark_bn254::Fr;
use rand::{CryptoRng, RngCore};
use std::collections::HashSet;
use tracing::info;
use zk_credentials::{
    commit, BatchExport, BatchMetadata, MerkleTree, PrivateInputs, PublicInputs, Record, Salt, SortedPairing,
    ZkError,
};

/// Depth of an accumulator over `leaves` leaves.
pub fn depth_for(leaves: usize) -> usize {
    leaves.next_power_of_two().trailing_zeros() as usize
}

/// Salt and validate a cohort.
///
/// Every student needs exactly `subjects` grades and a unique id; the cohort must fit in a
/// tree of at most `max_depth` levels.
pub fn prepare<R: RngCore + CryptoRng>(
    info: BatchInfo,
    students: Vec<StudentInput>,
    subjects: usize,
    max_depth: usize,
    rng: &mut R,
) -> Result<PreparedBatch, ApiError> {
    if students.is_empty() {
        return Err(ZkError::EmptyAccumulator.into());
    }
    if depth_for(students.len()) > max_depth {
        return Err(ApiError::BadRequest(format!(
            "{} students do not fit a tree of depth {max_depth}",
            students.len()
        )));
    }

    let mut seen = HashSet::with_capacity(students.len());
    let mut records = Vec::with_capacity(students.len());
    for student in students {
        if student.subjects.len() != subjects {
            return Err(ZkError::SubjectCountMismatch { expected: subjects, got: student.subjects.len() }.into());
        }
        if !seen.insert(student.student_id.clone()) {
            return Err(ApiError::BadRequest(format!("duplicate student id {:?}", student.student_id)));
        }
        records.push(Record::new(student.student_id, &student.subjects, Salt::random(rng))?);
    }

    let metadata = BatchMetadata {
        institution: info.institution,
        course: info.course,
        year: info.year,
        total_students: records.len() as u64,
    };

    Ok(PreparedBatch { records, metadata })
}

/// Build the accumulator in record order and assemble the batch backup.
pub fn publish(prepared: &PreparedBatch) -> Result<(MerkleTree, BatchExport), ApiError> {
    let tree = MerkleTree::<SortedPairing>::build(prepared.records.iter().map(commit).collect())?;
    let export = BatchExport::assemble(&tree, &prepared.records, prepared.metadata.clone())?;

    info!(
        leaves = tree.len(),
        depth = tree.depth(),
        institution = %prepared.metadata.institution,
        "assembled batch"
    );
    Ok((tree, export))
}

/// Validate a proof request against the root of its batch.
pub fn proof_inputs(req: ProofRequest, root: Fr) -> Result<(PrivateInputs, PublicInputs), ApiError> {
    let record = Record::new(req.student_id, &req.subjects, req.salt)?;
    let public = PublicInputs::new(root, req.threshold_grade, req.require_all)?;
    Ok((PrivateInputs { record, merkle_proof: req.merkle_proof }, public))
}
