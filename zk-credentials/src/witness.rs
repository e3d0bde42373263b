//! Host-side witness construction and native evaluation of the threshold policy.
//!
//! `evaluate` MUST compute exactly what the circuit computes; the proof service relies on
//! it to refuse witnesses that could only ever prove `is_valid = 0`.

use crate::circuit::{CircuitShape, ThresholdCircuit};
use crate::commitment::{commit, student_id_to_field};
use crate::error::{ZkError, ZkResult};
use crate::merkle::{verify, MerkleProof};
use crate::pairing::PairingRule;
use crate::types::{PublicInputs, Record};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Everything only the credential holder knows.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrivateInputs {
    pub record: Record,
    pub merkle_proof: MerkleProof,
}

/// Native result of running the policy over a witness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Evaluation {
    pub merkle_valid: bool,
    pub all_passed: bool,
    pub gate_policy: bool,
    pub is_valid: bool,
}

pub fn evaluate<P: PairingRule>(private: &PrivateInputs, public: &PublicInputs) -> Evaluation {
    let leaf = commit(&private.record);
    let merkle_valid = verify::<P>(&leaf, &private.merkle_proof, &public.root);
    let all_passed = private
        .record
        .subjects()
        .iter()
        .all(|&g| g >= public.threshold_grade);
    let gate_policy = !public.require_all || all_passed;

    Evaluation {
        merkle_valid,
        all_passed,
        gate_policy,
        is_valid: merkle_valid && gate_policy,
    }
}

/// Check inputs against a circuit shape and assemble the circuit.
pub fn build_circuit<P: PairingRule>(
    shape: CircuitShape,
    private: &PrivateInputs,
    public: &PublicInputs,
) -> ZkResult<ThresholdCircuit<P>> {
    let subjects = private.record.subjects();
    if subjects.len() != shape.subjects {
        return Err(ZkError::SubjectCountMismatch { expected: shape.subjects, got: subjects.len() });
    }
    if private.merkle_proof.len() != shape.depth {
        return Err(ZkError::DepthMismatch { expected: shape.depth, got: private.merkle_proof.len() });
    }

    Ok(ThresholdCircuit {
        shape,
        student_id: student_id_to_field(private.record.student_id()),
        salt: private.record.salt().to_field(),
        subjects: subjects.to_vec(),
        siblings: private.merkle_proof.siblings(),
        path_bits: private.merkle_proof.path_bits(),
        root: public.root,
        threshold: public.threshold_grade,
        require_all: public.require_all,
        _rule: PhantomData,
    })
}
