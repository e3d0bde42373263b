//! R1CS circuit for proving a threshold policy over committed grades.
//!
//! What this circuit proves (for one student):
//! 1) Every private grade lies in [0, 100].
//! 2) `passed[i] = grade[i] >= threshold` and `all_passed = AND(passed)`.
//! 3) `gate = require_all ? all_passed : true`.
//! 4) `commitment = Poseidon(id, salt, n, grades...)` sits under the public `root`, recomputed
//!    with the tree's pairing rule.
//! 5) `is_valid = merkle_valid AND gate` is exposed as the last public input.
//!
//! Privacy: id, salt, grades and the Merkle path are witnesses. Only the root, the policy
//! and the validity bit are public.

use crate::constants::{GRADE_BITS, MAX_GRADE};
use crate::gadgets::{constrain_bits, geq_small, leq_const, poseidon_hash_var};
use crate::pairing::{PairingRule, SortedPairing};
use ark_bn254::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Fixed dimensions of a circuit instance. Groth16 keys are tied to one shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CircuitShape {
    pub subjects: usize,
    pub depth: usize,
}

impl CircuitShape {
    pub fn new(subjects: usize, depth: usize) -> Self {
        Self { subjects: subjects.max(1), depth }
    }
}

/// Circuit proving `is_valid` for one committed record.
#[derive(Clone, Debug)]
pub struct ThresholdCircuit<P: PairingRule = SortedPairing> {
    pub shape: CircuitShape,

    /// Private inputs.
    pub student_id: Fr,
    pub salt: Fr,
    pub subjects: Vec<u8>,
    pub siblings: Vec<Fr>,
    /// `true` when the sibling at that level sits on the left.
    pub path_bits: Vec<bool>,

    /// Public inputs.
    pub root: Fr,
    pub threshold: u8,
    pub require_all: bool,

    pub _rule: PhantomData<P>,
}

impl<P: PairingRule> ThresholdCircuit<P> {
    /// A well-formed but meaningless instance, used to derive keys for a shape.
    pub fn blank(shape: CircuitShape) -> Self {
        Self {
            shape,
            student_id: Fr::from(0u64),
            salt: Fr::from(0u64),
            subjects: vec![0; shape.subjects],
            siblings: vec![Fr::from(0u64); shape.depth],
            path_bits: vec![false; shape.depth],
            root: Fr::from(0u64),
            threshold: 0,
            require_all: false,
            _rule: PhantomData,
        }
    }
}

impl<P: PairingRule> ConstraintSynthesizer<Fr> for ThresholdCircuit<P> {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        // --- Public inputs ---
        // IMPORTANT: ordering MUST match `PublicInputs::to_field_elements`.
        // We use: root, threshold, require_all, is_valid.
        let root = FpVar::<Fr>::new_input(cs.clone(), || Ok(self.root))?;
        let threshold = FpVar::<Fr>::new_input(cs.clone(), || Ok(Fr::from(self.threshold as u64)))?;
        let require_all = Boolean::new_input(cs.clone(), || Ok(self.require_all))?;

        if self.subjects.len() != self.shape.subjects
            || self.siblings.len() != self.shape.depth
            || self.path_bits.len() != self.shape.depth
        {
            return Err(SynthesisError::Unsatisfiable);
        }

        // The comparison gadget assumes both operands fit in GRADE_BITS.
        constrain_bits(&threshold, GRADE_BITS)?;

        // --- Grades and policy ---
        let student_id = FpVar::<Fr>::new_witness(cs.clone(), || Ok(self.student_id))?;
        let salt = FpVar::<Fr>::new_witness(cs.clone(), || Ok(self.salt))?;

        let mut preimage = Vec::with_capacity(3 + self.shape.subjects);
        preimage.push(student_id);
        preimage.push(salt);
        preimage.push(FpVar::<Fr>::constant(Fr::from(self.shape.subjects as u64)));

        let mut passed = Vec::with_capacity(self.shape.subjects);
        for grade in self.subjects {
            let grade = FpVar::<Fr>::new_witness(cs.clone(), || Ok(Fr::from(grade as u64)))?;

            // Range check: grade in [0, 100].
            let bits = constrain_bits(&grade, GRADE_BITS)?;
            leq_const(&bits, MAX_GRADE as u64)?.enforce_equal(&Boolean::constant(true))?;

            passed.push(geq_small(&grade, &threshold, GRADE_BITS)?);
            preimage.push(grade);
        }

        let all_passed = Boolean::kary_and(&passed)?;
        let gate_policy = Boolean::kary_or(&[!require_all, all_passed])?;

        // --- Commitment and membership ---
        let mut node = poseidon_hash_var(cs.clone(), &preimage)?;
        for (sibling, is_left) in self.siblings.into_iter().zip(self.path_bits) {
            let sibling = FpVar::<Fr>::new_witness(cs.clone(), || Ok(sibling))?;
            let is_left = Boolean::new_witness(cs.clone(), || Ok(is_left))?;
            node = P::combine_var(&node, &sibling, &is_left)?;
        }
        let merkle_valid = node.is_eq(&root)?;

        // --- Output ---
        let is_valid = Boolean::kary_and(&[merkle_valid, gate_policy])?;
        let public_is_valid = Boolean::new_input(cs.clone(), || is_valid.value())?;
        public_is_valid.enforce_equal(&is_valid)?;

        Ok(())
    }
}
