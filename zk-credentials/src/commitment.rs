//! Commitment engine: binds a student's identity, grades and salt into one field element.

use crate::constants::poseidon_config;
use crate::types::{Commitment, Record};
use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::PoseidonSponge;
use ark_crypto_primitives::sponge::CryptographicSponge;
use ark_ff::PrimeField;
use sha2::{Digest, Sha256};

/// Native Poseidon over a sequence of field elements, squeezing one element.
///
/// This MUST match the sponge usage in the circuit.
pub fn poseidon_hash(inputs: &[Fr]) -> Fr {
    let mut sponge = PoseidonSponge::<Fr>::new(poseidon_config());
    sponge.absorb(&inputs.to_vec());
    sponge.squeeze_field_elements::<Fr>(1)[0]
}

/// Map an arbitrary-length identifier into the scalar field.
pub fn student_id_to_field(student_id: &str) -> Fr {
    let digest = Sha256::digest(student_id.as_bytes());
    Fr::from_be_bytes_mod_order(&digest)
}

/// The field elements absorbed for a record, in absorption order:
/// `id, salt, n, subjects[0], ..., subjects[n-1]`.
///
/// The sponge does no length padding, so `n` is absorbed explicitly; otherwise a trailing
/// zero grade could be appended without changing the digest.
pub fn commitment_preimage(record: &Record) -> Vec<Fr> {
    let mut preimage = Vec::with_capacity(3 + record.subjects().len());
    preimage.push(student_id_to_field(record.student_id()));
    preimage.push(record.salt().to_field());
    preimage.push(Fr::from(record.subjects().len() as u64));
    preimage.extend(record.subjects().iter().map(|&g| Fr::from(g as u64)));
    preimage
}

/// Commit to a validated record. Pure and deterministic.
pub fn commit(record: &Record) -> Commitment {
    Commitment(poseidon_hash(&commitment_preimage(record)))
}
