//! Crate-wide constants used by the ZK circuit and host-side orchestration.

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::{find_poseidon_ark_and_mds, PoseidonConfig};
use ark_ff::PrimeField;
use std::sync::OnceLock;

/// Highest grade a subject may carry. Grades live in `[0, MAX_GRADE]`.
pub const MAX_GRADE: u8 = 100;

/// Grades (and the public threshold) are decomposed into this many bits in-circuit.
pub const GRADE_BITS: usize = 8;

/// Identifier of the threshold circuit. Bumped whenever the constraint layout changes,
/// which invalidates every persisted key set.
pub const CIRCUIT_ID: &str = "threshold-credential";
pub const CIRCUIT_VERSION: u32 = 1;

/// Number of public inputs: root, threshold, require_all, is_valid.
pub const NUM_PUBLIC_INPUTS: usize = 4;

/// Default number of subjects per student record.
pub const DEFAULT_SUBJECTS: usize = 5;

/// Default tree depth supported by a key set (cohorts up to 1024 students).
pub const DEFAULT_TREE_DEPTH: usize = 10;

// Poseidon sponge configuration.
//
// A width-3 sponge (rate=2, capacity=1) absorbs pairs of field elements, which is exactly
// the shape of a Merkle node.
pub const POSEIDON_RATE: usize = 2;
pub const POSEIDON_CAPACITY: usize = 1;

// Typical Poseidon parameters for width=3.
pub const POSEIDON_FULL_ROUNDS: usize = 8;
pub const POSEIDON_PARTIAL_ROUNDS: usize = 57;

/// Poseidon S-box exponent (alpha).
pub const POSEIDON_ALPHA: u64 = 5;

/// Poseidon parameters for BN254::Fr, shared by the native hasher and the in-circuit gadget.
///
/// Derivation runs the Grain LFSR once per process; every later call is a cheap borrow.
pub fn poseidon_config() -> &'static PoseidonConfig<Fr> {
    static CONFIG: OnceLock<PoseidonConfig<Fr>> = OnceLock::new();

    CONFIG.get_or_init(|| {
        let prime_bits = Fr::MODULUS_BIT_SIZE as u64;

        let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
            prime_bits,
            POSEIDON_RATE,
            POSEIDON_FULL_ROUNDS as u64,
            POSEIDON_PARTIAL_ROUNDS as u64,
            0,
        );

        PoseidonConfig::new(
            POSEIDON_FULL_ROUNDS,
            POSEIDON_PARTIAL_ROUNDS,
            POSEIDON_ALPHA,
            mds,
            ark,
            POSEIDON_RATE,
            POSEIDON_CAPACITY,
        )
    })
}
