//! Property-based tests for the accumulator and the threshold policy.
//!
//! - Every leaf of every tree proves against that tree's root.
//! - Roots are deterministic; sensitivity to leaf order is exactly what each pairing rule allows.
//! - Export/import round-trips, and tampered exports fail with `RootMismatch`.
//! - Flipping any bit of a sibling breaks the proof.
//! - A policy that holds for threshold T holds for every T' <= T.
//! - The circuit's `is_valid` output agrees with the native evaluation.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem};
use proptest::prelude::*;
use zk_credentials::circuit::CircuitShape;
use zk_credentials::merkle::{verify, MerkleTree};
use zk_credentials::pairing::{PairingRule, PositionalPairing, SortedPairing};
use zk_credentials::types::fr_to_hex;
use zk_credentials::witness::build_circuit;
use zk_credentials::{commit, evaluate, Commitment, PrivateInputs, PublicInputs, Record, Salt, ZkError};

// =============================================================================
// Test Helpers
// =============================================================================

fn to_leaves(values: &[u64]) -> Vec<Commitment> {
    values.iter().map(|v| Commitment(Fr::from(*v))).collect()
}

fn distinct_leaves() -> impl Strategy<Value = Vec<Commitment>> {
    prop::collection::btree_set(any::<u64>(), 2..40)
        .prop_map(|set| set.into_iter().collect::<Vec<u64>>())
        .prop_shuffle()
        .prop_map(|values| to_leaves(&values))
}

fn flip_bit(x: &Fr, bit: usize) -> Fr {
    let mut bytes = x.into_bigint().to_bytes_be();
    let idx = bytes.len() - 1 - bit / 8;
    bytes[idx] ^= 1 << (bit % 8);
    Fr::from_be_bytes_mod_order(&bytes)
}

fn all_leaves_prove<P: PairingRule>(leaves: &[Commitment]) -> Result<(), TestCaseError> {
    let tree = MerkleTree::<P>::build(leaves.to_vec()).unwrap();
    for (i, leaf) in leaves.iter().enumerate() {
        let proof = tree.proof_at(i).unwrap();
        prop_assert_eq!(proof.len(), tree.depth());
        prop_assert!(verify::<P>(leaf, &proof, &tree.root()));
    }
    Ok(())
}

// =============================================================================
// Accumulator Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: every leaf verifies against the root of the tree it was built into
    #[test]
    fn prop_every_leaf_verifies(values in prop::collection::vec(any::<u64>(), 1..40)) {
        let leaves = to_leaves(&values);
        all_leaves_prove::<SortedPairing>(&leaves)?;
        all_leaves_prove::<PositionalPairing>(&leaves)?;
    }

    /// Property: building twice from the same ordered leaves gives the same root
    #[test]
    fn prop_build_is_deterministic(values in prop::collection::vec(any::<u64>(), 1..40)) {
        let a = MerkleTree::<SortedPairing>::build(to_leaves(&values)).unwrap();
        let b = MerkleTree::<SortedPairing>::build(to_leaves(&values)).unwrap();
        prop_assert_eq!(a.root(), b.root());
    }

    /// Property: with sorted pairing, swapping two siblings never changes the root;
    /// with positional pairing it always does
    #[test]
    fn prop_sibling_swap_sensitivity(leaves in distinct_leaves(), pick in any::<prop::sample::Index>()) {
        let pair = pick.index(leaves.len() / 2);
        let mut swapped = leaves.clone();
        swapped.swap(2 * pair, 2 * pair + 1);

        let sorted = MerkleTree::<SortedPairing>::build(leaves.clone()).unwrap();
        let sorted_swapped = MerkleTree::<SortedPairing>::build(swapped.clone()).unwrap();
        prop_assert_eq!(sorted.root(), sorted_swapped.root());

        let positional = MerkleTree::<PositionalPairing>::build(leaves).unwrap();
        let positional_swapped = MerkleTree::<PositionalPairing>::build(swapped).unwrap();
        prop_assert_ne!(positional.root(), positional_swapped.root());
    }

    /// Property: moving a leaf into a different pair changes the root under both rules
    #[test]
    fn prop_cross_pair_move_changes_root(leaves in distinct_leaves()) {
        prop_assume!(leaves.len() >= 3);
        let mut moved = leaves.clone();
        moved.swap(0, 2);

        let a = MerkleTree::<SortedPairing>::build(leaves.clone()).unwrap();
        let b = MerkleTree::<SortedPairing>::build(moved.clone()).unwrap();
        prop_assert_ne!(a.root(), b.root());

        let a = MerkleTree::<PositionalPairing>::build(leaves).unwrap();
        let b = MerkleTree::<PositionalPairing>::build(moved).unwrap();
        prop_assert_ne!(a.root(), b.root());
    }

    /// Property: flipping any single bit of any sibling breaks verification
    #[test]
    fn prop_sibling_bit_flip_is_detected(
        leaves in distinct_leaves(),
        leaf_pick in any::<prop::sample::Index>(),
        step_pick in any::<prop::sample::Index>(),
        bit in 0usize..254,
    ) {
        let tree = MerkleTree::<SortedPairing>::build(leaves.clone()).unwrap();
        let index = leaf_pick.index(leaves.len());
        let mut proof = tree.proof_at(index).unwrap();
        let step = step_pick.index(proof.len());
        proof.steps[step].sibling = flip_bit(&proof.steps[step].sibling, bit);

        prop_assert!(!verify::<SortedPairing>(&leaves[index], &proof, &tree.root()));
    }

    /// Property: import(export(tree)) reproduces the root; tampered leaves do not
    #[test]
    fn prop_export_import(leaves in distinct_leaves(), pick in any::<prop::sample::Index>()) {
        let tree = MerkleTree::<SortedPairing>::build(leaves.clone()).unwrap();
        let export = tree.export();
        prop_assert_eq!(MerkleTree::<SortedPairing>::import(&export).unwrap().root(), tree.root());

        let mut tampered = export.clone();
        let i = pick.index(leaves.len());
        tampered.leaves[i] = Commitment(tampered.leaves[i].0 + Fr::from(1u64));
        let err = MerkleTree::<SortedPairing>::import(&tampered).unwrap_err();
        prop_assert!(matches!(err, ZkError::RootMismatch { .. }), "expected RootMismatch, got {:?}", err);
    }

    /// Property: extend equals a rebuild over the concatenated leaves
    #[test]
    fn prop_extend_matches_rebuild(
        first in prop::collection::vec(any::<u64>(), 1..20),
        second in prop::collection::vec(any::<u64>(), 0..20),
    ) {
        let tree = MerkleTree::<SortedPairing>::build(to_leaves(&first)).unwrap();
        let extended = tree.extend(to_leaves(&second)).unwrap();

        let all: Vec<u64> = first.iter().chain(second.iter()).copied().collect();
        let rebuilt = MerkleTree::<SortedPairing>::build(to_leaves(&all)).unwrap();
        prop_assert_eq!(fr_to_hex(&extended.root()), fr_to_hex(&rebuilt.root()));
    }
}

// =============================================================================
// Threshold Policy Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: validity at threshold T implies validity at every T' <= T
    #[test]
    fn prop_threshold_monotonicity(
        grades in prop::collection::vec(0u16..=100, 5),
        t in 0u16..=100,
        t_lower in 0u16..=100,
        require_all in any::<bool>(),
    ) {
        prop_assume!(t_lower <= t);

        let record = Record::new("student", &grades, Salt([9u8; 32])).unwrap();
        let leaf = commit(&record);
        let tree = MerkleTree::<SortedPairing>::build(vec![leaf, Commitment(Fr::from(3u64))]).unwrap();
        let private = PrivateInputs { record, merkle_proof: tree.proof(&leaf).unwrap() };

        let at_t = evaluate::<SortedPairing>(&private, &PublicInputs::new(tree.root(), t, require_all).unwrap());
        let at_lower = evaluate::<SortedPairing>(&private, &PublicInputs::new(tree.root(), t_lower, require_all).unwrap());

        if at_t.is_valid {
            prop_assert!(at_lower.is_valid);
        }
        prop_assert_eq!(at_t.all_passed, grades.iter().all(|g| *g >= t));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: the circuit's public `is_valid` equals the native evaluation
    #[test]
    fn prop_circuit_matches_evaluate(
        grades in prop::collection::vec(0u16..=100, 4),
        t in 0u16..=100,
        require_all in any::<bool>(),
        foreign_root in any::<bool>(),
    ) {
        let record = Record::new("student", &grades, Salt([11u8; 32])).unwrap();
        let leaf = commit(&record);
        let tree = MerkleTree::<SortedPairing>::build(
            vec![Commitment(Fr::from(5u64)), leaf, Commitment(Fr::from(8u64))],
        ).unwrap();
        let private = PrivateInputs { record, merkle_proof: tree.proof(&leaf).unwrap() };

        let root = if foreign_root { Fr::from(12345u64) } else { tree.root() };
        let public = PublicInputs::new(root, t, require_all).unwrap();
        let expected = evaluate::<SortedPairing>(&private, &public);

        let shape = CircuitShape::new(grades.len(), tree.depth());
        let circuit = build_circuit::<SortedPairing>(shape, &private, &public).unwrap();
        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        prop_assert!(cs.is_satisfied().unwrap());

        // instance_assignment = [1, root, threshold, require_all, is_valid]
        let instance = cs.borrow().unwrap().instance_assignment.clone();
        prop_assert_eq!(instance[4], Fr::from(expected.is_valid as u64));
    }
}
