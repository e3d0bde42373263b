//! Rules for combining a node with its sibling on the way to the root.
//!
//! The tree builder, the standalone verifier and the circuit are all generic over one
//! [`PairingRule`], so switching the rule switches every consumer at once.

use crate::commitment::poseidon_hash;
use crate::gadgets::{leq_field, poseidon_hash_var};
use ark_bn254::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::SynthesisError;

/// Which side of the current node the sibling sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Left,
    Right,
}

pub trait PairingRule: Clone + Copy + Default + Send + Sync + 'static {
    /// Stable name, recorded in exports so a backup is never rebuilt under another rule.
    const NAME: &'static str;

    /// Parent of two adjacent nodes `left` and `right` (tree order).
    fn combine(left: &Fr, right: &Fr) -> Fr;

    /// In-circuit parent of `node` and `sibling`. `sibling_is_left` is the path bit.
    fn combine_var(
        node: &FpVar<Fr>,
        sibling: &FpVar<Fr>,
        sibling_is_left: &Boolean<Fr>,
    ) -> Result<FpVar<Fr>, SynthesisError>;

    /// Native parent of `node` and `sibling` as seen from a proof step.
    fn combine_step(node: &Fr, sibling: &Fr, position: Position) -> Fr {
        match position {
            Position::Left => Self::combine(sibling, node),
            Position::Right => Self::combine(node, sibling),
        }
    }
}

/// Sort the pair before hashing: `H(min(a, b), max(a, b))`.
///
/// Verifiers never need left/right information, at the cost of leaking pair order.
#[derive(Clone, Copy, Debug, Default)]
pub struct SortedPairing;

impl PairingRule for SortedPairing {
    const NAME: &'static str = "sorted";

    fn combine(left: &Fr, right: &Fr) -> Fr {
        if left <= right {
            poseidon_hash(&[*left, *right])
        } else {
            poseidon_hash(&[*right, *left])
        }
    }

    fn combine_var(
        node: &FpVar<Fr>,
        sibling: &FpVar<Fr>,
        _sibling_is_left: &Boolean<Fr>,
    ) -> Result<FpVar<Fr>, SynthesisError> {
        let node_first = leq_field(node, sibling)?;
        let lo = node_first.select(node, sibling)?;
        let hi = node_first.select(sibling, node)?;
        poseidon_hash_var(node.cs().or(sibling.cs()), &[lo, hi])
    }
}

/// Position-aware pairing: `H(left, right)` in tree order.
#[derive(Clone, Copy, Debug, Default)]
pub struct PositionalPairing;

impl PairingRule for PositionalPairing {
    const NAME: &'static str = "positional";

    fn combine(left: &Fr, right: &Fr) -> Fr {
        poseidon_hash(&[*left, *right])
    }

    fn combine_var(
        node: &FpVar<Fr>,
        sibling: &FpVar<Fr>,
        sibling_is_left: &Boolean<Fr>,
    ) -> Result<FpVar<Fr>, SynthesisError> {
        let left = sibling_is_left.select(sibling, node)?;
        let right = sibling_is_left.select(node, sibling)?;
        poseidon_hash_var(node.cs().or(sibling.cs()), &[left, right])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_relations::r1cs::ConstraintSystem;

    #[test]
    fn sorted_is_symmetric_positional_is_not() {
        let a = Fr::from(11u64);
        let b = Fr::from(22u64);
        assert_eq!(SortedPairing::combine(&a, &b), SortedPairing::combine(&b, &a));
        assert_ne!(PositionalPairing::combine(&a, &b), PositionalPairing::combine(&b, &a));
    }

    #[test]
    fn combine_step_respects_position() {
        let node = Fr::from(5u64);
        let sib = Fr::from(9u64);
        assert_eq!(
            PositionalPairing::combine_step(&node, &sib, Position::Left),
            PositionalPairing::combine(&sib, &node)
        );
        assert_eq!(
            PositionalPairing::combine_step(&node, &sib, Position::Right),
            PositionalPairing::combine(&node, &sib)
        );
    }

    fn gadget_matches<P: PairingRule>(node: Fr, sib: Fr, position: Position) {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let n = FpVar::new_witness(cs.clone(), || Ok(node)).unwrap();
        let s = FpVar::new_witness(cs.clone(), || Ok(sib)).unwrap();
        let bit = Boolean::new_witness(cs.clone(), || Ok(position == Position::Left)).unwrap();
        let out = P::combine_var(&n, &s, &bit).unwrap();
        assert_eq!(out.value().unwrap(), P::combine_step(&node, &sib, position));
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn gadgets_match_native_rules() {
        let big = -Fr::from(7u64);
        let small = Fr::from(7u64);
        for pos in [Position::Left, Position::Right] {
            gadget_matches::<SortedPairing>(small, big, pos);
            gadget_matches::<SortedPairing>(big, small, pos);
            gadget_matches::<PositionalPairing>(small, big, pos);
            gadget_matches::<PositionalPairing>(big, small, pos);
        }
    }
}
