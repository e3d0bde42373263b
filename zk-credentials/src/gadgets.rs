//! Small R1CS gadgets used by the threshold circuit and the pairing rules.

use crate::constants::poseidon_config;
use ark_bn254::Fr;
use ark_crypto_primitives::sponge::constraints::CryptographicSpongeVar;
use ark_crypto_primitives::sponge::poseidon::constraints::PoseidonSpongeVar;
use ark_ff::{BigInteger, PrimeField};
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

/// Convert little-endian boolean bits into an FpVar.
pub fn bits_le_to_fp(bits_le: &[Boolean<Fr>]) -> Result<FpVar<Fr>, SynthesisError> {
    let mut acc = FpVar::<Fr>::zero();
    let mut coeff = FpVar::<Fr>::one();

    for b in bits_le {
        // b ? coeff : 0
        let term = b.select(&coeff, &FpVar::<Fr>::zero())?;
        acc += term;
        coeff = coeff.double()?;
    }

    Ok(acc)
}

/// Allocate the `n` low bits of `v` as witnesses and enforce that they recompose to `v`.
///
/// This is the range check `v < 2^n`.
pub fn constrain_bits(v: &FpVar<Fr>, n: usize) -> Result<Vec<Boolean<Fr>>, SynthesisError> {
    let cs = v.cs();
    let mut bits = Vec::with_capacity(n);
    for i in 0..n {
        let bit = Boolean::new_witness(cs.clone(), || {
            let value = v.value()?.into_bigint();
            Ok(value.get_bit(i))
        })?;
        bits.push(bit);
    }

    let reconstructed = bits_le_to_fp(&bits)?;
    reconstructed.enforce_equal(v)?;
    Ok(bits)
}

/// Boolean gadget: `a <= c` where `a` is given as little-endian bits and `c` is a constant.
pub fn leq_const(a_bits_le: &[Boolean<Fr>], c: u64) -> Result<Boolean<Fr>, SynthesisError> {
    // Lexicographic compare from MSB to LSB.
    let mut less = Boolean::constant(false);
    let mut equal = Boolean::constant(true);

    for i in (0..a_bits_le.len()).rev() {
        let a_i = a_bits_le[i].clone();
        let c_i = (c >> i) & 1 == 1;

        // equal && !a_i && c_i
        if c_i {
            let less_i = Boolean::kary_and(&[equal.clone(), !a_i.clone()])?;
            less = Boolean::kary_or(&[less, less_i])?;
        }

        let a_eq_ci = if c_i { a_i } else { !a_i };
        equal = Boolean::kary_and(&[equal, a_eq_ci])?;
    }

    Boolean::kary_or(&[less, equal])
}

/// Boolean gadget: `a >= b` for values already known to fit in `n` bits.
///
/// `a - b + 2^n` lies in `[1, 2^(n+1))` and its bit `n` is set exactly when `a >= b`.
pub fn geq_small(a: &FpVar<Fr>, b: &FpVar<Fr>, n: usize) -> Result<Boolean<Fr>, SynthesisError> {
    let offset = FpVar::<Fr>::constant(Fr::from(1u64 << n));
    let shifted = a - b + offset;
    let bits = constrain_bits(&shifted, n + 1)?;
    Ok(bits[n].clone())
}

/// Boolean gadget: `a <= b` over little-endian bit vectors of equal length.
pub fn leq_bits(a_bits_le: &[Boolean<Fr>], b_bits_le: &[Boolean<Fr>]) -> Result<Boolean<Fr>, SynthesisError> {
    assert_eq!(a_bits_le.len(), b_bits_le.len());

    let mut less = Boolean::constant(false);
    let mut equal = Boolean::constant(true);

    for (a_i, b_i) in a_bits_le.iter().zip(b_bits_le).rev() {
        // equal && !a_i && b_i
        let less_i = Boolean::kary_and(&[equal.clone(), !a_i.clone(), b_i.clone()])?;
        less = Boolean::kary_or(&[less, less_i])?;

        let same = a_i.is_eq(b_i)?;
        equal = Boolean::kary_and(&[equal, same])?;
    }

    Boolean::kary_or(&[less, equal])
}

/// Boolean gadget: `a <= b` for arbitrary field elements, comparing canonical
/// representatives.
pub fn leq_field(a: &FpVar<Fr>, b: &FpVar<Fr>) -> Result<Boolean<Fr>, SynthesisError> {
    // `to_bits_le` enforces the canonical (< r) decomposition.
    let a_bits = a.to_bits_le()?;
    let b_bits = b.to_bits_le()?;
    leq_bits(&a_bits, &b_bits)
}

/// In-circuit Poseidon over a sequence of field elements, squeezing one element.
pub fn poseidon_hash_var(cs: ConstraintSystemRef<Fr>, inputs: &[FpVar<Fr>]) -> Result<FpVar<Fr>, SynthesisError> {
    let mut sponge = PoseidonSpongeVar::<Fr>::new(cs, poseidon_config());
    sponge.absorb(&inputs.to_vec())?;
    Ok(sponge.squeeze_field_elements(1)?[0].clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::poseidon_hash;
    use ark_relations::r1cs::ConstraintSystem;

    fn witness(cs: &ConstraintSystemRef<Fr>, x: Fr) -> FpVar<Fr> {
        FpVar::new_witness(cs.clone(), || Ok(x)).unwrap()
    }

    #[test]
    fn constrain_bits_rejects_wide_values() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let v = witness(&cs, Fr::from(255u64));
        constrain_bits(&v, 8).unwrap();
        assert!(cs.is_satisfied().unwrap());

        let cs = ConstraintSystem::<Fr>::new_ref();
        let v = witness(&cs, Fr::from(256u64));
        constrain_bits(&v, 8).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn leq_const_matches_native() {
        for a in [0u64, 40, 99, 100, 101, 200, 255] {
            let cs = ConstraintSystem::<Fr>::new_ref();
            let v = witness(&cs, Fr::from(a));
            let bits = constrain_bits(&v, 8).unwrap();
            let le = leq_const(&bits, 100).unwrap();
            assert_eq!(le.value().unwrap(), a <= 100, "a = {a}");
            assert!(cs.is_satisfied().unwrap());
        }
    }

    #[test]
    fn geq_small_matches_native() {
        for (a, b) in [(0u64, 0u64), (40, 41), (41, 40), (90, 90), (100, 0), (0, 100), (255, 255)] {
            let cs = ConstraintSystem::<Fr>::new_ref();
            let av = witness(&cs, Fr::from(a));
            let bv = witness(&cs, Fr::from(b));
            let ge = geq_small(&av, &bv, 8).unwrap();
            assert_eq!(ge.value().unwrap(), a >= b, "{a} >= {b}");
            assert!(cs.is_satisfied().unwrap());
        }
    }

    #[test]
    fn leq_field_handles_large_elements() {
        let big = -Fr::from(1u64);
        let small = Fr::from(3u64);
        for (a, b) in [(small, big), (big, small), (big, big)] {
            let cs = ConstraintSystem::<Fr>::new_ref();
            let av = witness(&cs, a);
            let bv = witness(&cs, b);
            let le = leq_field(&av, &bv).unwrap();
            assert_eq!(le.value().unwrap(), a <= b);
            assert!(cs.is_satisfied().unwrap());
        }
    }

    #[test]
    fn poseidon_gadget_matches_native() {
        let inputs = [Fr::from(1u64), Fr::from(2u64), Fr::from(3u64)];
        let cs = ConstraintSystem::<Fr>::new_ref();
        let vars: Vec<_> = inputs.iter().map(|x| witness(&cs, *x)).collect();
        let out = poseidon_hash_var(cs.clone(), &vars).unwrap();
        assert_eq!(out.value().unwrap(), poseidon_hash(&inputs));
        assert!(cs.is_satisfied().unwrap());
    }
}
