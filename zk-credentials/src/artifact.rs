//! Wire format of a proof artifact.
//!
//! Canonical encoding: every base-field coordinate and every public signal is a 32-byte
//! big-endian word in hex. G2 coordinates are written in arkworks order `[c0, c1]`.
//! EVM pairing precompiles expect `[c1, c0]`; [`ProofPoints::to_evm_words`] applies that
//! swap and is the only place the alternative ordering exists.
//!
//! The point at infinity is encoded as all-zero coordinates.

use crate::constants::NUM_PUBLIC_INPUTS;
use crate::error::{ZkError, ZkResult};
use crate::types::{fr_to_hex, PublicInputs};
use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ff::{BigInteger, PrimeField, Zero};
use ark_groth16::Proof;
use ark_serialize::CanonicalDeserialize;
use serde::{Deserialize, Serialize};

/// The three curve-point groups of a Groth16 proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofPoints {
    pub a: [String; 2],
    pub b: [[String; 2]; 2],
    pub c: [String; 2],
}

/// A succinct proof plus its public signals `[root, threshold, require_all, is_valid]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofArtifact {
    /// Identifies the key set the proof was generated with.
    pub key_id: String,
    pub proof: ProofPoints,
    pub public_signals: Vec<String>,
}

/// Why a well-formed artifact was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    InvalidPoint,
    NonCanonicalSignal,
    PublicInputCount,
    NotValid,
    PublicInputMismatch,
    PairingCheckFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub valid: bool,
    pub reason: Option<RejectReason>,
}

impl Verdict {
    pub fn accepted() -> Self {
        Self { valid: true, reason: None }
    }

    pub fn rejected(reason: RejectReason) -> Self {
        Self { valid: false, reason: Some(reason) }
    }
}

fn fq_to_hex(x: &Fq) -> String {
    hex::encode(x.into_bigint().to_bytes_be())
}

/// Structural decode of one 32-byte word. Anything but 64 hex chars is malformed.
fn decode_word(s: &str) -> ZkResult<[u8; 32]> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| ZkError::MalformedProof(format!("bad hex word: {e}")))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| ZkError::MalformedProof(format!("word has {} bytes, expected 32", b.len())))
}

/// Canonical field element from a big-endian word, `None` if it is >= the modulus.
fn word_to_field<F: PrimeField>(word: &[u8; 32]) -> Option<F> {
    let mut le = *word;
    le.reverse();
    F::deserialize_compressed(&le[..]).ok()
}

fn g1_to_hex(p: &G1Affine) -> [String; 2] {
    if p.infinity {
        return [fq_to_hex(&Fq::zero()), fq_to_hex(&Fq::zero())];
    }
    [fq_to_hex(&p.x), fq_to_hex(&p.y)]
}

fn g2_to_hex(p: &G2Affine) -> [[String; 2]; 2] {
    let (x, y) = if p.infinity { (Fq2::zero(), Fq2::zero()) } else { (p.x, p.y) };
    [
        [fq_to_hex(&x.c0), fq_to_hex(&x.c1)],
        [fq_to_hex(&y.c0), fq_to_hex(&y.c1)],
    ]
}

fn g1_from_words(x: &[u8; 32], y: &[u8; 32]) -> Option<G1Affine> {
    let x = word_to_field::<Fq>(x)?;
    let y = word_to_field::<Fq>(y)?;
    if x.is_zero() && y.is_zero() {
        return Some(G1Affine::identity());
    }
    let p = G1Affine::new_unchecked(x, y);
    (p.is_on_curve() && p.is_in_correct_subgroup_assuming_on_curve()).then_some(p)
}

fn g2_from_words(w: &[[u8; 32]; 4]) -> Option<G2Affine> {
    let x = Fq2::new(word_to_field::<Fq>(&w[0])?, word_to_field::<Fq>(&w[1])?);
    let y = Fq2::new(word_to_field::<Fq>(&w[2])?, word_to_field::<Fq>(&w[3])?);
    if x.is_zero() && y.is_zero() {
        return Some(G2Affine::identity());
    }
    let p = G2Affine::new_unchecked(x, y);
    (p.is_on_curve() && p.is_in_correct_subgroup_assuming_on_curve()).then_some(p)
}

impl ProofPoints {
    pub fn from_proof(proof: &Proof<Bn254>) -> Self {
        Self {
            a: g1_to_hex(&proof.a),
            b: g2_to_hex(&proof.b),
            c: g1_to_hex(&proof.c),
        }
    }

    /// Decode into a proof.
    ///
    /// `Err(MalformedProof)` for structurally broken words, `Ok(None)` for words that parse
    /// but do not describe valid group elements.
    pub fn to_proof(&self) -> ZkResult<Option<Proof<Bn254>>> {
        let a = [decode_word(&self.a[0])?, decode_word(&self.a[1])?];
        let b = [
            decode_word(&self.b[0][0])?,
            decode_word(&self.b[0][1])?,
            decode_word(&self.b[1][0])?,
            decode_word(&self.b[1][1])?,
        ];
        let c = [decode_word(&self.c[0])?, decode_word(&self.c[1])?];

        let proof = (|| {
            Some(Proof {
                a: g1_from_words(&a[0], &a[1])?,
                b: g2_from_words(&b)?,
                c: g1_from_words(&c[0], &c[1])?,
            })
        })();
        Ok(proof)
    }

    /// Flat word list in EVM precompile order: `a.x, a.y, b.x.c1, b.x.c0, b.y.c1, b.y.c0, c.x, c.y`.
    pub fn to_evm_words(&self) -> [String; 8] {
        [
            self.a[0].clone(),
            self.a[1].clone(),
            self.b[0][1].clone(),
            self.b[0][0].clone(),
            self.b[1][1].clone(),
            self.b[1][0].clone(),
            self.c[0].clone(),
            self.c[1].clone(),
        ]
    }
}

impl ProofArtifact {
    pub fn new(key_id: String, proof: &Proof<Bn254>, signals: &[Fr]) -> Self {
        Self {
            key_id,
            proof: ProofPoints::from_proof(proof),
            public_signals: signals.iter().map(fr_to_hex).collect(),
        }
    }

    /// Decode the public signals.
    ///
    /// `Err(MalformedProof)` for broken hex, `Ok(Err(reason))` for a wrong count or
    /// non-canonical values.
    pub fn signals(&self) -> ZkResult<Result<Vec<Fr>, RejectReason>> {
        let words = self
            .public_signals
            .iter()
            .map(|s| decode_word(s))
            .collect::<ZkResult<Vec<_>>>()?;

        if words.len() != NUM_PUBLIC_INPUTS {
            return Ok(Err(RejectReason::PublicInputCount));
        }

        Ok(words
            .iter()
            .map(word_to_field::<Fr>)
            .collect::<Option<Vec<_>>>()
            .ok_or(RejectReason::NonCanonicalSignal))
    }

    /// The `{root, threshold, require_all}` triple this artifact claims.
    pub fn public_inputs(&self) -> ZkResult<PublicInputs> {
        let signals = self
            .signals()?
            .map_err(|r| ZkError::MalformedProof(format!("public signals rejected: {r:?}")))?;

        let small = |x: &Fr, max: u64| -> ZkResult<u64> {
            let limbs = x.into_bigint().0;
            if limbs[1..].iter().any(|l| *l != 0) || limbs[0] > max {
                return Err(ZkError::MalformedProof(format!("signal {} out of range", fr_to_hex(x))));
            }
            Ok(limbs[0])
        };

        let threshold = small(&signals[1], u8::MAX as u64)? as u16;
        let require_all = small(&signals[2], 1)? == 1;
        PublicInputs::new(signals[0], threshold, require_all)
    }

    pub fn to_json(&self) -> ZkResult<String> {
        serde_json::to_string(self).map_err(|e| ZkError::Serialization(e.to_string()))
    }

    /// Parse an artifact. Anything that is not the expected JSON shape is malformed.
    pub fn from_json(s: &str) -> ZkResult<Self> {
        serde_json::from_str(s).map_err(|e| ZkError::MalformedProof(e.to_string()))
    }
}
