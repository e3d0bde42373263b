//! Types shared between the circuit and the host-side prover/verifier.

use crate::constants::MAX_GRADE;
use crate::error::{ZkError, ZkResult};
use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use ark_serialize::CanonicalDeserialize;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Encode a field element as 64 lowercase hex chars, big-endian.
///
/// Big-endian keeps the encoding identical to a uint256 word, which is what on-chain
/// consumers compare against.
pub fn fr_to_hex(x: &Fr) -> String {
    hex::encode(x.into_bigint().to_bytes_be())
}

/// Decode a big-endian hex field element. Rejects wrong lengths and values >= r.
pub fn fr_from_hex(s: &str) -> ZkResult<Fr> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let mut bytes = hex::decode(s).map_err(|e| ZkError::InvalidHex(format!("{s}: {e}")))?;
    if bytes.len() != 32 {
        return Err(ZkError::InvalidHex(format!("expected 32 bytes, got {}", bytes.len())));
    }
    bytes.reverse();
    Fr::deserialize_compressed(&bytes[..])
        .map_err(|_| ZkError::InvalidHex(format!("{s} is not a canonical field element")))
}

/// Serde adapter for `Fr` fields stored as big-endian hex.
pub mod fr_hex {
    use super::*;

    pub fn serialize<S: Serializer>(x: &Fr, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&fr_to_hex(x))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Fr, D::Error> {
        let s = String::deserialize(d)?;
        fr_from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A record's commitment: the Poseidon digest that becomes a tree leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Commitment(#[serde(with = "fr_hex")] pub Fr);

impl Commitment {
    pub fn to_hex(&self) -> String {
        fr_to_hex(&self.0)
    }

    pub fn from_hex(s: &str) -> ZkResult<Self> {
        fr_from_hex(s).map(Self)
    }
}

impl From<Fr> for Commitment {
    fn from(x: Fr) -> Self {
        Self(x)
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// 256-bit commitment randomness.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Salt(pub [u8; 32]);

impl Salt {
    /// Draw a fresh salt. Callers must pass a cryptographically secure RNG.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// The salt as a field element (big-endian, reduced mod r).
    pub fn to_field(&self) -> Fr {
        Fr::from_be_bytes_mod_order(&self.0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> ZkResult<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| ZkError::InvalidHex(format!("salt: {e}")))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ZkError::InvalidHex("salt must be 32 bytes".to_string()))?;
        Ok(Self(arr))
    }
}

// Never print salts in logs.
impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(..)")
    }
}

impl Serialize for Salt {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Salt {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Salt::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Unvalidated record as it arrives from upstream parsing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawRecord {
    pub student_id: String,
    pub subjects: Vec<u16>,
    pub salt: Salt,
}

/// One student's private record.
///
/// Constructing a `Record` validates it, so the cryptographic core never sees an
/// out-of-range grade.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "RawRecord", into = "RawRecord")]
pub struct Record {
    student_id: String,
    subjects: Vec<u8>,
    salt: Salt,
}

impl Record {
    pub fn new(student_id: impl Into<String>, subjects: &[u16], salt: Salt) -> ZkResult<Self> {
        let student_id = student_id.into();
        if student_id.is_empty() {
            return Err(ZkError::EmptyStudentId);
        }
        if subjects.is_empty() {
            return Err(ZkError::NoSubjects);
        }

        let mut grades = Vec::with_capacity(subjects.len());
        for (index, &grade) in subjects.iter().enumerate() {
            if grade > MAX_GRADE as u16 {
                return Err(ZkError::GradeOutOfRange { index, grade });
            }
            grades.push(grade as u8);
        }

        Ok(Self { student_id, subjects: grades, salt })
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn subjects(&self) -> &[u8] {
        &self.subjects
    }

    pub fn salt(&self) -> &Salt {
        &self.salt
    }
}

impl TryFrom<RawRecord> for Record {
    type Error = ZkError;

    fn try_from(raw: RawRecord) -> ZkResult<Self> {
        Record::new(raw.student_id, &raw.subjects, raw.salt)
    }
}

impl From<Record> for RawRecord {
    fn from(r: Record) -> Self {
        RawRecord {
            student_id: r.student_id,
            subjects: r.subjects.into_iter().map(u16::from).collect(),
            salt: r.salt,
        }
    }
}

/// Public inputs of a threshold proof, as seen by the verifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicInputs {
    #[serde(with = "fr_hex")]
    pub root: Fr,
    pub threshold_grade: u8,
    pub require_all: bool,
}

impl PublicInputs {
    pub fn new(root: Fr, threshold_grade: u16, require_all: bool) -> ZkResult<Self> {
        if threshold_grade > MAX_GRADE as u16 {
            return Err(ZkError::ThresholdOutOfRange(threshold_grade));
        }
        Ok(Self { root, threshold_grade: threshold_grade as u8, require_all })
    }

    /// Groth16 public-input vector.
    ///
    /// ORDERING MUST MATCH the circuit's `new_input` allocation order.
    pub fn to_field_elements(&self, is_valid: bool) -> Vec<Fr> {
        vec![
            self.root,
            Fr::from(self.threshold_grade as u64),
            Fr::from(self.require_all as u64),
            Fr::from(is_valid as u64),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn hex_is_big_endian_and_fixed_width() {
        let h = fr_to_hex(&Fr::from(1u64));
        assert_eq!(h.len(), 64);
        assert!(h.ends_with("01"));
        assert_eq!(fr_from_hex(&h).unwrap(), Fr::from(1u64));
        assert_eq!(fr_from_hex(&format!("0x{h}")).unwrap(), Fr::from(1u64));
    }

    #[test]
    fn hex_rejects_non_canonical_and_bad_length() {
        assert!(matches!(fr_from_hex(&"ff".repeat(32)), Err(ZkError::InvalidHex(_))));
        assert!(matches!(fr_from_hex("abcd"), Err(ZkError::InvalidHex(_))));
        assert!(matches!(fr_from_hex("zz"), Err(ZkError::InvalidHex(_))));
    }

    #[test]
    fn record_rejects_out_of_range_grade() {
        let salt = Salt([1u8; 32]);
        let err = Record::new("s-1", &[50, 101], salt).unwrap_err();
        assert!(matches!(err, ZkError::GradeOutOfRange { index: 1, grade: 101 }));
        assert!(matches!(Record::new("", &[50], salt), Err(ZkError::EmptyStudentId)));
        assert!(matches!(Record::new("s-1", &[], salt), Err(ZkError::NoSubjects)));
    }

    #[test]
    fn record_deserialization_validates() {
        let salt = Salt([2u8; 32]).to_hex();
        let ok = format!(r#"{{"student_id":"s-9","subjects":[0,100],"salt":"{salt}"}}"#);
        let rec: Record = serde_json::from_str(&ok).unwrap();
        assert_eq!(rec.subjects(), &[0, 100]);

        let bad = format!(r#"{{"student_id":"s-9","subjects":[250],"salt":"{salt}"}}"#);
        assert!(serde_json::from_str::<Record>(&bad).is_err());
    }

    #[test]
    fn salts_are_fresh_and_hidden_from_debug() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let a = Salt::random(&mut rng);
        let b = Salt::random(&mut rng);
        assert!(a != b);
        assert_eq!(format!("{a:?}"), "Salt(..)");
    }

    #[test]
    fn threshold_is_range_checked() {
        assert!(PublicInputs::new(Fr::from(1u64), 100, true).is_ok());
        assert!(matches!(
            PublicInputs::new(Fr::from(1u64), 101, true),
            Err(ZkError::ThresholdOutOfRange(101))
        ));
    }
}
