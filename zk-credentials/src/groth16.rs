//! Groth16 prover/verifier orchestration for the threshold circuit.
//!
//! SECURITY NOTE (prototype): Groth16 requires a trusted setup that produces a proving key (PK)
//! and verifying key (VK). This prototype generates keys locally. In production, an MPC ceremony
//! should be used.
//!
//! Compiled circuit shape, PK and VK are versioned together under one key id. Every artifact
//! carries the id of the keys that produced it, so a stale VK is reported instead of turning
//! into a silent false negative.

use crate::artifact::{ProofArtifact, RejectReason, Verdict};
use crate::circuit::{CircuitShape, ThresholdCircuit};
use crate::commitment::commitment_preimage;
use crate::constants::{CIRCUIT_ID, CIRCUIT_VERSION};
use crate::error::{ZkError, ZkResult};
use crate::pairing::{PairingRule, SortedPairing};
use crate::types::{fr_to_hex, PublicInputs};
use crate::witness::{build_circuit, evaluate, PrivateInputs};
use ark_bn254::{Bn254, Fr};
use ark_groth16::{prepare_verifying_key, Groth16, PreparedVerifyingKey, ProvingKey, VerifyingKey};
use ark_relations::r1cs::SynthesisError;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind as IoErrorKind;
use std::marker::PhantomData;
use std::path::Path;
use tracing::{debug, info, warn};

const MANIFEST_FILE: &str = "manifest.json";
const PK_FILE: &str = "proving_key.bin";
const VK_FILE: &str = "verifying_key.bin";

/// Describes a persisted key set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyManifest {
    pub circuit: String,
    pub version: u32,
    pub pairing_rule: String,
    pub shape: CircuitShape,
    pub key_id: String,
}

/// Serialize a proving key to bytes.
pub fn serialize_pk(pk: &ProvingKey<Bn254>) -> ZkResult<Vec<u8>> {
    let mut out = Vec::new();
    pk.serialize_compressed(&mut out)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Ok(out)
}

pub fn deserialize_pk(bytes: &[u8]) -> ZkResult<ProvingKey<Bn254>> {
    ProvingKey::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| ZkError::Serialization(format!("{e}")))
}

pub fn serialize_vk(vk: &VerifyingKey<Bn254>) -> ZkResult<Vec<u8>> {
    let mut out = Vec::new();
    vk.serialize_compressed(&mut out)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Ok(out)
}

pub fn deserialize_vk(bytes: &[u8]) -> ZkResult<VerifyingKey<Bn254>> {
    VerifyingKey::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| ZkError::Serialization(format!("{e}")))
}

/// Key id: SHA-256 over the circuit identity, the pairing rule, the shape and the VK.
pub fn compute_key_id<P: PairingRule>(shape: CircuitShape, vk: &VerifyingKey<Bn254>) -> ZkResult<String> {
    let mut hasher = Sha256::new();
    hasher.update(CIRCUIT_ID.as_bytes());
    hasher.update(CIRCUIT_VERSION.to_be_bytes());
    hasher.update(P::NAME.as_bytes());
    hasher.update((shape.subjects as u64).to_be_bytes());
    hasher.update((shape.depth as u64).to_be_bytes());
    hasher.update(serialize_vk(vk)?);
    Ok(hex::encode(hasher.finalize()))
}

fn read_artifact(path: &Path) -> ZkResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| match e.kind() {
        IoErrorKind::NotFound => ZkError::MissingArtifact(path.display().to_string()),
        _ => ZkError::Io(e),
    })
}

/// Seed for the Groth16 blinding factors, derived from the key id and the whole witness.
///
/// Identical requests yield bit-identical proofs; distinct witnesses never share blinding.
fn proving_seed(key_id: &str, private: &PrivateInputs, public: &PublicInputs) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"proving-seed");
    hasher.update(key_id.as_bytes());
    for x in commitment_preimage(&private.record) {
        hasher.update(fr_to_hex(&x).as_bytes());
    }
    for step in &private.merkle_proof.steps {
        hasher.update(fr_to_hex(&step.sibling).as_bytes());
        hasher.update([step.position as u8]);
    }
    for x in public.to_field_elements(true) {
        hasher.update(fr_to_hex(&x).as_bytes());
    }
    hasher.finalize().into()
}

/// Proof generation and verification against one versioned key set.
#[derive(Clone, Debug)]
pub struct ProofService<P: PairingRule = SortedPairing> {
    shape: CircuitShape,
    key_id: String,
    pk: Option<ProvingKey<Bn254>>,
    vk: VerifyingKey<Bn254>,
    pvk: PreparedVerifyingKey<Bn254>,
    _rule: PhantomData<P>,
}

impl<P: PairingRule> ProofService<P> {
    /// Generate a Groth16 keypair for `shape`.
    pub fn setup(shape: CircuitShape, rng: &mut impl RngCore) -> ZkResult<Self> {
        info!(subjects = shape.subjects, depth = shape.depth, rule = P::NAME, "running circuit setup");

        let pk = Groth16::<Bn254>::generate_random_parameters_with_reduction(
            ThresholdCircuit::<P>::blank(shape),
            rng,
        )
        .map_err(|e| ZkError::Ark(format!("{e}")))?;

        let vk = pk.vk.clone();
        Self::from_keys(shape, Some(pk), vk)
    }

    fn from_keys(shape: CircuitShape, pk: Option<ProvingKey<Bn254>>, vk: VerifyingKey<Bn254>) -> ZkResult<Self> {
        let key_id = compute_key_id::<P>(shape, &vk)?;
        let pvk = prepare_verifying_key(&vk);
        Ok(Self { shape, key_id, pk, vk, pvk, _rule: PhantomData })
    }

    pub fn shape(&self) -> CircuitShape {
        self.shape
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn verifying_key(&self) -> &VerifyingKey<Bn254> {
        &self.vk
    }

    pub fn can_prove(&self) -> bool {
        self.pk.is_some()
    }

    pub fn manifest(&self) -> KeyManifest {
        KeyManifest {
            circuit: CIRCUIT_ID.to_string(),
            version: CIRCUIT_VERSION,
            pairing_rule: P::NAME.to_string(),
            shape: self.shape,
            key_id: self.key_id.clone(),
        }
    }

    /// Persist manifest, VK and (if present) PK into `dir`.
    pub fn save(&self, dir: &Path) -> ZkResult<()> {
        std::fs::create_dir_all(dir)?;

        let manifest = serde_json::to_vec_pretty(&self.manifest())
            .map_err(|e| ZkError::Serialization(e.to_string()))?;
        std::fs::write(dir.join(MANIFEST_FILE), manifest)?;
        std::fs::write(dir.join(VK_FILE), serialize_vk(&self.vk)?)?;
        if let Some(pk) = &self.pk {
            std::fs::write(dir.join(PK_FILE), serialize_pk(pk)?)?;
        }

        info!(dir = %dir.display(), key_id = %self.key_id, "saved key set");
        Ok(())
    }

    /// Load a full (proving + verifying) key set.
    pub fn load(dir: &Path) -> ZkResult<Self> {
        Self::load_inner(dir, true)
    }

    /// Load only what verification needs.
    pub fn load_verifier(dir: &Path) -> ZkResult<Self> {
        Self::load_inner(dir, false)
    }

    fn load_inner(dir: &Path, with_pk: bool) -> ZkResult<Self> {
        let manifest: KeyManifest = serde_json::from_slice(&read_artifact(&dir.join(MANIFEST_FILE))?)
            .map_err(|e| ZkError::Serialization(e.to_string()))?;

        let expected = format!("{CIRCUIT_ID}/v{CIRCUIT_VERSION}/{}", P::NAME);
        let got = format!("{}/v{}/{}", manifest.circuit, manifest.version, manifest.pairing_rule);
        if expected != got {
            return Err(ZkError::KeyVersionMismatch { expected, got });
        }

        let vk = deserialize_vk(&read_artifact(&dir.join(VK_FILE))?)?;
        let pk = if with_pk {
            let pk = deserialize_pk(&read_artifact(&dir.join(PK_FILE))?)?;
            if pk.vk != vk {
                return Err(ZkError::KeyVersionMismatch {
                    expected: manifest.key_id,
                    got: "proving key built for a different verifying key".to_string(),
                });
            }
            Some(pk)
        } else {
            None
        };

        let service = Self::from_keys(manifest.shape, pk, vk)?;
        if service.key_id != manifest.key_id {
            return Err(ZkError::KeyVersionMismatch { expected: manifest.key_id, got: service.key_id });
        }

        debug!(dir = %dir.display(), key_id = %service.key_id, "loaded key set");
        Ok(service)
    }

    /// Prove that `private` satisfies the policy in `public`.
    ///
    /// Deterministic for a fixed key set: retries yield bit-identical artifacts.
    pub fn generate(&self, private: &PrivateInputs, public: &PublicInputs) -> ZkResult<ProofArtifact> {
        let pk = self
            .pk
            .as_ref()
            .ok_or_else(|| ZkError::MissingArtifact("proving key not loaded".to_string()))?;

        let circuit = build_circuit::<P>(self.shape, private, public)?;

        let eval = evaluate::<P>(private, public);
        if !eval.merkle_valid {
            return Err(ZkError::CircuitUnsatisfied(
                "commitment is not included under the given root".to_string(),
            ));
        }
        if !eval.is_valid {
            return Err(ZkError::CircuitUnsatisfied(format!(
                "grades do not meet threshold {}",
                public.threshold_grade
            )));
        }

        let mut rng = ChaCha20Rng::from_seed(proving_seed(&self.key_id, private, public));
        let proof = Groth16::<Bn254>::create_random_proof_with_reduction(circuit, pk, &mut rng)
            .map_err(|e| match e {
                SynthesisError::Unsatisfiable => ZkError::CircuitUnsatisfied(format!("{e}")),
                other => ZkError::Ark(format!("{other}")),
            })?;

        let signals = public.to_field_elements(true);

        // Fail closed if the proof doesn't verify.
        let ok = Groth16::<Bn254>::verify_proof(&self.pvk, &proof, &signals)
            .map_err(|e| ZkError::Ark(format!("{e}")))?;
        if !ok {
            return Err(ZkError::CircuitUnsatisfied("generated proof does not verify".to_string()));
        }

        debug!(key_id = %self.key_id, threshold = public.threshold_grade, "generated proof");
        Ok(ProofArtifact::new(self.key_id.clone(), &proof, &signals))
    }

    /// Check an artifact against the verifying key.
    ///
    /// Fails closed: anything that parses but is not a valid proof of `is_valid = 1` is
    /// `Ok` with `valid = false`. Only structurally broken input and key mismatches are errors.
    pub fn verify(&self, artifact: &ProofArtifact) -> ZkResult<Verdict> {
        if artifact.key_id != self.key_id {
            return Err(ZkError::KeyVersionMismatch {
                expected: self.key_id.clone(),
                got: artifact.key_id.clone(),
            });
        }

        let proof = artifact.proof.to_proof()?;
        let signals = artifact.signals()?;

        let verdict = match (proof, signals) {
            (None, _) => Verdict::rejected(RejectReason::InvalidPoint),
            (_, Err(reason)) => Verdict::rejected(reason),
            (Some(_), Ok(signals)) if signals[3] != Fr::from(1u64) => Verdict::rejected(RejectReason::NotValid),
            (Some(proof), Ok(signals)) => match Groth16::<Bn254>::verify_proof(&self.pvk, &proof, &signals) {
                Ok(true) => Verdict::accepted(),
                Ok(false) | Err(_) => Verdict::rejected(RejectReason::PairingCheckFailed),
            },
        };

        if let Some(reason) = verdict.reason {
            warn!(key_id = %self.key_id, ?reason, "rejected proof artifact");
        }
        Ok(verdict)
    }

    /// Verify an artifact for a caller-specified `{root, threshold, require_all}`.
    pub fn verify_claim(&self, artifact: &ProofArtifact, expected: &PublicInputs) -> ZkResult<Verdict> {
        let verdict = self.verify(artifact)?;
        if !verdict.valid {
            return Ok(verdict);
        }

        match artifact.public_inputs() {
            Ok(claimed) if claimed == *expected => Ok(verdict),
            _ => Ok(Verdict::rejected(RejectReason::PublicInputMismatch)),
        }
    }
}
