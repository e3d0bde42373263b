//! ZK layer for private academic credentials.
//!
//! This crate contains:
//! - A commitment engine binding a student's id, grades and salt into one field element.
//! - A Merkle accumulator over commitments, with standalone proof verification.
//! - A SNARK circuit that proves a grade threshold policy jointly with tree membership.
//! - Prover + verifier orchestration and the wire format of proof artifacts.
//! - The registry interface and the batch backup format.

pub mod artifact;
pub mod batch;
pub mod circuit;
pub mod commitment;
pub mod constants;
pub mod error;
pub mod gadgets;
pub mod groth16;
pub mod merkle;
pub mod pairing;
pub mod registry;
pub mod types;
pub mod witness;

pub use artifact::{ProofArtifact, ProofPoints, RejectReason, Verdict};
pub use batch::{BatchExport, Certificate};
pub use circuit::{CircuitShape, ThresholdCircuit};
pub use commitment::commit;
pub use error::{ErrorKind, ZkError, ZkResult};
pub use groth16::ProofService;
pub use merkle::{MerkleProof, MerkleTree, TreeExport};
pub use pairing::{PairingRule, Position, PositionalPairing, SortedPairing};
pub use registry::{Batch, BatchId, BatchMetadata, InMemoryRegistry, Registry};
pub use types::{Commitment, PublicInputs, Record, Salt};
pub use witness::{evaluate, PrivateInputs};
