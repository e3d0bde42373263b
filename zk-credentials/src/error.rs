use thiserror::Error;

/// Coarse classification of a [`ZkError`], used by callers to decide how to react.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller supplied bad input; rejected before any cryptographic work.
    InputValidation,
    /// Artifacts produced at different times or versions disagree.
    StructuralFailure,
    /// The witness does not satisfy the policy. Expected, non-fatal.
    ConstraintFailure,
    /// Keys or files are missing or unreadable.
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum ZkError {
    #[error("grade {grade} at subject {index} is outside [0, 100]")]
    GradeOutOfRange { index: usize, grade: u16 },

    #[error("threshold grade {0} is outside [0, 100]")]
    ThresholdOutOfRange(u16),

    #[error("record has no subjects")]
    NoSubjects,

    #[error("student id must not be empty")]
    EmptyStudentId,

    #[error("expected {expected} subjects, got {got}")]
    SubjectCountMismatch { expected: usize, got: usize },

    #[error("merkle proof has {got} steps, circuit expects depth {expected}")]
    DepthMismatch { expected: usize, got: usize },

    #[error("cannot build an accumulator from zero leaves")]
    EmptyAccumulator,

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("root mismatch: stored {stored}, recomputed {recomputed}")]
    RootMismatch { stored: String, recomputed: String },

    #[error("key version mismatch: expected {expected}, got {got}")]
    KeyVersionMismatch { expected: String, got: String },

    #[error("leaf not found in accumulator")]
    LeafNotFound,

    #[error("circuit unsatisfied: {0}")]
    CircuitUnsatisfied(String),

    #[error("missing artifact: {0}")]
    MissingArtifact(String),

    #[error("malformed proof: {0}")]
    MalformedProof(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("arkworks error: {0}")]
    Ark(String),
}

impl ZkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ZkError::GradeOutOfRange { .. }
            | ZkError::ThresholdOutOfRange(_)
            | ZkError::NoSubjects
            | ZkError::EmptyStudentId
            | ZkError::SubjectCountMismatch { .. }
            | ZkError::DepthMismatch { .. }
            | ZkError::EmptyAccumulator
            | ZkError::InvalidHex(_)
            | ZkError::MalformedProof(_) => ErrorKind::InputValidation,

            ZkError::RootMismatch { .. }
            | ZkError::KeyVersionMismatch { .. }
            | ZkError::LeafNotFound => ErrorKind::StructuralFailure,

            ZkError::CircuitUnsatisfied(_) => ErrorKind::ConstraintFailure,

            ZkError::MissingArtifact(_)
            | ZkError::Serialization(_)
            | ZkError::Io(_)
            | ZkError::Ark(_) => ErrorKind::Infrastructure,
        }
    }
}

pub type ZkResult<T> = Result<T, ZkError>;
