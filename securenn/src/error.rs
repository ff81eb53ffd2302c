use crate::{
    execution::player::Role,
    protocol::secure_random::Dtype,
    shares::ring::Ring,
};
use thiserror::Error;

/// An Error enum capturing the errors produced by this crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Config Error
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// Invalid party id provided
    #[error("Invalid Party id {0}")]
    Id(usize),
    /// Bit-level operation applied to a fixed-point encoded operand
    #[error("Bit operations require unscaled operands")]
    ScaledBitOperand,
    #[error("Ring mismatch: {left} vs {right}")]
    RingMismatch { left: Ring, right: Ring },
    #[error("Cannot combine a scaled and an unscaled operand")]
    ScalingMismatch,
    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Bit width mismatch: expected {expected} bits, got {actual}")]
    BitWidthMismatch { expected: usize, actual: usize },
    /// A flip bit outside of {0, 1}
    #[error("Flip bit must be 0 or 1, got {0}")]
    NonBinaryFlip(u64),
    #[error("MSB extraction requires an odd modulus, got {0}")]
    EvenModulus(Ring),
    #[error("Unsupported modulus: {0}")]
    UnsupportedModulus(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("Invalid dtype {0}, expected int32 or int64")]
    InvalidDtype(String),
    #[error("Must specify maxval for integer dtype {0}")]
    MissingBound(Dtype),
    #[error("Invalid bounds: minval {minval} must be below maxval {maxval}")]
    InvalidBounds { minval: i64, maxval: i64 },
    #[error("Seed must hold exactly 8 words, got {0}")]
    InvalidSeedLength(usize),
    /// Two selections wrote the same row of a dense buffer
    #[error("Row {0} selected more than once")]
    OverlappingSelection(usize),
    /// A row of a dense buffer was never written
    #[error("Row {0} was not selected by any branch")]
    IncompleteSelection(usize),
    #[error("Expected a secret-shared tensor, got a public one")]
    ExpectedPrivate,
    #[error("Missing input values for owner {0}")]
    MissingInput(Role),
    #[error("Role {0} does not take part in {1}")]
    WrongRole(Role, &'static str),
    #[error("Unexpected network value, expected {0}")]
    UnexpectedMessage(&'static str),
}
