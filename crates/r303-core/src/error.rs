//! Error types for r303-core

use crate::opcode::OperandShape;
use std::fmt;
use thiserror::Error;

/// Result type for r303-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which end of a ring buffer a handle represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Producer,
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Producer => write!(f, "producer"),
            Self::Consumer => write!(f, "consumer"),
        }
    }
}

/// Core error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Segment of {len} bytes is too small (minimum {min})")]
    SegmentTooSmall { len: usize, min: usize },

    #[error("Segment of {len} bytes exceeds the 32-bit cursor range")]
    SegmentTooLarge { len: usize },

    /// Each segment has exactly one producer and one consumer.
    #[error("Ring buffer already has a {0}")]
    RoleTaken(Role),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Opcode {opcode} takes a {expected} operand, got {found}")]
    ShapeMismatch {
        opcode: u8,
        expected: OperandShape,
        found: OperandShape,
    },

    #[error("Invalid pattern step: {0}")]
    InvalidPatternStep(String),
}

/// Failure to decode a byte run into instructions.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Instruction {opcode} truncated: needs {needed} operand bytes, {available} available")]
    Truncated {
        opcode: u8,
        needed: usize,
        available: usize,
    },
}
