//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Not enough bytes to read the flags/length field
    #[error("incomplete pdu: need {needed} bytes, have {available}")]
    Incomplete {
        /// Bytes required
        needed: usize,
        /// Bytes present
        available: usize,
    },

    /// Declared PDU length is smaller than its own length field or runs past the block
    #[error("bad pdu length {declared} (available {available})")]
    Length {
        /// Length declared in the flags/length field
        declared: usize,
        /// Bytes left in the enclosing block
        available: usize,
    },

    /// PDU body too short for the vector or header, or inherits a field no sibling set
    #[error("malformed header")]
    MalformedHeader,

    /// No inflator registered for this vector
    #[error("unknown vector {0:#x}")]
    UnknownVector(u32),

    /// An inflator is already registered for this vector
    #[error("vector {0:#x} already registered")]
    VectorAlreadyRegistered(u32),

    /// Encoded size exceeds what the length field can express
    #[error("size limit exceeded: {0}")]
    Size(usize),
}

impl WireError {
    /// Whether the error leaves the block cursor unusable.
    ///
    /// Length errors mean the next sibling's offset is unknown, so the rest of
    /// the block has to be abandoned.
    pub fn desynchronizes(&self) -> bool {
        matches!(self, WireError::Incomplete { .. } | WireError::Length { .. })
    }
}
