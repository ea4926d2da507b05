//! PDU layering, root layer envelopes and the inflator dispatch chain for ACN.
//!
//! This crate provides the encode and decode halves of the ACN (ANSI E1.17)
//! PDU model: PDUs that size and serialize themselves, ordered blocks of
//! borrowed PDUs, the root layer envelope that tags a block with the sender's
//! CID, and vector-keyed inflators that peel the layers back off.
//!
//! ## Features
//!
//! - **Self-sizing PDUs**: every PDU reports its exact size before it is packed,
//!   and packing checks the two agree
//! - **Borrowed blocks**: a [`PduBlock`] holds references, so wrapping a payload
//!   never copies it before serialization
//! - **Recursive decoding**: [`LayerInflator`]s nest the same way the encoded
//!   layers do
//! - **Fault isolation**: one bad PDU is logged and skipped without losing its
//!   siblings
//!
//! ## Wire Format
//!
//! ```text
//! +----------------------+----------------------------+
//! | flags (4 bits)       | L V H D                    |
//! +----------------------+----------------------------+
//! | length (12/20 bits)  | whole PDU, this field incl.|
//! +----------------------+----------------------------+
//! | vector (1/2/4B)      | selects the child inflator |
//! +----------------------+----------------------------+
//! | header               | layer specific (root: CID) |
//! +----------------------+----------------------------+
//! | data                 | block of child PDUs        |
//! +----------------------+----------------------------+
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod error;
pub mod header;
pub mod inflator;
pub mod pdu;
pub mod root;

// Re-export main types
pub use block::PduBlock;
pub use error::WireError;
pub use header::{
    encode_flags_length, framed_size, Cid, FlagsLength, PduFlags, RootHeader, VectorSize,
    CID_SIZE, MAX_PDU_LENGTH, TWO_BYTE_LENGTH_LIMIT,
};
pub use inflator::{
    HeaderCodec, HeaderSet, Inflator, InflatorTable, LayerInflator, NoHeader, PayloadHandler,
    RootHeaderCodec, RootInflator,
};
pub use pdu::{pack, DataPdu, Pdu};
pub use root::{RootPdu, ROOT_VECTOR_SIZE, VECTOR_ROOT_E131_DATA, VECTOR_ROOT_E131_EXTENDED};
