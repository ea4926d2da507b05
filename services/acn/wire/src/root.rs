//! Root layer PDU.
//!
//! The root layer wraps a block of application PDUs with the sender's CID
//! and a 4-byte vector naming the protocol carried inside.

use bytes::{BufMut, BytesMut};

use crate::block::PduBlock;
use crate::header::{encode_flags_length, framed_size, Cid, PduFlags, VectorSize, CID_SIZE};
use crate::pdu::Pdu;

/// Vector width at the root layer
pub const ROOT_VECTOR_SIZE: VectorSize = VectorSize::Four;

/// Root vector for E1.31 data
pub const VECTOR_ROOT_E131_DATA: u32 = 0x0000_0004;

/// Root vector for E1.31 extended (sync/discovery)
pub const VECTOR_ROOT_E131_EXTENDED: u32 = 0x0000_0008;

/// Root layer PDU wrapping a borrowed block
#[derive(Debug, Clone, Copy)]
pub struct RootPdu<'a> {
    cid: Cid,
    vector: u32,
    block: Option<&'a PduBlock<'a>>,
}

impl<'a> RootPdu<'a> {
    /// Create an empty root PDU
    pub fn new(cid: Cid, vector: u32) -> Self {
        Self {
            cid,
            vector,
            block: None,
        }
    }

    /// Attach the nested block
    pub fn with_block(mut self, block: &'a PduBlock<'a>) -> Self {
        self.block = Some(block);
        self
    }

    /// Change the vector
    pub fn set_vector(&mut self, vector: u32) {
        self.vector = vector;
    }

    /// Change the nested block
    pub fn set_block(&mut self, block: &'a PduBlock<'a>) {
        self.block = Some(block);
    }

    /// Sender's CID
    pub fn cid(&self) -> Cid {
        self.cid
    }

    /// Root vector
    pub fn vector(&self) -> u32 {
        self.vector
    }

    fn data_size(&self) -> usize {
        self.block.map_or(0, |block| block.size())
    }
}

impl Pdu for RootPdu<'_> {
    fn size(&self) -> usize {
        framed_size(ROOT_VECTOR_SIZE.len() + CID_SIZE + self.data_size())
    }

    fn write(&self, buf: &mut BytesMut) {
        encode_flags_length(PduFlags::ENCODE, self.size(), buf);
        ROOT_VECTOR_SIZE.encode(self.vector, buf);
        buf.put_slice(self.cid.as_bytes());
        if let Some(block) = self.block {
            block.pack(buf);
        }
    }
}
