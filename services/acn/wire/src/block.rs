//! Ordered blocks of borrowed PDUs.

use bytes::{Bytes, BytesMut};
use std::fmt;

use crate::pdu::{pack, Pdu};

/// An ordered sequence of borrowed PDUs.
///
/// The block does not own its PDUs; they only have to outlive the block.
/// Children are serialized back to back in insertion order with no framing
/// of their own, so the enclosing PDU's length is what bounds the block.
pub struct PduBlock<'a, P: Pdu + ?Sized + 'a = dyn Pdu + 'a> {
    pdus: Vec<&'a P>,
    size: usize,
}

impl<'a, P: Pdu + ?Sized + 'a> PduBlock<'a, P> {
    /// Create an empty block
    pub fn new() -> Self {
        Self {
            pdus: Vec::new(),
            size: 0,
        }
    }

    /// Create an empty block with room for `capacity` PDUs
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pdus: Vec::with_capacity(capacity),
            size: 0,
        }
    }

    /// Append a PDU
    pub fn add_pdu(&mut self, pdu: &'a P) {
        self.size += pdu.size();
        self.pdus.push(pdu);
    }

    /// Remove all PDUs, keeping the allocation
    pub fn clear(&mut self) {
        self.pdus.clear();
        self.size = 0;
    }

    /// Sum of the children's sizes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of PDUs in the block
    pub fn len(&self) -> usize {
        self.pdus.len()
    }

    /// Whether the block has no PDUs
    pub fn is_empty(&self) -> bool {
        self.pdus.is_empty()
    }

    /// Iterate over the PDUs in order
    pub fn iter(&self) -> impl Iterator<Item = &'a P> + '_ {
        self.pdus.iter().copied()
    }

    /// Append every PDU to `buf`, returning the number of bytes written.
    ///
    /// # Panics
    ///
    /// Panics if a child's written length disagrees with its reported size.
    pub fn pack(&self, buf: &mut BytesMut) -> usize {
        buf.reserve(self.size);
        let written: usize = self.pdus.iter().map(|pdu| pack(*pdu, buf)).sum();
        assert_eq!(
            written, self.size,
            "pdu block wrote {} bytes but reported a size of {}",
            written, self.size
        );
        written
    }

    /// Serialize the block into a new buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size);
        self.pack(&mut buf);
        buf.freeze()
    }
}

impl<'a, P: Pdu + ?Sized + 'a> Default for PduBlock<'a, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, P: Pdu + ?Sized + 'a> fmt::Debug for PduBlock<'a, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PduBlock")
            .field("len", &self.pdus.len())
            .field("size", &self.size)
            .finish()
    }
}
