//! The PDU capability and a generic leaf PDU.

use bytes::{BufMut, BytesMut};

use crate::header::{encode_flags_length, framed_size, PduFlags, VectorSize};

/// A protocol data unit that can size and serialize itself.
///
/// `size` must be pure and must match exactly what `write` appends; `pack`
/// checks this on every call.
pub trait Pdu {
    /// Encoded size in bytes, including the flags/length field
    fn size(&self) -> usize;

    /// Append the encoded PDU to `buf`
    fn write(&self, buf: &mut BytesMut);
}

/// Append `pdu` to `buf` and return the number of bytes written.
///
/// # Panics
///
/// Panics if the PDU writes a different number of bytes than it reports from
/// [`Pdu::size`]. That is a bug in the PDU implementation, and continuing
/// would hand a corrupt frame to the transport.
pub fn pack<P: Pdu + ?Sized>(pdu: &P, buf: &mut BytesMut) -> usize {
    let expected = pdu.size();
    buf.reserve(expected);
    let start = buf.len();
    pdu.write(buf);
    let written = buf.len() - start;
    assert_eq!(
        written, expected,
        "pdu wrote {} bytes but reported a size of {}",
        written, expected
    );
    written
}

/// Leaf PDU carrying an opaque header and opaque data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPdu<'a> {
    vector_size: VectorSize,
    vector: u32,
    header: &'a [u8],
    data: &'a [u8],
}

impl<'a> DataPdu<'a> {
    /// Create a PDU with no header
    pub fn new(vector_size: VectorSize, vector: u32, data: &'a [u8]) -> Self {
        Self {
            vector_size,
            vector,
            header: &[],
            data,
        }
    }

    /// Set the layer header bytes
    pub fn with_header(mut self, header: &'a [u8]) -> Self {
        self.header = header;
        self
    }

    /// The vector
    pub fn vector(&self) -> u32 {
        self.vector
    }

    /// The data bytes
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    fn body_size(&self) -> usize {
        self.vector_size.len() + self.header.len() + self.data.len()
    }
}

impl Pdu for DataPdu<'_> {
    fn size(&self) -> usize {
        framed_size(self.body_size())
    }

    fn write(&self, buf: &mut BytesMut) {
        encode_flags_length(PduFlags::ENCODE, self.size(), buf);
        self.vector_size.encode(self.vector, buf);
        buf.put_slice(self.header);
        buf.put_slice(self.data);
    }
}
