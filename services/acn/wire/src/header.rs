//! PDU header fields shared by every layer.
//!
//! Each PDU starts with a flags nibble and a 12 or 20 bit length, followed by
//! the vector, the layer header and the data. The root layer header is the
//! 16-byte component identifier (CID) of the sender.

use bitflags::bitflags;
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::WireError;

/// Largest PDU length that fits the 2-byte flags/length form
pub const TWO_BYTE_LENGTH_LIMIT: usize = 0x0FFF;

/// Largest PDU length that fits the 3-byte flags/length form
pub const MAX_PDU_LENGTH: usize = 0x0F_FFFF;

/// Size of the root layer header (the CID)
pub const CID_SIZE: usize = 16;

bitflags! {
    /// PDU flags, stored in the high nibble of the first byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PduFlags: u8 {
        /// Length field is 20 bits wide (3 bytes)
        const LENGTH = 0x80;
        /// Vector is present, otherwise inherited from the previous sibling
        const VECTOR = 0x40;
        /// Header is present, otherwise inherited
        const HEADER = 0x20;
        /// Data is present, otherwise inherited
        const DATA = 0x10;
    }
}

impl PduFlags {
    /// Flags set on every PDU we encode
    pub const ENCODE: PduFlags = PduFlags::VECTOR
        .union(PduFlags::HEADER)
        .union(PduFlags::DATA);
}

/// Width of a layer's vector field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VectorSize {
    /// 1-byte vector
    One,
    /// 2-byte vector
    Two,
    /// 4-byte vector
    Four,
}

impl VectorSize {
    /// Width in bytes
    pub fn len(self) -> usize {
        match self {
            VectorSize::One => 1,
            VectorSize::Two => 2,
            VectorSize::Four => 4,
        }
    }

    /// Largest vector this width can carry
    pub fn max_vector(self) -> u32 {
        match self {
            VectorSize::One => u8::MAX as u32,
            VectorSize::Two => u16::MAX as u32,
            VectorSize::Four => u32::MAX,
        }
    }

    /// Encode a vector (big-endian).
    ///
    /// # Panics
    ///
    /// If `vector` does not fit in this width.
    pub fn encode(self, vector: u32, buf: &mut BytesMut) {
        assert!(
            vector <= self.max_vector(),
            "vector {:#x} does not fit in {} bytes",
            vector,
            self.len()
        );
        match self {
            VectorSize::One => buf.put_u8(vector as u8),
            VectorSize::Two => buf.put_u16(vector as u16),
            VectorSize::Four => buf.put_u32(vector),
        }
    }

    /// Decode a vector from the front of `data`
    pub fn decode(self, data: &[u8]) -> Result<u32, WireError> {
        if data.len() < self.len() {
            return Err(WireError::MalformedHeader);
        }
        Ok(match self {
            VectorSize::One => data[0] as u32,
            VectorSize::Two => u16::from_be_bytes([data[0], data[1]]) as u32,
            VectorSize::Four => u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
        })
    }
}

/// Total PDU size for a body (vector + header + data) of `body_len` bytes
pub fn framed_size(body_len: usize) -> usize {
    if body_len + 2 > TWO_BYTE_LENGTH_LIMIT {
        body_len + 3
    } else {
        body_len + 2
    }
}

/// Encode the flags/length field for a PDU of `pdu_len` total bytes.
///
/// # Panics
///
/// If `pdu_len` exceeds [`MAX_PDU_LENGTH`].
pub fn encode_flags_length(flags: PduFlags, pdu_len: usize, buf: &mut BytesMut) {
    assert!(
        pdu_len <= MAX_PDU_LENGTH,
        "pdu length {} exceeds the 20-bit limit of {}",
        pdu_len,
        MAX_PDU_LENGTH
    );
    if pdu_len > TWO_BYTE_LENGTH_LIMIT {
        let flags = flags | PduFlags::LENGTH;
        buf.put_u8(flags.bits() | ((pdu_len >> 16) & 0x0F) as u8);
        buf.put_u16((pdu_len & 0xFFFF) as u16);
    } else {
        let flags = flags - PduFlags::LENGTH;
        buf.put_u8(flags.bits() | ((pdu_len >> 8) & 0x0F) as u8);
        buf.put_u8((pdu_len & 0xFF) as u8);
    }
}

/// Flags and length read from the front of a PDU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagsLength {
    /// PDU flags
    pub flags: PduFlags,
    /// Total PDU length including this field
    pub pdu_len: usize,
    /// Width of this field (2 or 3)
    pub field_len: usize,
}

impl FlagsLength {
    /// Decode the flags/length field and check it fits in `data`
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < 2 {
            return Err(WireError::Incomplete {
                needed: 2,
                available: data.len(),
            });
        }

        let flags = PduFlags::from_bits_truncate(data[0] & 0xF0);
        let (pdu_len, field_len) = if flags.contains(PduFlags::LENGTH) {
            if data.len() < 3 {
                return Err(WireError::Incomplete {
                    needed: 3,
                    available: data.len(),
                });
            }
            let len =
                ((data[0] as usize & 0x0F) << 16) | ((data[1] as usize) << 8) | data[2] as usize;
            (len, 3)
        } else {
            (((data[0] as usize & 0x0F) << 8) | data[1] as usize, 2)
        };

        if pdu_len < field_len || pdu_len > data.len() {
            return Err(WireError::Length {
                declared: pdu_len,
                available: data.len(),
            });
        }

        Ok(Self {
            flags,
            pdu_len,
            field_len,
        })
    }
}

/// Component identifier carried in the root layer header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cid(Uuid);

impl Cid {
    /// Generate a random CID
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Build a CID from raw bytes
    pub fn from_bytes(bytes: [u8; CID_SIZE]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// The nil CID (all zeroes)
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; CID_SIZE] {
        self.0.as_bytes()
    }

    /// Decode a CID from the front of `data`
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let bytes: [u8; CID_SIZE] = data
            .get(..CID_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(WireError::MalformedHeader)?;
        Ok(Self::from_bytes(bytes))
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Cid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Root layer header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootHeader {
    /// Sender's component identifier
    pub cid: Cid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_size_encode_decode() {
        let mut buf = BytesMut::new();
        VectorSize::One.encode(0x12, &mut buf);
        VectorSize::Two.encode(0x1234, &mut buf);
        VectorSize::Four.encode(0x1234_5678, &mut buf);
        assert_eq!(&buf[..], &[0x12, 0x12, 0x34, 0x12, 0x34, 0x56, 0x78]);

        assert_eq!(VectorSize::One.decode(&buf[0..]).unwrap(), 0x12);
        assert_eq!(VectorSize::Two.decode(&buf[1..]).unwrap(), 0x1234);
        assert_eq!(VectorSize::Four.decode(&buf[3..]).unwrap(), 0x1234_5678);
        assert_eq!(
            VectorSize::Four.decode(&buf[5..]),
            Err(WireError::MalformedHeader)
        );
    }

    #[test]
    #[should_panic(expected = "does not fit in 1 bytes")]
    fn test_vector_wider_than_field_panics() {
        let mut buf = BytesMut::new();
        VectorSize::One.encode(0x0102, &mut buf);
    }

    #[test]
    fn test_vector_at_field_limit() {
        let mut buf = BytesMut::new();
        VectorSize::One.encode(VectorSize::One.max_vector(), &mut buf);
        VectorSize::Two.encode(VectorSize::Two.max_vector(), &mut buf);
        assert_eq!(&buf[..], &[0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_flags_length_at_limit() {
        let mut buf = BytesMut::new();
        encode_flags_length(PduFlags::ENCODE, MAX_PDU_LENGTH, &mut buf);
        assert_eq!(&buf[..], &[0xFF, 0xFF, 0xFF]);
    }

    #[test]
    #[should_panic(expected = "exceeds the 20-bit limit")]
    fn test_flags_length_over_limit_panics() {
        let mut buf = BytesMut::new();
        encode_flags_length(PduFlags::ENCODE, MAX_PDU_LENGTH + 1, &mut buf);
    }

    #[test]
    fn test_short_flags_length() {
        let mut buf = BytesMut::new();
        encode_flags_length(PduFlags::ENCODE, 0x26, &mut buf);
        assert_eq!(&buf[..], &[0x70, 0x26]);

        let mut pdu = buf.to_vec();
        pdu.resize(0x26, 0);
        let decoded = FlagsLength::decode(&pdu).unwrap();
        assert_eq!(decoded.flags, PduFlags::ENCODE);
        assert_eq!(decoded.pdu_len, 0x26);
        assert_eq!(decoded.field_len, 2);
    }

    #[test]
    fn test_long_flags_length() {
        let mut buf = BytesMut::new();
        encode_flags_length(PduFlags::ENCODE, 0x1_2345, &mut buf);
        assert_eq!(&buf[..], &[0xF1, 0x23, 0x45]);

        let mut pdu = buf.to_vec();
        pdu.resize(0x1_2345, 0);
        let decoded = FlagsLength::decode(&pdu).unwrap();
        assert!(decoded.flags.contains(PduFlags::LENGTH));
        assert_eq!(decoded.pdu_len, 0x1_2345);
        assert_eq!(decoded.field_len, 3);
    }

    #[test]
    fn test_framed_size_switches_form() {
        assert_eq!(framed_size(0), 2);
        assert_eq!(framed_size(TWO_BYTE_LENGTH_LIMIT - 2), TWO_BYTE_LENGTH_LIMIT);
        assert_eq!(framed_size(TWO_BYTE_LENGTH_LIMIT - 1), TWO_BYTE_LENGTH_LIMIT + 2);
    }

    #[test]
    fn test_flags_length_rejects_bad_lengths() {
        assert!(matches!(
            FlagsLength::decode(&[0x70]),
            Err(WireError::Incomplete { .. })
        ));
        // declares 1 byte, smaller than the field itself
        assert!(matches!(
            FlagsLength::decode(&[0x70, 0x01]),
            Err(WireError::Length { .. })
        ));
        // declares 16 bytes, only 4 present
        assert!(matches!(
            FlagsLength::decode(&[0x70, 0x10, 0, 0]),
            Err(WireError::Length { .. })
        ));
    }

    #[test]
    fn test_cid_parse_and_bytes() {
        let cid: Cid = "5a1d0b6e-8c3f-4e2a-9b7d-0c1e2f3a4b5c".parse().unwrap();
        let decoded = Cid::decode(cid.as_bytes()).unwrap();
        assert_eq!(cid, decoded);
        assert_eq!(cid.to_string(), "5a1d0b6e-8c3f-4e2a-9b7d-0c1e2f3a4b5c");
        assert!(Cid::decode(&[0u8; 15]).is_err());
        assert_ne!(Cid::generate(), Cid::nil());
    }
}
