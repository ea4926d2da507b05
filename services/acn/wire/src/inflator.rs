//! Decode-side dispatch chain.
//!
//! An inflator consumes a block of PDUs for one layer. [`LayerInflator`] walks
//! the block PDU by PDU, decodes the vector and the layer header, and hands
//! each PDU's data to the child inflator registered for its vector. Children
//! can be further `LayerInflator`s, which mirrors the nesting on the encode
//! side, or [`PayloadHandler`]s at the leaves.
//!
//! Decode errors never propagate: a PDU with a known length but a bad header
//! or an unregistered vector is logged and skipped, while a PDU whose length
//! cannot be read ends the block.

use smallvec::SmallVec;
use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::{debug, error, trace, warn};

use crate::header::{Cid, FlagsLength, PduFlags, RootHeader, VectorSize, CID_SIZE};
use crate::root::ROOT_VECTOR_SIZE;
use crate::WireError;

/// Headers collected while walking down the layers
#[derive(Debug, Clone, Default)]
pub struct HeaderSet {
    source: Option<SocketAddr>,
    root: Option<RootHeader>,
    vectors: SmallVec<[u32; 4]>,
}

impl HeaderSet {
    /// Create an empty header set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a header set for a datagram received from `source`
    pub fn with_source(source: SocketAddr) -> Self {
        Self {
            source: Some(source),
            ..Self::default()
        }
    }

    /// Transport source address, if known
    pub fn source(&self) -> Option<SocketAddr> {
        self.source
    }

    /// Root layer header, once decoded
    pub fn root_header(&self) -> Option<&RootHeader> {
        self.root.as_ref()
    }

    /// Record the root layer header
    pub fn set_root_header(&mut self, header: RootHeader) {
        self.root = Some(header);
    }

    /// Vectors of the enclosing PDUs, outermost first
    pub fn vectors(&self) -> &[u32] {
        &self.vectors
    }
}

/// A decoder for one block of PDUs
pub trait Inflator: Send {
    /// Vector this inflator is registered under in its parent
    fn id(&self) -> u32;

    /// Decode a block of PDUs and return the number of bytes consumed
    fn inflate_pdu_block(&mut self, headers: &mut HeaderSet, data: &[u8]) -> usize;
}

/// Vector-keyed registry of child inflators
#[derive(Default)]
pub struct InflatorTable {
    inflators: HashMap<u32, Box<dyn Inflator>>,
}

impl InflatorTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an inflator under its own vector.
    ///
    /// A second inflator for the same vector is rejected and the first one
    /// stays registered.
    pub fn add(&mut self, inflator: Box<dyn Inflator>) -> Result<(), WireError> {
        let vector = inflator.id();
        if self.contains(vector) {
            error!(vector, "inflator already registered");
            return Err(WireError::VectorAlreadyRegistered(vector));
        }

        self.inflators.insert(vector, inflator);
        debug!(vector, "registered inflator");
        Ok(())
    }

    /// Look up the inflator for a vector
    pub fn get_mut(&mut self, vector: u32) -> Option<&mut (dyn Inflator + 'static)> {
        self.inflators.get_mut(&vector).map(|inflator| inflator.as_mut())
    }

    /// Whether a vector has an inflator
    pub fn contains(&self, vector: u32) -> bool {
        self.inflators.contains_key(&vector)
    }

    /// Number of registered inflators
    pub fn len(&self) -> usize {
        self.inflators.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.inflators.is_empty()
    }
}

/// Decodes a layer's fixed-size header
pub trait HeaderCodec: Send {
    /// Decoded header
    type Header: Clone + Send;

    /// Encoded header size in bytes
    fn header_size(&self) -> usize;

    /// Decode a header from exactly `header_size()` bytes
    fn decode(&self, data: &[u8]) -> Result<Self::Header, WireError>;

    /// Record the header in the set passed down to children
    fn apply(&self, headers: &mut HeaderSet, header: &Self::Header);
}

/// Codec for layers without a header
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHeader;

impl HeaderCodec for NoHeader {
    type Header = ();

    fn header_size(&self) -> usize {
        0
    }

    fn decode(&self, _data: &[u8]) -> Result<(), WireError> {
        Ok(())
    }

    fn apply(&self, _headers: &mut HeaderSet, _header: &()) {}
}

/// Codec for the root layer header (the CID)
#[derive(Debug, Clone, Copy, Default)]
pub struct RootHeaderCodec;

impl HeaderCodec for RootHeaderCodec {
    type Header = RootHeader;

    fn header_size(&self) -> usize {
        CID_SIZE
    }

    fn decode(&self, data: &[u8]) -> Result<RootHeader, WireError> {
        Ok(RootHeader {
            cid: Cid::decode(data)?,
        })
    }

    fn apply(&self, headers: &mut HeaderSet, header: &RootHeader) {
        headers.set_root_header(*header);
    }
}

/// Fields a PDU may inherit from the previous sibling in its block
struct Inherited<'d, H> {
    vector: Option<u32>,
    header: Option<H>,
    data: Option<&'d [u8]>,
}

impl<H> Inherited<'_, H> {
    fn new() -> Self {
        Self {
            vector: None,
            header: None,
            data: None,
        }
    }
}

/// Generic block decoder for one layer
pub struct LayerInflator<H: HeaderCodec> {
    id: u32,
    vector_size: VectorSize,
    codec: H,
    children: InflatorTable,
}

/// Top-level inflator for root layer PDUs
pub type RootInflator = LayerInflator<RootHeaderCodec>;

impl LayerInflator<RootHeaderCodec> {
    /// Create the root layer inflator
    pub fn root() -> Self {
        Self::new(0, ROOT_VECTOR_SIZE, RootHeaderCodec)
    }
}

impl<H: HeaderCodec> LayerInflator<H> {
    /// Create an inflator registered under `id` whose PDUs use `vector_size` vectors
    pub fn new(id: u32, vector_size: VectorSize, codec: H) -> Self {
        Self {
            id,
            vector_size,
            codec,
            children: InflatorTable::new(),
        }
    }

    /// Register a child inflator
    pub fn add_inflator(&mut self, inflator: Box<dyn Inflator>) -> Result<(), WireError> {
        self.children.add(inflator)
    }

    /// Registered children
    pub fn children(&self) -> &InflatorTable {
        &self.children
    }

    fn inflate_pdu<'d>(
        &mut self,
        headers: &mut HeaderSet,
        pdu: &'d [u8],
        flags_length: FlagsLength,
        inherited: &mut Inherited<'d, H::Header>,
    ) -> Result<(), WireError> {
        let mut body = &pdu[flags_length.field_len..flags_length.pdu_len];

        let vector = if flags_length.flags.contains(PduFlags::VECTOR) {
            let vector = self.vector_size.decode(body)?;
            body = &body[self.vector_size.len()..];
            vector
        } else {
            inherited.vector.ok_or(WireError::MalformedHeader)?
        };
        inherited.vector = Some(vector);

        let header_size = self.codec.header_size();
        let header = if flags_length.flags.contains(PduFlags::HEADER) || header_size == 0 {
            let raw = body.get(..header_size).ok_or(WireError::MalformedHeader)?;
            let header = self.codec.decode(raw)?;
            body = &body[header_size..];
            header
        } else {
            inherited.header.clone().ok_or(WireError::MalformedHeader)?
        };
        inherited.header = Some(header.clone());

        let data = if flags_length.flags.contains(PduFlags::DATA) {
            body
        } else {
            inherited.data.ok_or(WireError::MalformedHeader)?
        };
        inherited.data = Some(data);

        let child = self
            .children
            .get_mut(vector)
            .ok_or(WireError::UnknownVector(vector))?;

        self.codec.apply(headers, &header);
        headers.vectors.push(vector);
        let consumed = child.inflate_pdu_block(headers, data);
        headers.vectors.pop();

        if consumed != data.len() {
            debug!(
                layer = self.id,
                vector,
                consumed,
                len = data.len(),
                "child inflator did not consume the whole pdu"
            );
        }
        Ok(())
    }
}

impl<H: HeaderCodec> Inflator for LayerInflator<H> {
    fn id(&self) -> u32 {
        self.id
    }

    fn inflate_pdu_block(&mut self, headers: &mut HeaderSet, data: &[u8]) -> usize {
        let mut offset = 0;
        let mut inherited = Inherited::new();

        while offset < data.len() {
            let flags_length = match FlagsLength::decode(&data[offset..]) {
                Ok(flags_length) => flags_length,
                Err(e) => {
                    warn!(
                        layer = self.id,
                        offset,
                        error = %e,
                        "cannot read pdu length, abandoning rest of block"
                    );
                    break;
                }
            };

            let pdu = &data[offset..offset + flags_length.pdu_len];
            match self.inflate_pdu(headers, pdu, flags_length, &mut inherited) {
                Ok(()) => {}
                Err(WireError::UnknownVector(vector)) => {
                    warn!(
                        layer = self.id,
                        vector,
                        "no inflator for vector, dropping pdu"
                    );
                }
                Err(e) => {
                    warn!(layer = self.id, offset, error = %e, "skipping malformed pdu");
                }
            }
            offset += flags_length.pdu_len;
        }

        trace!(layer = self.id, consumed = offset, len = data.len(), "inflated pdu block");
        offset
    }
}

/// Leaf inflator handing each PDU's data to a closure
pub struct PayloadHandler<F> {
    id: u32,
    handler: F,
}

impl<F> PayloadHandler<F>
where
    F: FnMut(&HeaderSet, &[u8]) + Send,
{
    /// Create a handler registered under `id`
    pub fn new(id: u32, handler: F) -> Self {
        Self { id, handler }
    }
}

impl<F> Inflator for PayloadHandler<F>
where
    F: FnMut(&HeaderSet, &[u8]) + Send,
{
    fn id(&self) -> u32 {
        self.id
    }

    fn inflate_pdu_block(&mut self, headers: &mut HeaderSet, data: &[u8]) -> usize {
        (self.handler)(headers, data);
        data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::PduBlock;
    use crate::pdu::{pack, DataPdu, Pdu};
    use crate::root::{RootPdu, VECTOR_ROOT_E131_DATA};
    use bytes::BytesMut;
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(Vec<u32>, Option<Cid>, Vec<u8>)>>>;

    fn recorder(id: u32) -> (Box<dyn Inflator>, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler = PayloadHandler::new(id, move |headers: &HeaderSet, data: &[u8]| {
            sink.lock().unwrap().push((
                headers.vectors().to_vec(),
                headers.root_header().map(|h| h.cid),
                data.to_vec(),
            ));
        });
        (Box::new(handler), seen)
    }

    fn root_packet(cid: Cid, vector: u32, block: &PduBlock<'_>) -> BytesMut {
        let root = RootPdu::new(cid, vector).with_block(block);
        let mut buf = BytesMut::new();
        pack(&root, &mut buf);
        buf
    }

    #[test]
    fn test_root_round_trip_through_nested_layer() {
        let cid = Cid::generate();
        let leaf = DataPdu::new(VectorSize::One, 0x02, b"payload bytes");
        let mut inner: PduBlock = PduBlock::new();
        inner.add_pdu(&leaf);

        let (handler, seen) = recorder(0x02);
        let mut layer = LayerInflator::new(VECTOR_ROOT_E131_DATA, VectorSize::One, NoHeader);
        layer.add_inflator(handler).unwrap();

        let mut root = RootInflator::root();
        root.add_inflator(Box::new(layer)).unwrap();

        let packet = root_packet(cid, VECTOR_ROOT_E131_DATA, &inner);
        let consumed = root.inflate_pdu_block(&mut HeaderSet::new(), &packet);
        assert_eq!(consumed, packet.len());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, vec![VECTOR_ROOT_E131_DATA, 0x02]);
        assert_eq!(seen[0].1, Some(cid));
        assert_eq!(seen[0].2, b"payload bytes".to_vec());
    }

    #[test]
    fn test_root_data_reaches_handler_unchanged() {
        let app = DataPdu::new(VectorSize::Four, 0x77, b"\x00\x01\x02\xff");
        let mut block: PduBlock = PduBlock::new();
        block.add_pdu(&app);

        let (handler, seen) = recorder(VECTOR_ROOT_E131_DATA);
        let mut root = RootInflator::root();
        root.add_inflator(handler).unwrap();

        let packet = root_packet(Cid::nil(), VECTOR_ROOT_E131_DATA, &block);
        root.inflate_pdu_block(&mut HeaderSet::new(), &packet);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(&seen[0].2[..], &block.to_bytes()[..]);
    }

    #[test]
    fn test_unknown_vector_is_dropped() {
        let (handler, seen) = recorder(VECTOR_ROOT_E131_DATA);
        let mut root = RootInflator::root();
        root.add_inflator(handler).unwrap();

        let empty: PduBlock = PduBlock::new();
        let unknown = root_packet(Cid::nil(), 0x99, &empty);
        assert_eq!(
            root.inflate_pdu_block(&mut HeaderSet::new(), &unknown),
            unknown.len()
        );
        assert!(seen.lock().unwrap().is_empty());

        let known = root_packet(Cid::nil(), VECTOR_ROOT_E131_DATA, &empty);
        root.inflate_pdu_block(&mut HeaderSet::new(), &known);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_sibling_does_not_stop_block() {
        let (handler, seen) = recorder(2);
        let mut layer = LayerInflator::new(1, VectorSize::One, NoHeader);
        layer.add_inflator(handler).unwrap();

        let unknown = DataPdu::new(VectorSize::One, 9, b"ignored");
        let known = DataPdu::new(VectorSize::One, 2, b"kept");
        let mut block: PduBlock = PduBlock::new();
        block.add_pdu(&unknown);
        block.add_pdu(&known);
        let bytes = block.to_bytes();

        assert_eq!(
            layer.inflate_pdu_block(&mut HeaderSet::new(), &bytes),
            bytes.len()
        );
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].2, b"kept".to_vec());
    }

    #[test]
    fn test_duplicate_vector_rejected() {
        let (first, first_seen) = recorder(5);
        let (second, second_seen) = recorder(5);

        let mut layer = LayerInflator::new(1, VectorSize::One, NoHeader);
        layer.add_inflator(first).unwrap();
        assert_eq!(
            layer.add_inflator(second).unwrap_err(),
            WireError::VectorAlreadyRegistered(5)
        );
        assert_eq!(layer.children().len(), 1);
        assert!(layer.children().contains(5));
        assert!(!layer.children().contains(6));

        let pdu = DataPdu::new(VectorSize::One, 5, b"x");
        let mut buf = BytesMut::new();
        pack(&pdu, &mut buf);
        layer.inflate_pdu_block(&mut HeaderSet::new(), &buf);

        assert_eq!(first_seen.lock().unwrap().len(), 1);
        assert!(second_seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_short_header_skips_only_that_pdu() {
        let (handler, seen) = recorder(VECTOR_ROOT_E131_DATA);
        let mut root = RootInflator::root();
        root.add_inflator(handler).unwrap();

        // vector present but the CID is cut short; the length is still valid
        let mut packet = BytesMut::new();
        packet.extend_from_slice(&[0x70, 0x0A, 0x00, 0x00, 0x00, 0x04, 1, 2, 3, 4]);
        let empty: PduBlock = PduBlock::new();
        let good = RootPdu::new(Cid::nil(), VECTOR_ROOT_E131_DATA).with_block(&empty);
        pack(&good, &mut packet);

        assert_eq!(
            root.inflate_pdu_block(&mut HeaderSet::new(), &packet),
            packet.len()
        );
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_bad_length_abandons_block() {
        let (handler, seen) = recorder(3);
        let mut layer = LayerInflator::new(1, VectorSize::One, NoHeader);
        layer.add_inflator(handler).unwrap();

        let good = DataPdu::new(VectorSize::One, 3, b"ok");
        let mut buf = BytesMut::new();
        pack(&good, &mut buf);
        let good_len = buf.len();
        // declares 0x40 bytes, far more than what follows
        buf.extend_from_slice(&[0x70, 0x40, 0x03, 0x00]);
        pack(&good, &mut buf);

        assert_eq!(layer.inflate_pdu_block(&mut HeaderSet::new(), &buf), good_len);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_inherited_vector_and_header() {
        let (handler, seen) = recorder(VECTOR_ROOT_E131_DATA);
        let mut root = RootInflator::root();
        root.add_inflator(handler).unwrap();

        let cid = Cid::from_bytes([7; 16]);
        let mut packet = BytesMut::new();
        let empty: PduBlock = PduBlock::new();
        pack(
            &RootPdu::new(cid, VECTOR_ROOT_E131_DATA).with_block(&empty),
            &mut packet,
        );
        // data flag only: vector and CID come from the previous sibling
        packet.extend_from_slice(&[0x10, 0x05, b'a', b'b', b'c']);

        assert_eq!(
            root.inflate_pdu_block(&mut HeaderSet::new(), &packet),
            packet.len()
        );
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].1, Some(cid));
        assert_eq!(seen[1].2, b"abc".to_vec());
    }

    #[test]
    fn test_inherit_without_previous_is_skipped() {
        let (handler, seen) = recorder(VECTOR_ROOT_E131_DATA);
        let mut root = RootInflator::root();
        root.add_inflator(handler).unwrap();

        let packet = [0x10, 0x03, b'z'];
        assert_eq!(root.inflate_pdu_block(&mut HeaderSet::new(), &packet), 3);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_multiple_siblings_all_dispatched() {
        let (handler, seen) = recorder(8);
        let mut layer = LayerInflator::new(1, VectorSize::Two, NoHeader);
        layer.add_inflator(handler).unwrap();

        let letters: &'static [u8] = b"abcd";
        let pdus: Vec<DataPdu> = (0..letters.len())
            .map(|i| DataPdu::new(VectorSize::Two, 8, &letters[i..i + 1]))
            .collect();
        let mut block: PduBlock = PduBlock::new();
        for pdu in &pdus {
            block.add_pdu(pdu);
        }
        let bytes = block.to_bytes();
        assert_eq!(bytes.len(), pdus.iter().map(Pdu::size).sum::<usize>());

        layer.inflate_pdu_block(&mut HeaderSet::new(), &bytes);
        let data: Vec<Vec<u8>> = seen.lock().unwrap().iter().map(|s| s.2.clone()).collect();
        assert_eq!(data, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]);
    }
}
