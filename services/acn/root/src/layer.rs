//! The root layer: wraps outgoing blocks in a root PDU and feeds incoming
//! datagrams to the root inflator.

use acn_wire::{
    Cid, HeaderSet, Inflator, Pdu, PduBlock, RootInflator, RootPdu, WireError, MAX_PDU_LENGTH,
};
use bytes::BytesMut;
use std::net::SocketAddr;
use tracing::{debug, trace, warn};

use crate::error::RootError;
use crate::transport::Transport;

/// Root layer for one component.
///
/// Sends reuse a single scratch buffer, which is why they take `&mut self`.
pub struct RootLayer<T: Transport> {
    transport: Option<T>,
    cid: Cid,
    root_inflator: RootInflator,
    send_buf: BytesMut,
}

impl<T: Transport> RootLayer<T> {
    /// Create a root layer sending through `transport` as `cid`
    pub fn new(transport: T, cid: Cid) -> Self {
        Self {
            transport: Some(transport),
            ..Self::without_transport(cid)
        }
    }

    /// Create a root layer that can decode but has nowhere to send
    pub fn without_transport(cid: Cid) -> Self {
        Self {
            transport: None,
            cid,
            root_inflator: RootInflator::root(),
            send_buf: BytesMut::with_capacity(1024),
        }
    }

    /// Our component identifier
    pub fn cid(&self) -> Cid {
        self.cid
    }

    /// The configured transport
    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    /// Mutable access to the configured transport
    pub fn transport_mut(&mut self) -> Option<&mut T> {
        self.transport.as_mut()
    }

    /// Register an inflator for a root vector
    pub fn add_inflator(&mut self, inflator: Box<dyn Inflator>) -> Result<(), RootError> {
        self.root_inflator.add_inflator(inflator)?;
        Ok(())
    }

    /// Wrap a single PDU in a root PDU and send it
    pub fn send_pdu(
        &mut self,
        destination: SocketAddr,
        vector: u32,
        pdu: &dyn Pdu,
    ) -> Result<(), RootError> {
        let mut block: PduBlock = PduBlock::with_capacity(1);
        block.add_pdu(pdu);
        self.send_pdu_block(destination, vector, &block)
    }

    /// Wrap a block in a root PDU and send it
    pub fn send_pdu_block(
        &mut self,
        destination: SocketAddr,
        vector: u32,
        block: &PduBlock<'_>,
    ) -> Result<(), RootError> {
        let Some(transport) = self.transport.as_mut() else {
            warn!("transport is not configured, dropping root pdu for {}", destination);
            return Err(RootError::TransportUnavailable);
        };

        let root_pdu = RootPdu::new(self.cid, vector).with_block(block);
        let size = root_pdu.size();
        if size > MAX_PDU_LENGTH {
            return Err(WireError::Size(size).into());
        }

        let mut root_block: PduBlock = PduBlock::with_capacity(1);
        root_block.add_pdu(&root_pdu);

        self.send_buf.clear();
        let written = root_block.pack(&mut self.send_buf);
        trace!(
            "root pdu for {}: vector {:#x}, block {} bytes, packet {} bytes",
            destination,
            vector,
            block.size(),
            written
        );

        if transport.send(&self.send_buf, destination) {
            Ok(())
        } else {
            debug!("transport send to {} failed", destination);
            Err(RootError::SendFailed(destination))
        }
    }

    /// Decode a datagram payload (preamble already stripped)
    pub fn handle_datagram(&mut self, data: &[u8], source: SocketAddr) -> usize {
        let mut headers = HeaderSet::with_source(source);
        self.root_inflator.inflate_pdu_block(&mut headers, data)
    }
}
