//! Root layer send path, decode entry point and UDP transport for ACN.
//!
//! This crate ties the PDU model from `acn-wire` to a datagram transport: the
//! [`RootLayer`] wraps application blocks in a root PDU carrying the local
//! CID, serializes them into one buffer and hands them to a [`Transport`];
//! incoming datagrams go the other way through the root inflator.
//!
//! ## Features
//!
//! - **Transport abstraction**: anything implementing [`Transport`] can carry
//!   root layer packets
//! - **UDP transport**: ACN preamble handling on port 5568
//! - **Single-buffer sends**: one contiguous serialization per packet
//!
//! ## Example
//!
//! ```rust,no_run
//! use acn_root::{RootLayer, UdpTransport, ACN_PORT};
//! use acn_wire::{Cid, DataPdu, HeaderSet, PayloadHandler, VectorSize, VECTOR_ROOT_E131_DATA};
//! use std::net::SocketAddr;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let transport = UdpTransport::bind(SocketAddr::from(([0, 0, 0, 0], ACN_PORT)))?;
//! let mut receiver = transport.receiver()?;
//! let mut layer = RootLayer::new(transport, Cid::generate());
//!
//! layer.add_inflator(Box::new(PayloadHandler::new(
//!     VECTOR_ROOT_E131_DATA,
//!     |headers: &HeaderSet, data: &[u8]| {
//!         println!("{} bytes from {:?}", data.len(), headers.root_header());
//!     },
//! )))?;
//!
//! let payload = DataPdu::new(VectorSize::Four, 0x02, b"levels");
//! layer.send_pdu("239.255.0.1:5568".parse()?, VECTOR_ROOT_E131_DATA, &payload)?;
//!
//! let (datagram, source) = receiver.recv().await?;
//! layer.handle_datagram(&datagram, source);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod layer;
pub mod transport;

// Re-export main types
pub use error::RootError;
pub use layer::RootLayer;
pub use transport::{
    strip_preamble, write_preamble, Transport, UdpReceiver, UdpTransport, ACN_PACKET_IDENTIFIER,
    ACN_PORT, PREAMBLE_SIZE,
};
