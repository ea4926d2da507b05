//! UDP transport for root layer packets.
//!
//! Every ACN datagram starts with a fixed 16-byte preamble. Sending prepends
//! it and receiving checks and strips it before the payload reaches the root
//! inflator.

use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use std::net::{SocketAddr, UdpSocket as StdUdpSocket};
use tokio::net::UdpSocket;
use tracing::{debug, trace, warn};

/// Well-known ACN / E1.31 UDP port
pub const ACN_PORT: u16 = 5568;

/// Size of the UDP preamble
pub const PREAMBLE_SIZE: usize = 16;

/// ACN packet identifier carried in the preamble
pub const ACN_PACKET_IDENTIFIER: [u8; 12] = *b"ASC-E1.17\0\0\0";

const PREAMBLE_LENGTH: u16 = 0x0010;
const POSTAMBLE_LENGTH: u16 = 0x0000;

/// Largest UDP payload over IPv4
const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Outbound half of a datagram transport
pub trait Transport {
    /// Send one serialized packet to `destination`
    fn send(&mut self, data: &[u8], destination: SocketAddr) -> bool;
}

/// Append the ACN UDP preamble to `buf`
pub fn write_preamble(buf: &mut BytesMut) {
    buf.put_u16(PREAMBLE_LENGTH);
    buf.put_u16(POSTAMBLE_LENGTH);
    buf.put_slice(&ACN_PACKET_IDENTIFIER);
}

/// Return the payload following a valid preamble
pub fn strip_preamble(datagram: &[u8]) -> Option<&[u8]> {
    if datagram.len() < PREAMBLE_SIZE {
        return None;
    }
    let preamble_len = u16::from_be_bytes([datagram[0], datagram[1]]);
    let postamble_len = u16::from_be_bytes([datagram[2], datagram[3]]);
    if preamble_len != PREAMBLE_LENGTH
        || postamble_len != POSTAMBLE_LENGTH
        || datagram[4..PREAMBLE_SIZE] != ACN_PACKET_IDENTIFIER
    {
        return None;
    }
    Some(&datagram[PREAMBLE_SIZE..])
}

/// UDP transport carrying root layer packets
#[derive(Debug)]
pub struct UdpTransport {
    socket: StdUdpSocket,
    send_buf: BytesMut,
}

impl UdpTransport {
    /// Bind a transport to `addr`
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = StdUdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        debug!("UDP transport bound to {}", socket.local_addr()?);
        Ok(Self {
            socket,
            send_buf: BytesMut::with_capacity(1024),
        })
    }

    /// Local address of the socket
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Create the receiving half. Must be called inside a tokio runtime.
    pub fn receiver(&self) -> io::Result<UdpReceiver> {
        let socket = UdpSocket::from_std(self.socket.try_clone()?)?;
        Ok(UdpReceiver {
            socket,
            buf: vec![0; MAX_DATAGRAM_SIZE],
        })
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, data: &[u8], destination: SocketAddr) -> bool {
        self.send_buf.clear();
        write_preamble(&mut self.send_buf);
        self.send_buf.put_slice(data);

        match self.socket.send_to(&self.send_buf, destination) {
            Ok(sent) if sent == self.send_buf.len() => {
                trace!("sent {} bytes to {}", sent, destination);
                true
            }
            Ok(sent) => {
                warn!(
                    "short send to {}: {} of {} bytes",
                    destination,
                    sent,
                    self.send_buf.len()
                );
                false
            }
            Err(e) => {
                warn!("send to {} failed: {}", destination, e);
                false
            }
        }
    }
}

/// Receiving half of a [`UdpTransport`]
#[derive(Debug)]
pub struct UdpReceiver {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl UdpReceiver {
    /// Wait for the next datagram with a valid preamble.
    ///
    /// Datagrams without one are logged and skipped.
    pub async fn recv(&mut self) -> io::Result<(Bytes, SocketAddr)> {
        loop {
            let (len, source) = self.socket.recv_from(&mut self.buf).await?;
            match strip_preamble(&self.buf[..len]) {
                Some(payload) => return Ok((Bytes::copy_from_slice(payload), source)),
                None => debug!(
                    "dropping {} byte datagram from {} without ACN preamble",
                    len, source
                ),
            }
        }
    }
}
