//! Stream transport the widgets send through.

use bytes::BytesMut;
use std::io::Write;
use tracing::warn;

use crate::frame::encode_message;

/// Outbound half of a labeled message stream
pub trait StreamTransport {
    /// Frame and send one message
    fn send_message(&mut self, label: u8, data: &[u8]) -> bool;
}

/// Stream transport over any byte writer, e.g. an opened serial device
#[derive(Debug)]
pub struct WriterTransport<W: Write> {
    writer: W,
    buf: BytesMut,
}

impl<W: Write> WriterTransport<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buf: BytesMut::with_capacity(64),
        }
    }

    /// The wrapped writer
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Unwrap the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> StreamTransport for WriterTransport<W> {
    fn send_message(&mut self, label: u8, data: &[u8]) -> bool {
        self.buf.clear();
        if let Err(e) = encode_message(label, data, &mut self.buf) {
            warn!("cannot frame label {}: {}", label, e);
            return false;
        }

        match self
            .writer
            .write_all(&self.buf)
            .and_then(|()| self.writer.flush())
        {
            Ok(()) => true,
            Err(e) => {
                warn!("write of label {} failed: {}", label, e);
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::StreamTransport;

    /// Records messages, or refuses them all when `fail` is set
    #[derive(Debug, Default)]
    pub(crate) struct RecordingTransport {
        pub(crate) sent: Vec<(u8, Vec<u8>)>,
        pub(crate) fail: bool,
    }

    impl StreamTransport for RecordingTransport {
        fn send_message(&mut self, label: u8, data: &[u8]) -> bool {
            if self.fail {
                return false;
            }
            self.sent.push((label, data.to_vec()));
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_transport_frames_messages() {
        let mut transport = WriterTransport::new(Vec::new());
        assert!(transport.send_message(10, &[]));
        assert!(transport.send_message(3, &[0, 0]));
        assert_eq!(
            transport.into_inner(),
            vec![0x7E, 10, 0, 0, 0xE7, 0x7E, 3, 2, 0, 0, 0, 0xE7]
        );
    }

    #[test]
    fn test_writer_transport_reports_failures() {
        let mut transport = WriterTransport::new(BrokenWriter);
        assert!(!transport.send_message(6, &[0]));

        let mut transport = WriterTransport::new(Vec::new());
        assert!(!transport.send_message(6, &[0u8; 601]));
        assert!(transport.get_ref().is_empty());
    }
}
