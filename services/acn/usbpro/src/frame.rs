//! Message framing on the widget's serial stream.
//!
//! ```text
//! +------+-------+-----------------+----------+------+
//! | 0x7E | label | len (u16 LE)    | data     | 0xE7 |
//! +------+-------+-----------------+----------+------+
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{trace, warn};

use crate::WidgetError;

/// Start of message marker
pub const START_OF_MESSAGE: u8 = 0x7E;

/// End of message marker
pub const END_OF_MESSAGE: u8 = 0xE7;

/// Largest data section a widget accepts
pub const MAX_DATA_SIZE: usize = 600;

/// Start marker, label and length
pub const HEADER_SIZE: usize = 4;

/// One labeled message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message label
    pub label: u8,
    /// Message data
    pub data: Bytes,
}

/// Append a framed message to `buf`, returning the frame length
pub fn encode_message(label: u8, data: &[u8], buf: &mut BytesMut) -> Result<usize, WidgetError> {
    if data.len() > MAX_DATA_SIZE {
        return Err(WidgetError::Size(data.len()));
    }

    let frame_len = HEADER_SIZE + data.len() + 1;
    buf.reserve(frame_len);
    buf.put_u8(START_OF_MESSAGE);
    buf.put_u8(label);
    buf.put_u16_le(data.len() as u16);
    buf.put_slice(data);
    buf.put_u8(END_OF_MESSAGE);
    Ok(frame_len)
}

/// Streaming decoder for widget messages
#[derive(Debug)]
pub struct MessageDecoder {
    max_data_size: usize,
}

impl MessageDecoder {
    /// Create a decoder with the standard size limit
    pub fn new() -> Self {
        Self {
            max_data_size: MAX_DATA_SIZE,
        }
    }

    /// Decode one message from the front of `buf`.
    ///
    /// Returns `None` until a complete frame is buffered. Bytes before a start
    /// marker and frames without a valid end marker are discarded.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Option<Message> {
        loop {
            match buf.iter().position(|b| *b == START_OF_MESSAGE) {
                Some(0) => {}
                Some(skip) => {
                    trace!("skipping {} bytes before start of message", skip);
                    buf.advance(skip);
                }
                None => {
                    buf.clear();
                    return None;
                }
            }

            if buf.len() < HEADER_SIZE {
                return None;
            }

            let label = buf[1];
            let data_len = u16::from_le_bytes([buf[2], buf[3]]) as usize;
            if data_len > self.max_data_size {
                warn!("label {} declares {} bytes, resynchronizing", label, data_len);
                buf.advance(1);
                continue;
            }

            let frame_len = HEADER_SIZE + data_len + 1;
            if buf.len() < frame_len {
                return None;
            }

            if buf[frame_len - 1] != END_OF_MESSAGE {
                warn!("label {} missing end of message, resynchronizing", label);
                buf.advance(1);
                continue;
            }

            buf.advance(HEADER_SIZE);
            let data = buf.split_to(data_len).freeze();
            buf.advance(1);
            return Some(Message { label, data });
        }
    }
}

impl Default for MessageDecoder {
    fn default() -> Self {
        Self::new()
    }
}
