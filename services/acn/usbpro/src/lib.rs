//! USB Pro family widget support.
//!
//! Widgets talk over a serial stream of labeled messages. Requests carry no
//! id, so replies are matched to callbacks per label in FIFO order by a
//! [`ReplyQueue`]. [`UsbProWidget`] implements the commands common to the
//! family and [`ArduinoDmxUsbWidget`] layers its multi-port extensions on top.
//!
//! ## Example
//!
//! ```rust,no_run
//! use acn_usbpro::{ArduinoDmxUsbWidget, MessageDecoder, WriterTransport};
//! use bytes::BytesMut;
//! use std::fs::OpenOptions;
//! use std::io::Read;
//!
//! # fn example() -> std::io::Result<()> {
//! let device = OpenOptions::new().read(true).write(true).open("/dev/ttyACM0")?;
//! let mut reader = device.try_clone()?;
//! let mut widget = ArduinoDmxUsbWidget::new(WriterTransport::new(device));
//!
//! widget.get_extended_parameters(|result| match result {
//!     Ok(ports) => println!("{} outputs", ports.output_ports),
//!     Err(e) => eprintln!("request failed: {}", e),
//! });
//!
//! let mut decoder = MessageDecoder::new();
//! let mut buf = BytesMut::new();
//! let mut chunk = [0u8; 256];
//! let n = reader.read(&mut chunk)?;
//! buf.extend_from_slice(&chunk[..n]);
//! while let Some(message) = decoder.decode(&mut buf) {
//!     widget.handle_message(message.label, &message.data);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arduino;
pub mod error;
pub mod frame;
pub mod queue;
pub mod transport;
pub mod widget;

// Re-export main types
pub use arduino::{
    ArduinoDmxUsbWidget, ExtendedParameters, DMX_START_PORT, EXTENDED_PARAMETERS_LABEL,
};
pub use error::WidgetError;
pub use frame::{
    encode_message, Message, MessageDecoder, END_OF_MESSAGE, MAX_DATA_SIZE, START_OF_MESSAGE,
};
pub use queue::{Reply, ReplyCallback, ReplyQueue};
pub use transport::{StreamTransport, WriterTransport};
pub use widget::{
    DmxFrame, SerialNumber, UsbProParameters, UsbProWidget, DMX512_START_CODE, DMX_UNIVERSE_SIZE,
    PARAMETERS_LABEL, RECEIVED_DMX_LABEL, SEND_DMX_LABEL, SERIAL_LABEL,
};
