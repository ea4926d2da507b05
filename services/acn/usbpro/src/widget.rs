//! Commands shared by every widget in the USB Pro family.

use std::fmt;
use tracing::{debug, trace, warn};

use crate::queue::{Reply, ReplyQueue};
use crate::transport::StreamTransport;
use crate::WidgetError;

/// Received DMX frames
pub const RECEIVED_DMX_LABEL: u8 = 5;

/// Widget parameter request and reply
pub const PARAMETERS_LABEL: u8 = 3;

/// Outbound DMX
pub const SEND_DMX_LABEL: u8 = 6;

/// Serial number request and reply
pub const SERIAL_LABEL: u8 = 10;

/// Channels in a DMX universe
pub const DMX_UNIVERSE_SIZE: usize = 512;

/// Null start code for dimmer data
pub const DMX512_START_CODE: u8 = 0;

/// Widget timing parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsbProParameters {
    /// Firmware version
    pub firmware: u16,
    /// Break time in 10.67us units
    pub break_time: u8,
    /// Mark after break in 10.67us units
    pub mab_time: u8,
    /// Output rate in packets per second
    pub rate: u8,
}

impl Reply for UsbProParameters {
    const SIZE: usize = 5;

    fn parse(data: &[u8]) -> Self {
        Self {
            firmware: u16::from_le_bytes([data[0], data[1]]),
            break_time: data[2],
            mab_time: data[3],
            rate: data[4],
        }
    }
}

/// Widget serial number, as sent on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerialNumber(pub [u8; 4]);

impl Reply for SerialNumber {
    const SIZE: usize = 4;

    fn parse(data: &[u8]) -> Self {
        Self([data[0], data[1], data[2], data[3]])
    }
}

impl fmt::Display for SerialNumber {
    // BCD digits, least significant byte first
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter().rev() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// A DMX frame received by the widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmxFrame<'a> {
    /// Receive status, non-zero on overrun or queue overflow
    pub status: u8,
    /// Start code
    pub start_code: u8,
    /// Channel data
    pub data: &'a [u8],
}

type DmxCallback = Box<dyn FnMut(DmxFrame<'_>) + Send>;

/// Generic USB Pro widget
pub struct UsbProWidget<T: StreamTransport> {
    params: ReplyQueue<UsbProParameters>,
    serial: ReplyQueue<SerialNumber>,
    dmx_callback: Option<DmxCallback>,
    transport: T,
}

impl<T: StreamTransport> UsbProWidget<T> {
    /// Create a widget sending through `transport`
    pub fn new(transport: T) -> Self {
        Self {
            params: ReplyQueue::new(PARAMETERS_LABEL),
            serial: ReplyQueue::new(SERIAL_LABEL),
            dmx_callback: None,
            transport,
        }
    }

    /// The stream transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable stream transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Send a universe on the standard DMX label
    pub fn send_dmx(&mut self, data: &[u8]) -> Result<(), WidgetError> {
        self.send_dmx_with_label(SEND_DMX_LABEL, data)
    }

    /// Send start code 0 and up to one universe of channels on `label`.
    /// Channels past the universe size are dropped.
    pub fn send_dmx_with_label(&mut self, label: u8, data: &[u8]) -> Result<(), WidgetError> {
        let channels = data.len().min(DMX_UNIVERSE_SIZE);
        if channels < data.len() {
            debug!("truncating {} channels to {}", data.len(), channels);
        }

        let mut payload = [0u8; DMX_UNIVERSE_SIZE + 1];
        payload[0] = DMX512_START_CODE;
        payload[1..=channels].copy_from_slice(&data[..channels]);

        if self.transport.send_message(label, &payload[..=channels]) {
            Ok(())
        } else {
            Err(WidgetError::SendFailed(label))
        }
    }

    /// Request the widget parameters
    pub fn get_parameters<F>(&mut self, callback: F)
    where
        F: FnOnce(Result<UsbProParameters, WidgetError>) + Send + 'static,
    {
        let user_size = 0u16.to_le_bytes();
        self.params
            .issue_request(&mut self.transport, &user_size, callback);
    }

    /// Request the widget serial number
    pub fn get_serial<F>(&mut self, callback: F)
    where
        F: FnOnce(Result<SerialNumber, WidgetError>) + Send + 'static,
    {
        self.serial.issue_request(&mut self.transport, &[], callback);
    }

    /// Deliver received DMX frames to `callback`
    pub fn set_dmx_callback<F>(&mut self, callback: F)
    where
        F: FnMut(DmxFrame<'_>) + Send + 'static,
    {
        self.dmx_callback = Some(Box::new(callback));
    }

    /// Requests waiting for a reply
    pub fn outstanding(&self) -> usize {
        self.params.len() + self.serial.len()
    }

    /// Handle one message read from the widget
    pub fn handle_message(&mut self, label: u8, data: &[u8]) {
        let result = match label {
            PARAMETERS_LABEL => self.params.on_reply(data),
            SERIAL_LABEL => self.serial.on_reply(data),
            RECEIVED_DMX_LABEL => {
                self.handle_dmx(data);
                Ok(())
            }
            _ => {
                debug!("ignoring message with label {} ({} bytes)", label, data.len());
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!("discarding reply: {}", e);
        }
    }

    fn handle_dmx(&mut self, data: &[u8]) {
        let [status, start_code, channels @ ..] = data else {
            warn!("received dmx frame too short: {} bytes", data.len());
            return;
        };

        match self.dmx_callback.as_mut() {
            Some(callback) => callback(DmxFrame {
                status: *status,
                start_code: *start_code,
                data: channels,
            }),
            None => trace!("no dmx callback, dropping {} channels", channels.len()),
        }
    }

    /// Fail every outstanding request
    pub fn stop(&mut self) {
        let failed = self.params.drain() + self.serial.drain();
        if failed > 0 {
            debug!("stopped widget with {} requests outstanding", failed);
        }
    }
}

impl<T: StreamTransport> Drop for UsbProWidget<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<T: StreamTransport + fmt::Debug> fmt::Debug for UsbProWidget<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsbProWidget")
            .field("params", &self.params)
            .field("serial", &self.serial)
            .field("dmx_callback", &self.dmx_callback.is_some())
            .field("transport", &self.transport)
            .finish()
    }
}
