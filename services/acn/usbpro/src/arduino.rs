//! Arduino DMX USB widget.
//!
//! Speaks the generic protocol plus one command reporting the port count,
//! and sends each output port's universe on its own label starting at
//! [`DMX_START_PORT`].

use std::fmt;
use tracing::{debug, warn};

use crate::queue::{Reply, ReplyQueue};
use crate::transport::StreamTransport;
use crate::widget::{SerialNumber, UsbProParameters, UsbProWidget};
use crate::WidgetError;

/// Extended parameter request and reply
pub const EXTENDED_PARAMETERS_LABEL: u8 = 53;

/// Label of output port 0
pub const DMX_START_PORT: u8 = 100;

/// Port counts reported by the widget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtendedParameters {
    /// DMX output ports
    pub output_ports: u8,
    /// DMX input ports
    pub input_ports: u8,
}

impl Reply for ExtendedParameters {
    const SIZE: usize = 2;

    fn parse(data: &[u8]) -> Self {
        Self {
            output_ports: data[0],
            input_ports: data[1],
        }
    }
}

/// Arduino DMX USB widget
pub struct ArduinoDmxUsbWidget<T: StreamTransport> {
    // drained before the generic queues on drop
    extended_params: ReplyQueue<ExtendedParameters>,
    generic: UsbProWidget<T>,
}

impl<T: StreamTransport> ArduinoDmxUsbWidget<T> {
    /// Create a widget sending through `transport`
    pub fn new(transport: T) -> Self {
        Self {
            extended_params: ReplyQueue::new(EXTENDED_PARAMETERS_LABEL),
            generic: UsbProWidget::new(transport),
        }
    }

    /// The generic widget commands
    pub fn generic(&mut self) -> &mut UsbProWidget<T> {
        &mut self.generic
    }

    /// Send a universe to port 0
    pub fn send_dmx(&mut self, data: &[u8]) -> Result<(), WidgetError> {
        self.send_dmx_port(0, data)
    }

    /// Send a universe to an output port
    pub fn send_dmx_port(&mut self, port: u8, data: &[u8]) -> Result<(), WidgetError> {
        let label = DMX_START_PORT
            .checked_add(port)
            .ok_or(WidgetError::InvalidPort(port))?;
        self.generic.send_dmx_with_label(label, data)
    }

    /// Request the port counts
    pub fn get_extended_parameters<F>(&mut self, callback: F)
    where
        F: FnOnce(Result<ExtendedParameters, WidgetError>) + Send + 'static,
    {
        let user_size = 0u16.to_le_bytes();
        self.extended_params
            .issue_request(self.generic.transport_mut(), &user_size, callback);
    }

    /// Request the widget parameters
    pub fn get_parameters<F>(&mut self, callback: F)
    where
        F: FnOnce(Result<UsbProParameters, WidgetError>) + Send + 'static,
    {
        self.generic.get_parameters(callback);
    }

    /// Request the widget serial number
    pub fn get_serial<F>(&mut self, callback: F)
    where
        F: FnOnce(Result<SerialNumber, WidgetError>) + Send + 'static,
    {
        self.generic.get_serial(callback);
    }

    /// Requests waiting for a reply
    pub fn outstanding(&self) -> usize {
        self.extended_params.len() + self.generic.outstanding()
    }

    /// Handle one message read from the widget
    pub fn handle_message(&mut self, label: u8, data: &[u8]) {
        if label == self.extended_params.label() {
            if let Err(e) = self.extended_params.on_reply(data) {
                warn!("discarding reply: {}", e);
            }
        } else {
            self.generic.handle_message(label, data);
        }
    }

    /// Fail every outstanding request, extended parameters first
    pub fn stop(&mut self) {
        let failed = self.extended_params.drain();
        if failed > 0 {
            debug!("failed {} extended parameter requests", failed);
        }
        self.generic.stop();
    }
}

impl<T: StreamTransport> Drop for ArduinoDmxUsbWidget<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<T: StreamTransport + fmt::Debug> fmt::Debug for ArduinoDmxUsbWidget<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArduinoDmxUsbWidget")
            .field("extended_params", &self.extended_params)
            .field("generic", &self.generic)
            .finish()
    }
}
