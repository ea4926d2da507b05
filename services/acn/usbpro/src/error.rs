//! Widget error types.

use thiserror::Error;

/// Widget errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WidgetError {
    /// The stream transport did not accept the message
    #[error("send failed for label {0}")]
    SendFailed(u8),

    /// Reply payload shorter than the reply structure
    #[error("short reply for label {label}: got {actual} bytes, need {expected}")]
    ShortReplyFrame {
        /// Reply label
        label: u8,
        /// Reply structure size
        expected: usize,
        /// Bytes received
        actual: usize,
    },

    /// Reply arrived with no request outstanding
    #[error("unsolicited reply for label {0}")]
    Unsolicited(u8),

    /// Widget shut down before the reply arrived
    #[error("widget stopped")]
    Stopped,

    /// Message data exceeds the frame limit
    #[error("message of {0} bytes exceeds the frame limit")]
    Size(usize),

    /// Port number maps outside the label range
    #[error("invalid port {0}")]
    InvalidPort(u8),
}
