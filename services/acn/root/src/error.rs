//! Root layer error types.

use acn_wire::WireError;
use std::net::SocketAddr;
use thiserror::Error;

/// Root layer errors
#[derive(Error, Debug)]
pub enum RootError {
    /// No transport configured, nothing was sent
    #[error("transport unavailable")]
    TransportUnavailable,

    /// The transport refused or failed the send
    #[error("send to {0} failed")]
    SendFailed(SocketAddr),

    /// Encoding or registration error
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}
