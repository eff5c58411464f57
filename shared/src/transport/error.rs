use std::{io, net::SocketAddr};

use thiserror::Error;

/// Errors that can occur while handing a datagram to the socket
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The socket rejected the datagram
    #[error("Failed to send {size} byte datagram to {address}: {kind}")]
    Io {
        address: SocketAddr,
        size: usize,
        kind: io::ErrorKind,
    },

    /// The socket is gone (driver shut down or peer removed)
    #[error("Socket is closed, dropped {size} byte datagram for {address}")]
    Closed { address: SocketAddr, size: usize },
}

/// Errors that can occur while reading a datagram from the socket
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecvError {
    /// The socket reported an error while receiving
    #[error("Failed to receive datagram: {kind}")]
    Io { kind: io::ErrorKind },

    /// The datagram filled the receive buffer and may have been cut short
    #[error("Datagram from {address} filled the {size} byte receive buffer and was dropped")]
    Truncated { address: SocketAddr, size: usize },
}
