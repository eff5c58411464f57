pub mod error;

cfg_if! {
    if #[cfg(feature = "transport_udp")] {
        pub mod udp;
    } else {}
}

use std::net::SocketAddr;

use log::trace;

use crate::{
    types::ChannelId,
    wire::{control_header::ControlHeader, message_kind::MessageKind},
};
use error::SendError;

/// Largest datagram either side will read from a socket.
pub const MAX_DATAGRAM_SIZE: usize = 2048;

/// Outgoing half of a datagram socket.
///
/// Sends are best-effort and must not block: a datagram that cannot be
/// written right away is reported as an error and may be dropped, the
/// reliable engine above retransmits what matters.
pub trait PacketSender: Send + Sync {
    /// Sends a datagram to `address`
    fn send(&self, address: &SocketAddr, payload: &[u8]) -> Result<(), SendError>;
}

/// Sends a bare control frame, exactly [`CONTROL_HEADER_SIZE`] bytes.
///
/// [`CONTROL_HEADER_SIZE`]: crate::wire::control_header::CONTROL_HEADER_SIZE
pub fn send_control(
    sender: &dyn PacketSender,
    address: &SocketAddr,
    kind: MessageKind,
    channel_id: ChannelId,
) -> Result<(), SendError> {
    trace!("-> {:?} {} to {}", kind, channel_id, address);
    sender.send(address, &ControlHeader::new(kind, channel_id).encode())
}
