use std::{net::SocketAddr, sync::Arc};

use tokio::net::UdpSocket;

use crate::transport::{error::SendError, PacketSender};

/// [`PacketSender`] over a tokio UDP socket. Writes never wait: a datagram
/// the socket cannot take right now is reported and dropped.
#[derive(Clone)]
pub struct UdpPacketSender {
    socket: Arc<UdpSocket>,
}

impl UdpPacketSender {
    pub fn new(socket: Arc<UdpSocket>) -> Self {
        Self { socket }
    }
}

impl PacketSender for UdpPacketSender {
    fn send(&self, address: &SocketAddr, payload: &[u8]) -> Result<(), SendError> {
        self.socket
            .try_send_to(payload, *address)
            .map(|_| ())
            .map_err(|error| SendError::Io {
                address: *address,
                size: payload.len(),
                kind: error.kind(),
            })
    }
}
