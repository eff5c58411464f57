use bytes::Bytes;
use log::warn;
use smol::channel::{self, Receiver, Sender};

use crate::{types::ChannelId, wire::packet_header::PacketHeader};

/// Receives every application packet recovered from a channel, in order.
pub trait PacketHandler: Send {
    fn on_packet_received(&mut self, channel_id: ChannelId, header: &PacketHeader, body: &[u8]);
}

impl<F> PacketHandler for F
where
    F: FnMut(ChannelId, &PacketHeader, &[u8]) + Send,
{
    fn on_packet_received(&mut self, channel_id: ChannelId, header: &PacketHeader, body: &[u8]) {
        self(channel_id, header, body)
    }
}

/// An application packet handed across to another thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedPacket {
    pub channel_id: ChannelId,
    pub header: PacketHeader,
    pub body: Bytes,
}

/// Receiving end of a [`QueueDispatcher`].
pub type PacketReceiver = Receiver<ReceivedPacket>;

/// [`PacketHandler`] that forwards packets over a queue, so the network
/// context never calls into application code directly. The receiving end
/// can be polled with `try_recv` or awaited from any executor.
pub struct QueueDispatcher {
    sender: Sender<ReceivedPacket>,
}

impl QueueDispatcher {
    pub fn unbounded() -> (Self, PacketReceiver) {
        let (sender, receiver) = channel::unbounded();
        (Self { sender }, receiver)
    }
}

impl PacketHandler for QueueDispatcher {
    fn on_packet_received(&mut self, channel_id: ChannelId, header: &PacketHeader, body: &[u8]) {
        let packet = ReceivedPacket {
            channel_id,
            header: *header,
            body: Bytes::copy_from_slice(body),
        };
        if self.sender.try_send(packet).is_err() {
            warn!(
                "packet opcode {} on channel {} dropped: receiver is gone",
                header.opcode, channel_id
            );
        }
    }
}
