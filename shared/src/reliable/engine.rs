use std::{io, net::SocketAddr, sync::Arc};

use log::trace;

use crate::{
    reliable::error::EngineError,
    transport::PacketSender,
    types::{ChannelId, Tick},
    wire::{control_header::ControlHeader, message_kind::MessageKind},
};

/// Windowed retransmission engine turning best-effort datagrams into an
/// ordered payload stream for one channel.
pub trait ReliableEngine: Send {
    /// Feeds one segment received from the peer.
    fn input(&mut self, segment: &[u8]) -> Result<(), EngineError>;

    /// Queues a payload for ordered, reliable delivery.
    fn send(&mut self, payload: &[u8]) -> Result<(), EngineError>;

    /// Size of the next reassembled payload, negative when none is ready.
    fn peek_size(&self) -> i32;

    /// Copies the next reassembled payload into `buffer`, which must be at
    /// least [`ReliableEngine::peek_size`] bytes long.
    fn receive(&mut self, buffer: &mut [u8]) -> Result<usize, EngineError>;

    /// Runs retransmission and flush timers.
    fn update(&mut self, now: Tick) -> Result<(), EngineError>;

    /// Tick at which [`ReliableEngine::update`] is next due. `0` means now.
    fn check(&self, now: Tick) -> Tick;

    /// Segments queued or in flight and not yet acknowledged.
    fn wait_send_count(&self) -> usize;

    fn set_window(&mut self, send: u16, receive: u16);

    fn set_mtu(&mut self, mtu: usize) -> Result<(), EngineError>;
}

/// Constructs the engine for a freshly established channel.
pub trait EngineBuilder: Send + Sync {
    fn build(
        &self,
        channel_id: ChannelId,
        output: SegmentOutput,
    ) -> Result<Box<dyn ReliableEngine>, EngineError>;
}

/// Where an engine writes its outbound segments: each one goes out as a
/// `ReceiveData` datagram for the owning channel.
pub struct SegmentOutput {
    sender: Arc<dyn PacketSender>,
    address: SocketAddr,
    channel_id: ChannelId,
    buffer: Vec<u8>,
}

impl SegmentOutput {
    pub fn new(sender: Arc<dyn PacketSender>, address: SocketAddr, channel_id: ChannelId) -> Self {
        Self {
            sender,
            address,
            channel_id,
            buffer: Vec::new(),
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn address(&self) -> &SocketAddr {
        &self.address
    }

    /// Wraps `segment` in a `ReceiveData` header and sends it. Send failures
    /// are logged and swallowed, the engine retransmits.
    pub fn emit(&mut self, segment: &[u8]) {
        self.buffer.clear();
        ControlHeader::new(MessageKind::ReceiveData, self.channel_id).write_into(&mut self.buffer);
        self.buffer.extend_from_slice(segment);

        if let Err(error) = self.sender.send(&self.address, &self.buffer) {
            trace!("segment for channel {} dropped: {}", self.channel_id, error);
        }
    }
}

impl io::Write for SegmentOutput {
    fn write(&mut self, segment: &[u8]) -> io::Result<usize> {
        self.emit(segment);
        Ok(segment.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
