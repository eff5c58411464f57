use log::{debug, error, trace};
use thiserror::Error;

use crate::{
    buffer::PooledBuffer,
    channel::DisposeReason,
    dispatch::PacketHandler,
    reliable::{engine::ReliableEngine, error::EngineError},
    types::{ChannelId, Tick},
    wire::{error::FramerError, packet_framer::PacketFramer},
};

/// Failures that end a channel once its engine exists
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamFault {
    /// Too many packets are waiting for acknowledgement
    #[error("{waiting} packets waiting for acknowledgement, limit is {max}")]
    WindowOverflow { waiting: usize, max: usize },

    /// The engine failed
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The reassembled stream could not be framed
    #[error(transparent)]
    Framing(#[from] FramerError),
}

impl StreamFault {
    pub fn dispose_reason(&self) -> DisposeReason {
        match self {
            StreamFault::WindowOverflow { .. } => DisposeReason::WindowOverflow,
            StreamFault::Engine(_) => DisposeReason::EngineFailure,
            StreamFault::Framing(_) => DisposeReason::Protocol,
        }
    }
}

/// The established half of a channel: its reliable engine plus the framer
/// that splits the engine's output into application packets.
pub struct ReliableStream {
    channel_id: ChannelId,
    engine: Box<dyn ReliableEngine>,
    framer: PacketFramer,
    receive_buffer: Vec<u8>,
    max_send_window: usize,
}

impl ReliableStream {
    pub fn new(
        channel_id: ChannelId,
        engine: Box<dyn ReliableEngine>,
        max_body_length: i32,
        max_send_window: usize,
    ) -> Self {
        Self {
            channel_id,
            engine,
            framer: PacketFramer::new(max_body_length),
            receive_buffer: Vec::new(),
            max_send_window,
        }
    }

    /// Hands a packed packet to the engine. The buffer is consumed whether
    /// or not the send succeeds.
    pub fn send(&mut self, packet: PooledBuffer) -> Result<(), StreamFault> {
        let waiting = self.engine.wait_send_count();
        if waiting > self.max_send_window {
            return Err(StreamFault::WindowOverflow {
                waiting,
                max: self.max_send_window,
            });
        }

        self.engine.send(&packet)?;
        Ok(())
    }

    /// Feeds a `ReceiveData` segment to the engine. Segments the engine
    /// rejects are dropped, the peer retransmits whatever was real. Returns
    /// whether the segment was taken.
    pub fn input(&mut self, segment: &[u8]) -> bool {
        if segment.is_empty() {
            trace!("channel {} empty segment skipped", self.channel_id);
            return false;
        }

        match self.engine.input(segment) {
            Ok(()) => true,
            Err(error) => {
                debug!(
                    "channel {} dropped {} byte segment: {}",
                    self.channel_id,
                    segment.len(),
                    error
                );
                false
            }
        }
    }

    /// Runs the engine's timers and returns when it next needs to run.
    pub fn update(&mut self, now: Tick) -> Result<Tick, StreamFault> {
        self.engine.update(now)?;
        Ok(self.engine.check(now))
    }

    /// Reads every payload the engine has reassembled and delivers each
    /// complete packet to `handler`. Returns the number delivered.
    pub fn drain(&mut self, handler: &mut dyn PacketHandler) -> Result<usize, StreamFault> {
        let mut delivered = 0;

        loop {
            let Ok(size) = usize::try_from(self.engine.peek_size()) else {
                break;
            };

            self.receive_buffer.resize(size, 0);
            let received = self.engine.receive(&mut self.receive_buffer)?;
            if received != size {
                return Err(EngineError::PeekMismatch {
                    expected: size,
                    actual: received,
                }
                .into());
            }
            self.framer.push(&self.receive_buffer[..received]);

            loop {
                match self.framer.next_packet() {
                    Ok(Some(packet)) => {
                        trace!(
                            "channel {} <- opcode {} ({} bytes)",
                            self.channel_id,
                            packet.header.opcode,
                            packet.body.len()
                        );
                        handler.on_packet_received(self.channel_id, &packet.header, &packet.body);
                        delivered += 1;
                    }
                    Ok(None) => break,
                    Err(fault) => {
                        error!("channel {} stream corrupted: {}", self.channel_id, fault);
                        return Err(fault.into());
                    }
                }
            }
        }

        Ok(delivered)
    }

    pub fn wait_send_count(&self) -> usize {
        self.engine.wait_send_count()
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }
}
