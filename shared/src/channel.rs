use std::fmt;

use thiserror::Error;

use crate::{
    buffer::{BufferPool, PooledBuffer},
    types::{ChannelId, Tick},
    wire::{error::HeaderError, packet_framer::encode_packet},
};

/// Addressing fields of an outgoing application packet. The body length is
/// filled in when the packet is packed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Envelope {
    pub opcode: u32,
    pub rpc_id: u32,
    pub route_id: i64,
}

impl Envelope {
    pub fn new(opcode: u32, rpc_id: u32, route_id: i64) -> Self {
        Self {
            opcode,
            rpc_id,
            route_id,
        }
    }
}

/// Operations shared by the client channel and the server channel table.
pub trait Channel {
    /// Packs `body` behind an application header and queues it on
    /// `channel_id`.
    fn send(
        &mut self,
        channel_id: ChannelId,
        envelope: Envelope,
        body: &[u8],
    ) -> Result<(), ChannelError>;

    /// Tears `channel_id` down. Disposing twice is a no-op.
    fn dispose(&mut self, channel_id: ChannelId);

    /// Drives timers and any reliable engines that are due at `now`.
    fn on_update(&mut self, now: Tick);
}

/// Why a channel was torn down
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DisposeReason {
    /// The local application disposed the channel
    Local,
    /// The peer sent `Disconnect`
    PeerDisconnect,
    /// The handshake was not confirmed in time
    ConnectTimeout,
    /// The socket failed underneath the channel
    SocketError,
    /// The peer stopped acknowledging and the send window overflowed
    WindowOverflow,
    /// The reassembled stream could not be framed
    Protocol,
    /// The reliable engine reported a failure
    EngineFailure,
}

impl fmt::Display for DisposeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DisposeReason::Local => "disposed locally",
            DisposeReason::PeerDisconnect => "peer disconnected",
            DisposeReason::ConnectTimeout => "connect timed out",
            DisposeReason::SocketError => "socket error",
            DisposeReason::WindowOverflow => "send window overflow",
            DisposeReason::Protocol => "protocol error",
            DisposeReason::EngineFailure => "reliable engine failure",
        };
        f.write_str(reason)
    }
}

/// Errors returned to callers sending on or managing a channel
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The channel has already been torn down
    #[error("Channel {channel_id} has been disposed")]
    Disposed { channel_id: ChannelId },

    /// No channel with this id exists
    #[error("Unknown channel {channel_id}")]
    UnknownChannel { channel_id: ChannelId },

    /// The body is larger than the configured maximum
    #[error("Packet body of {length} bytes exceeds the maximum of {max} bytes")]
    BodyTooLarge { length: usize, max: i32 },

    /// Too many packets queued while the handshake is still in progress
    #[error("Channel {channel_id} already holds {capacity} packets waiting for the handshake")]
    CacheFull {
        channel_id: ChannelId,
        capacity: usize,
    },

    /// The peer stopped acknowledging; the channel was torn down
    #[error("Channel {channel_id} has {waiting} unacknowledged packets, over the limit of {max}")]
    WindowOverflow {
        channel_id: ChannelId,
        waiting: usize,
        max: usize,
    },

    /// `connect` was called on a channel that already left `Idle`
    #[error("Channel {channel_id} is already connecting or connected")]
    AlreadyConnected { channel_id: ChannelId },

    /// The operation needs a channel that has started connecting
    #[error("Channel is not connected")]
    NotConnected,
}

/// Packs an application packet into a buffer rented from `pool`.
pub fn pack_packet(
    pool: &BufferPool,
    envelope: Envelope,
    body: &[u8],
    max_body_length: i32,
) -> Result<PooledBuffer, ChannelError> {
    let mut buffer = pool.rent();
    encode_packet(
        envelope.opcode,
        envelope.rpc_id,
        envelope.route_id,
        body,
        max_body_length,
        &mut buffer,
    )
    .map_err(|error| match error {
        HeaderError::BodyTooLarge { max, .. } => ChannelError::BodyTooLarge {
            length: body.len(),
            max,
        },
        // only the size of the body can make packing fail
        _ => ChannelError::BodyTooLarge {
            length: body.len(),
            max: max_body_length,
        },
    })?;
    Ok(buffer)
}
