//! # Tether Shared
//! Wire format, timers and reliable-engine plumbing shared between
//! tether-server & tether-client crates.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

mod buffer;
mod channel;
mod channel_config;
mod clock;
mod dispatch;
mod reliable;
mod time_wheel;
mod timer;
mod transport;
mod types;
mod wire;
mod wrapping_number;

cfg_if! {
    if #[cfg(feature = "kcp_engine")] {
        pub use reliable::kcp_engine::{KcpEngine, KcpEngineBuilder};
    }
}
cfg_if! {
    if #[cfg(feature = "transport_udp")] {
        pub use transport::udp::UdpPacketSender;
    }
}

pub use buffer::{BufferPool, PooledBuffer, DEFAULT_BUFFER_CAPACITY};
pub use channel::{pack_packet, Channel, ChannelError, DisposeReason, Envelope};
pub use channel_config::{ChannelConfig, DEFAULT_MAX_BODY_LENGTH};
pub use clock::Clock;
pub use dispatch::{PacketHandler, PacketReceiver, QueueDispatcher, ReceivedPacket};
pub use reliable::{
    engine::{EngineBuilder, ReliableEngine, SegmentOutput},
    error::EngineError,
    settings::EngineSettings,
    stream::{ReliableStream, StreamFault},
};
pub use time_wheel::TimeWheel;
pub use timer::{TimerKey, Timers};
pub use transport::{
    error::{RecvError, SendError},
    send_control, PacketSender, MAX_DATAGRAM_SIZE,
};
pub use types::{ChannelId, NetworkTarget, Tick, CHANNEL_ID_LIVE_MASK};
pub use wire::{
    control_header::{ControlHeader, CONTROL_HEADER_SIZE},
    error::{FramerError, HeaderError},
    message_kind::MessageKind,
    packet_framer::{encode_packet, Packet, PacketFramer},
    packet_header::{PacketHeader, EMPTY_BODY_LENGTH, PACKET_HEADER_SIZE},
};
pub use wrapping_number::{tick_diff, tick_greater_than, tick_is_after, tick_less_than};
