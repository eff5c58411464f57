//! # Tether Client
//! The connecting side of a tether channel: runs the handshake against a
//! server, caches packets until it is confirmed, then drives the reliable
//! engine for the life of the connection.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

#[macro_use]
extern crate cfg_if;

pub mod transport;
pub mod shared {
    pub use tether_shared::{
        ChannelId, DisposeReason, Envelope, NetworkTarget, PacketHandler, PacketHeader,
        QueueDispatcher, ReceivedPacket, Tick,
    };
}

mod client_channel;
mod client_config;
mod events;

pub use client_channel::{ClientChannel, ClientState};
pub use client_config::ClientConfig;
pub use events::ClientEvent;
