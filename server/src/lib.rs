//! # Tether Server
//! Accepts tether channels on a single UDP socket, demultiplexing datagrams
//! by channel id and driving each channel's reliable engine only when it is
//! due.

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

mod channel_entry;
mod channel_table;
mod events;
mod pending;
mod server_config;

pub use channel_table::ServerChannelTable;
pub use events::ServerEvent;
pub use pending::PendingConnection;
pub use server_config::ServerConfig;
