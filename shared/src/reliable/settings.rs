use std::default::Default;

use crate::types::NetworkTarget;

/// Tuning for the reliable engine of every channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    /// Largest segment the engine emits, excluding the 5-byte control header
    pub mtu: usize,
    /// Send window, in segments
    pub send_window: u16,
    /// Receive window, in segments
    pub receive_window: u16,
    /// Queued payloads beyond which a send tears the channel down
    pub max_send_window: usize,
    /// Disables the engine's delayed-ack behaviour
    pub nodelay: bool,
    /// Internal flush interval in milliseconds
    pub interval_ms: i32,
    /// Duplicate acks that trigger a fast retransmit, 0 disables it
    pub fast_resend: i32,
    /// Turns off congestion control
    pub no_congestion_window: bool,
    /// Floor for the retransmission timeout, in milliseconds
    pub min_rto_ms: u32,
}

impl EngineSettings {
    /// Window presets for client-facing (`Outer`) and cluster-internal
    /// (`Inner`) traffic.
    pub fn for_target(target: NetworkTarget) -> Self {
        let (send_window, receive_window, max_send_window) = match target {
            NetworkTarget::Outer => (256, 256, 512),
            NetworkTarget::Inner => (1024, 1024, 2048),
        };

        Self {
            send_window,
            receive_window,
            max_send_window,
            ..Self::default()
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            mtu: 1400,
            send_window: 256,
            receive_window: 256,
            max_send_window: 512,
            nodelay: true,
            interval_ms: 5,
            fast_resend: 2,
            no_congestion_window: true,
            min_rto_ms: 30,
        }
    }
}
