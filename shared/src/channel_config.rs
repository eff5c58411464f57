use std::default::Default;

use crate::{reliable::settings::EngineSettings, types::NetworkTarget};

/// Largest application body accepted by default.
pub const DEFAULT_MAX_BODY_LENGTH: i32 = u16::MAX as i32 * 16;

/// Contains Config properties which will be used by every channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Settings for the reliable engine created once a channel is established
    pub engine: EngineSettings,
    /// Largest application body that may be sent or received
    pub max_body_length: i32,
    /// How long a client waits for `WaitConfirmConnection`
    pub connect_timeout_ms: u32,
    /// How long a server keeps an unconfirmed `RequestConnection`
    pub pending_timeout_ms: u32,
    /// Packets a client may queue before the handshake completes
    pub max_cached_messages: usize,
}

impl ChannelConfig {
    pub fn for_target(target: NetworkTarget) -> Self {
        Self {
            engine: EngineSettings::for_target(target),
            ..Self::default()
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            max_body_length: DEFAULT_MAX_BODY_LENGTH,
            connect_timeout_ms: 5_000,
            pending_timeout_ms: 10_000,
            max_cached_messages: 1024,
        }
    }
}
