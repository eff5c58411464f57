use std::default::Default;

use tether_shared::{ChannelConfig, NetworkTarget};

/// Contains Config properties which will be used by the Server
#[derive(Clone, Debug, Default)]
pub struct ServerConfig {
    /// Used to configure every channel accepted by the Server
    pub channel: ChannelConfig,
}

impl ServerConfig {
    pub fn for_target(target: NetworkTarget) -> Self {
        Self {
            channel: ChannelConfig::for_target(target),
        }
    }
}
