use std::default::Default;

use tether_shared::{ChannelConfig, NetworkTarget};

/// Contains Config properties which will be used by a Client
#[derive(Clone, Debug, Default)]
pub struct ClientConfig {
    /// Used to configure the channel to the Server
    pub channel: ChannelConfig,
}

impl ClientConfig {
    pub fn for_target(target: NetworkTarget) -> Self {
        Self {
            channel: ChannelConfig::for_target(target),
        }
    }
}
