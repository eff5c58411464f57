use tether_shared::{ChannelId, DisposeReason};

/// Lifecycle notifications of a [`ClientChannel`](crate::ClientChannel).
///
/// A channel reports at most one of `ConnectFailed` / `Disconnected`, and
/// only channels that reached `ConnectComplete` report `Disconnected`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    ConnectComplete {
        channel_id: ChannelId,
    },
    ConnectFailed {
        channel_id: ChannelId,
        reason: DisposeReason,
    },
    Disconnected {
        channel_id: ChannelId,
        reason: DisposeReason,
    },
}

impl ClientEvent {
    pub fn channel_id(&self) -> ChannelId {
        match self {
            ClientEvent::ConnectComplete { channel_id }
            | ClientEvent::ConnectFailed { channel_id, .. }
            | ClientEvent::Disconnected { channel_id, .. } => *channel_id,
        }
    }
}
