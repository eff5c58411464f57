// The different kinds of control frames that can be sent/received. The kind
// is always the first byte of a datagram.

use super::error::HeaderError;

#[derive(Copy, Debug, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    // Sent by the client to open a channel with a freshly generated id
    RequestConnection = 1,
    // Sent by the server once the id is parked as pending
    WaitConfirmConnection = 2,
    // Sent by the client to complete the handshake
    ConfirmConnection = 3,
    // Sent by the server when the requested id is already taken
    RepeatChannelId = 4,
    // Carries reliable-engine segment bytes after the header
    ReceiveData = 5,
    // Tears the channel down, sent by either side
    Disconnect = 6,
}

impl MessageKind {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Whether the frame consists of the control header alone.
    pub fn is_signal(self) -> bool {
        self != MessageKind::ReceiveData
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = HeaderError;

    fn try_from(kind: u8) -> Result<Self, Self::Error> {
        match kind {
            1 => Ok(MessageKind::RequestConnection),
            2 => Ok(MessageKind::WaitConfirmConnection),
            3 => Ok(MessageKind::ConfirmConnection),
            4 => Ok(MessageKind::RepeatChannelId),
            5 => Ok(MessageKind::ReceiveData),
            6 => Ok(MessageKind::Disconnect),
            // SECURITY: 0 (None) and anything above 6 come from malformed or
            // hostile datagrams; reject instead of guessing.
            _ => Err(HeaderError::UnknownKind { kind }),
        }
    }
}
