use crate::{types::ChannelId, wire::error::HeaderError, wire::message_kind::MessageKind};

/// Width of the control header that prefixes every datagram.
pub const CONTROL_HEADER_SIZE: usize = 5;

/// The fixed 5-byte prefix of every UDP datagram: one kind byte followed by
/// the little-endian channel id.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ControlHeader {
    pub kind: MessageKind,
    pub channel_id: ChannelId,
}

impl ControlHeader {
    pub fn new(kind: MessageKind, channel_id: ChannelId) -> Self {
        Self { kind, channel_id }
    }

    pub fn encode(&self) -> [u8; CONTROL_HEADER_SIZE] {
        let mut bytes = [0u8; CONTROL_HEADER_SIZE];
        bytes[0] = self.kind.to_u8();
        bytes[1..].copy_from_slice(&self.channel_id.to_u32().to_le_bytes());
        bytes
    }

    /// Appends the encoded header to `buffer`.
    pub fn write_into(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.encode());
    }

    /// Splits a datagram into its control header and the remaining bytes.
    ///
    /// Never reads past `bytes`; a short slice yields
    /// [`HeaderError::Incomplete`].
    pub fn decode(bytes: &[u8]) -> Result<(Self, &[u8]), HeaderError> {
        let Some((head, rest)) = bytes.split_first_chunk::<CONTROL_HEADER_SIZE>() else {
            return Err(HeaderError::Incomplete {
                needed: CONTROL_HEADER_SIZE,
                available: bytes.len(),
            });
        };

        let kind = MessageKind::try_from(head[0])?;
        let channel_id = u32::from_le_bytes([head[1], head[2], head[3], head[4]]);

        Ok((Self::new(kind, ChannelId::new(channel_id)), rest))
    }
}
