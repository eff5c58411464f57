use bytes::{Buf, Bytes, BytesMut};
use log::trace;

use crate::wire::{
    error::{FramerError, HeaderError},
    packet_header::{PacketHeader, PACKET_HEADER_SIZE},
};

/// One application packet recovered from the reliable stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    pub body: Bytes,
}

/// Splits the ordered byte stream recovered from the reliable engine into
/// application packets. Bytes may arrive in any chunking: a header or a body
/// may straddle several calls to [`PacketFramer::push`].
pub struct PacketFramer {
    buffer: BytesMut,
    // header already consumed from `buffer`, waiting on its body
    pending: Option<(PacketHeader, usize)>,
    max_body_length: i32,
}

impl PacketFramer {
    pub fn new(max_body_length: i32) -> Self {
        Self {
            buffer: BytesMut::new(),
            pending: None,
            max_body_length,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of bytes received but not yet returned as part of a packet.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.pending = None;
    }

    /// Returns the next complete packet, `Ok(None)` when more bytes are needed.
    ///
    /// An error means the stream can no longer be trusted and the channel must
    /// be torn down; the framer is cleared before returning it.
    pub fn next_packet(&mut self) -> Result<Option<Packet>, FramerError> {
        let (header, body_len) = match self.pending.take() {
            Some(pending) => pending,
            None => {
                let header = match PacketHeader::unpack(&self.buffer) {
                    Ok(header) => header,
                    Err(HeaderError::Incomplete { .. }) => return Ok(None),
                    Err(error) => return Err(error.into()),
                };
                let body_len = match header.body_len(self.max_body_length) {
                    Ok(body_len) => body_len,
                    Err(error) => {
                        self.clear();
                        return Err(error.into());
                    }
                };
                self.buffer.advance(PACKET_HEADER_SIZE);
                (header, body_len)
            }
        };

        if self.buffer.len() < body_len {
            trace!(
                "packet opcode {} waiting on body: {}/{} bytes",
                header.opcode,
                self.buffer.len(),
                body_len
            );
            self.pending = Some((header, body_len));
            return Ok(None);
        }

        let body = self.buffer.split_to(body_len).freeze();
        Ok(Some(Packet { header, body }))
    }
}

/// Packs `body` behind a freshly built header, appending to `out`.
pub fn encode_packet(
    opcode: u32,
    rpc_id: u32,
    route_id: i64,
    body: &[u8],
    max_body_length: i32,
    out: &mut Vec<u8>,
) -> Result<PacketHeader, HeaderError> {
    let header = PacketHeader::for_body(opcode, rpc_id, route_id, body.len(), max_body_length)?;
    out.reserve(PACKET_HEADER_SIZE + body.len());
    out.extend_from_slice(&header.pack());
    out.extend_from_slice(body);
    Ok(header)
}
