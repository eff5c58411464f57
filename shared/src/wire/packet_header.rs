use crate::wire::error::HeaderError;

/// Width of the application packet header.
pub const PACKET_HEADER_SIZE: usize = 20;

/// Body length written for an empty body. The payload codec may omit every
/// byte of a default-valued message, so an empty body must be told apart from
/// a header whose body has simply not arrived yet.
pub const EMPTY_BODY_LENGTH: i32 = -1;

const OPCODE_OFFSET: usize = 4;
const RPC_ID_OFFSET: usize = 8;
const ROUTE_ID_OFFSET: usize = 12;

/// Header prefixed to every payload handed to the reliable engine.
///
/// Wire layout, little-endian, fixed widths:
///
/// ```text
///  0..4   body_length: i32   (-1 = valid empty body)
///  4..8   opcode:      u32
///  8..12  rpc_id:      u32
/// 12..20  route_id:    i64
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PacketHeader {
    pub body_length: i32,
    pub opcode: u32,
    pub rpc_id: u32,
    pub route_id: i64,
}

impl PacketHeader {
    pub fn new(body_length: i32, opcode: u32, rpc_id: u32, route_id: i64) -> Self {
        Self {
            body_length,
            opcode,
            rpc_id,
            route_id,
        }
    }

    /// Builds the header for a body of `body_len` bytes, using the sentinel
    /// for an empty body. Fails if the body is larger than `max_body_length`.
    pub fn for_body(
        opcode: u32,
        rpc_id: u32,
        route_id: i64,
        body_len: usize,
        max_body_length: i32,
    ) -> Result<Self, HeaderError> {
        let body_length = match body_len {
            0 => EMPTY_BODY_LENGTH,
            len => i32::try_from(len).map_err(|_| HeaderError::BodyTooLarge {
                length: i32::MAX,
                max: max_body_length,
            })?,
        };

        let header = Self::new(body_length, opcode, rpc_id, route_id);
        header.body_len(max_body_length)?;
        Ok(header)
    }

    pub fn pack(&self) -> [u8; PACKET_HEADER_SIZE] {
        let mut bytes = [0u8; PACKET_HEADER_SIZE];
        bytes[..OPCODE_OFFSET].copy_from_slice(&self.body_length.to_le_bytes());
        bytes[OPCODE_OFFSET..RPC_ID_OFFSET].copy_from_slice(&self.opcode.to_le_bytes());
        bytes[RPC_ID_OFFSET..ROUTE_ID_OFFSET].copy_from_slice(&self.rpc_id.to_le_bytes());
        bytes[ROUTE_ID_OFFSET..].copy_from_slice(&self.route_id.to_le_bytes());
        bytes
    }

    /// Reads a header from the front of `bytes`. A slice shorter than
    /// [`PACKET_HEADER_SIZE`] yields [`HeaderError::Incomplete`].
    pub fn unpack(bytes: &[u8]) -> Result<Self, HeaderError> {
        let Some(head) = bytes.first_chunk::<PACKET_HEADER_SIZE>() else {
            return Err(HeaderError::Incomplete {
                needed: PACKET_HEADER_SIZE,
                available: bytes.len(),
            });
        };

        let mut body_length = [0u8; 4];
        let mut opcode = [0u8; 4];
        let mut rpc_id = [0u8; 4];
        let mut route_id = [0u8; 8];
        body_length.copy_from_slice(&head[..OPCODE_OFFSET]);
        opcode.copy_from_slice(&head[OPCODE_OFFSET..RPC_ID_OFFSET]);
        rpc_id.copy_from_slice(&head[RPC_ID_OFFSET..ROUTE_ID_OFFSET]);
        route_id.copy_from_slice(&head[ROUTE_ID_OFFSET..]);

        Ok(Self::new(
            i32::from_le_bytes(body_length),
            u32::from_le_bytes(opcode),
            u32::from_le_bytes(rpc_id),
            i64::from_le_bytes(route_id),
        ))
    }

    /// Number of body bytes following this header, after validating the
    /// declared length against `max_body_length`.
    pub fn body_len(&self, max_body_length: i32) -> Result<usize, HeaderError> {
        match self.body_length {
            EMPTY_BODY_LENGTH => Ok(0),
            length if length < EMPTY_BODY_LENGTH => {
                Err(HeaderError::InvalidBodyLength { length })
            }
            length if length > max_body_length => Err(HeaderError::BodyTooLarge {
                length,
                max: max_body_length,
            }),
            // non-negative here, the cast cannot truncate
            length => Ok(length as usize),
        }
    }
}
