use thiserror::Error;

/// Errors that can occur while decoding a control header or an application
/// packet header
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// Fewer bytes are available than the fixed header width. Callers treat
    /// this as "wait for more data", never as corruption.
    #[error("Incomplete header: need {needed} bytes, only {available} available")]
    Incomplete { needed: usize, available: usize },

    /// Unknown control kind byte (SECURITY: potentially malicious datagram)
    #[error("Unknown message kind {kind} (valid range: 1-6). This may indicate a malformed or malicious datagram")]
    UnknownKind { kind: u8 },

    /// Declared body length exceeds the configured maximum
    #[error("Packet body length {length} exceeds the maximum of {max} bytes")]
    BodyTooLarge { length: i32, max: i32 },

    /// Declared body length is negative and not the empty-body sentinel
    #[error("Invalid packet body length {length}; only -1 may be negative")]
    InvalidBodyLength { length: i32 },
}

/// Errors raised while splitting the reliable stream into packets. Every
/// variant is fatal to the channel: the stream position cannot be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramerError {
    /// A packet header could not be accepted
    #[error("Packet header rejected: {0}")]
    Header(#[from] HeaderError),
}
