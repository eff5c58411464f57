use thiserror::Error;

/// Errors reported by a reliable engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A received segment was rejected
    #[error("Reliable engine rejected an inbound segment: {reason}")]
    Input { reason: String },

    /// A payload could not be queued for delivery
    #[error("Reliable engine could not queue a {size} byte payload: {reason}")]
    Send { size: usize, reason: String },

    /// Reading a reassembled payload failed
    #[error("Reliable engine receive failed: {reason}")]
    Receive { reason: String },

    /// Driving the engine's timers failed
    #[error("Reliable engine update failed: {reason}")]
    Update { reason: String },

    /// The engine returned a payload of a different size than it announced
    #[error("Reliable engine announced {expected} bytes but delivered {actual}")]
    PeekMismatch { expected: usize, actual: usize },

    /// The configured MTU is not accepted by the engine
    #[error("Invalid MTU {mtu} for reliable engine")]
    InvalidMtu { mtu: usize },
}
