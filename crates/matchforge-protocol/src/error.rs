//! Error types for the protocol layer.
//!
//! Each crate in Matchforge defines its own error enum, so a
//! `ProtocolError` always means the problem is in (de)serialization,
//! not in networking or room management.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed input, missing fields, wrong
    /// types, or a truncated frame.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame decoded fine but breaks a protocol rule, e.g. a first
    /// frame that is not a handshake.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
