//! Codec trait and implementations for serializing/deserializing frames.
//!
//! A "codec" converts between Rust values and raw bytes. The server is
//! written against the [`Codec`] trait, so the wire format can change
//! without touching the handler or the room layer.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented
    /// in this format.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Human-readable frames make clients in any language easy to write and
/// debug. Behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use matchforge_protocol::{Codec, Envelope, GameMode, JsonCodec, SystemMessage};
///
/// let codec = JsonCodec;
/// let envelope = Envelope::system(1, 5000, SystemMessage::JoinQueue {
///     mode: GameMode::DEFAULT,
/// });
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Envelope, Payload, RoomId, Slot, SystemMessage};

    #[test]
    fn test_decode_handshake_from_client_json() {
        // What a hand-written client actually sends.
        let raw = br#"{
            "seq": 0,
            "timestamp": 0,
            "payload": {
                "type": "System",
                "data": { "type": "Handshake", "version": 1, "token": "abc" }
            }
        }"#;

        let env: Envelope = JsonCodec.decode(raw).unwrap();

        assert_eq!(
            env.payload,
            Payload::System(SystemMessage::Handshake {
                version: 1,
                token: "abc".into(),
            })
        );
    }

    #[test]
    fn test_encode_matched_has_room_and_slot() {
        let env = Envelope::system(
            3,
            0,
            SystemMessage::Matched {
                room_id: RoomId(7),
                slot: Slot(1),
            },
        );

        let bytes = JsonCodec.encode(&env).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["payload"]["data"]["type"], "Matched");
        assert_eq!(value["payload"]["data"]["room_id"], 7);
        assert_eq!(value["payload"]["data"]["slot"], 1);
    }

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result: Result<Envelope, _> = JsonCodec.decode(b"not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_unknown_system_type_fails() {
        let raw = br#"{"seq":0,"timestamp":0,
            "payload":{"type":"System","data":{"type":"Teleport"}}}"#;
        let result: Result<Envelope, _> = JsonCodec.decode(raw);
        assert!(result.is_err());
    }
}
