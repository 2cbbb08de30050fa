//! Unified error type for the Matchforge server.

use matchforge_matchmaker::MatchError;
use matchforge_protocol::ProtocolError;
use matchforge_room::RoomError;
use matchforge_session::SessionError;
use matchforge_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum MatchforgeError {
    /// A transport-level error (connection, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The identity token was refused.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (unknown room, slot taken, timed out, expired).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A match request was refused.
    #[error(transparent)]
    Match(#[from] MatchError),

    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The server is stopping.
    #[error("server is shutting down")]
    ShuttingDown,
}

impl MatchforgeError {
    /// The HTTP-style code sent to clients in `SystemMessage::Error`.
    pub fn code(&self) -> u16 {
        match self {
            Self::Protocol(_) => 400,
            Self::Session(_) => 401,
            Self::Room(e) => room_error_code(e),
            Self::Match(e) => match_error_code(e),
            Self::ShuttingDown => 503,
            Self::Transport(_) | Self::Config(_) => 500,
        }
    }
}

pub(crate) fn room_error_code(error: &RoomError) -> u16 {
    match error {
        RoomError::SlotMismatch { .. } => 403,
        RoomError::UnknownRoom(_) => 404,
        RoomError::AlreadyTimedOut(_) | RoomError::ConnectionTimedOut(_) => 408,
        RoomError::AlreadyConnected { .. }
        | RoomError::SlotVacant { .. }
        | RoomError::RoomNotFull(_) => 409,
        RoomError::RoomExpired(_) | RoomError::RoomClosed(_) => 410,
        RoomError::IdExhausted(_) | RoomError::Delivery { .. } => 503,
    }
}

pub(crate) fn match_error_code(error: &MatchError) -> u16 {
    match error {
        MatchError::UnknownMode(_) => 404,
        MatchError::AlreadyInGame(_) => 409,
        MatchError::Stopped => 503,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchforge_protocol::{GameMode, PlayerId, RoomId, Slot};

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let matchforge_err: MatchforgeError = err.into();
        assert!(matches!(matchforge_err, MatchforgeError::Transport(_)));
        assert!(matchforge_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_session_error_is_unauthorized() {
        let err: MatchforgeError = SessionError::AuthFailed("nope".into()).into();
        assert!(matches!(err, MatchforgeError::Session(_)));
        assert_eq!(err.code(), 401);
    }

    #[test]
    fn test_room_error_codes() {
        let code = |e: RoomError| MatchforgeError::from(e).code();
        assert_eq!(code(RoomError::UnknownRoom(RoomId(1))), 404);
        assert_eq!(
            code(RoomError::SlotMismatch {
                room_id: RoomId(1),
                slot: Slot(0),
            }),
            403
        );
        assert_eq!(
            code(RoomError::AlreadyConnected {
                room_id: RoomId(1),
                slot: Slot(0),
            }),
            409
        );
        assert_eq!(code(RoomError::ConnectionTimedOut(RoomId(1))), 408);
        assert_eq!(code(RoomError::RoomExpired(RoomId(1))), 410);
        assert_eq!(code(RoomError::IdExhausted(RoomId(0))), 503);
    }

    #[test]
    fn test_match_error_codes() {
        let code = |e: MatchError| MatchforgeError::from(e).code();
        assert_eq!(code(MatchError::UnknownMode(GameMode(9))), 404);
        assert_eq!(code(MatchError::AlreadyInGame(PlayerId::from("a"))), 409);
        assert_eq!(code(MatchError::Stopped), 503);
    }
}
