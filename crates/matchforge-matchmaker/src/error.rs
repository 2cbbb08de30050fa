//! Error types for the matchmaking layer.

use matchforge_protocol::{GameMode, PlayerId};

/// Reasons a match request is refused at enqueue time.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// The player is still seated in a live room.
    #[error("player {0} is already in a game")]
    AlreadyInGame(PlayerId),

    /// No queue is configured for this mode.
    #[error("unsupported game mode {0}")]
    UnknownMode(GameMode),

    /// The scheduler has shut down and its queues are closed.
    #[error("matchmaking has stopped")]
    Stopped,
}
