//! Room configuration and state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Timing and allocation settings shared by every room in a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// How long a new room may take to get every slot attached before
    /// the connection watchdog times it out.
    pub connect_timeout: Duration,

    /// Hard cap on a room's total lifetime, full or not.
    pub expiration: Duration,

    /// Room IDs are allocated as `counter % id_space`. Reaching an ID that
    /// is still live is reported as exhaustion.
    pub id_space: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            expiration: Duration::from_secs(5 * 60 * 60),
            id_space: u32::MAX,
        }
    }
}

impl RoomConfig {
    /// Longest room lifetime accepted. Room deadlines are computed as
    /// `now + expiration` and must not overflow.
    pub const MAX_EXPIRATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

    /// Fix out-of-range values so the config is safe to use.
    ///
    /// Called by [`RoomRegistry::new`](crate::RoomRegistry::new). Rules:
    /// - `id_space` is at least 1.
    /// - `expiration` is at most [`MAX_EXPIRATION`](Self::MAX_EXPIRATION)
    ///   and `connect_timeout` at most half of it.
    /// - `expiration` is strictly longer than `connect_timeout`, so a
    ///   room always leaves `Filling` before it can expire.
    pub fn validated(mut self) -> Self {
        if self.id_space == 0 {
            tracing::warn!("id_space of 0 is unusable, using 1");
            self.id_space = 1;
        }
        if self.connect_timeout > Self::MAX_EXPIRATION / 2 {
            tracing::warn!(
                connect_timeout_secs = self.connect_timeout.as_secs(),
                "connect timeout too long, clamping"
            );
            self.connect_timeout = Self::MAX_EXPIRATION / 2;
        }
        if self.expiration > Self::MAX_EXPIRATION {
            tracing::warn!(
                expiration_secs = self.expiration.as_secs(),
                "room expiration too long, clamping"
            );
            self.expiration = Self::MAX_EXPIRATION;
        }
        if self.expiration <= self.connect_timeout {
            let fixed = self.connect_timeout * 2;
            tracing::warn!(
                expiration_ms = self.expiration.as_millis() as u64,
                connect_timeout_ms = self.connect_timeout.as_millis() as u64,
                "room expiration must exceed connect timeout, using twice the connect timeout"
            );
            self.expiration = fixed;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
///            ┌──(every slot attached)──→ Full ─────┐
/// Filling ───┤                                      ├──(last disconnect)──→ Closed
///            └──(watchdog fires)──────→ TimedOut ──┘
/// ```
///
/// - **Filling**: created by a pairing, waiting for the players to attach.
/// - **Full**: every slot was attached at once. Relaying is allowed while
///   all slots stay attached; a vacated slot may be re-attached.
/// - **TimedOut**: the watchdog fired before the room filled. No new
///   attachments; survivors drain out.
/// - **Closed**: nobody is attached any more and the room has been
///   removed from the registry. Terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomState {
    Filling,
    Full,
    TimedOut,
    Closed,
}

impl RoomState {
    /// Returns `true` if transitioning to `target` is allowed.
    /// States never move backward.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Filling, Self::Full)
                | (Self::Filling, Self::TimedOut)
                | (Self::Full, Self::Closed)
                | (Self::TimedOut, Self::Closed)
        )
    }

    /// Returns `true` if a session may still attach to a slot.
    pub fn accepts_connections(self) -> bool {
        matches!(self, Self::Filling | Self::Full)
    }

    /// Returns `true` once the room can never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Filling => write!(f, "Filling"),
            Self::Full => write!(f, "Full"),
            Self::TimedOut => write!(f, "TimedOut"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}
