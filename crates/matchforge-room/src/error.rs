//! Error types for the room layer.

use matchforge_protocol::{RoomId, Slot};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist (never created, or already deleted).
    #[error("room {0} not found")]
    UnknownRoom(RoomId),

    /// The slot is out of range or belongs to another player.
    #[error("slot {slot} of room {room_id} is not yours")]
    SlotMismatch { room_id: RoomId, slot: Slot },

    /// A session is already attached to this slot.
    #[error("slot {slot} of room {room_id} is already connected")]
    AlreadyConnected { room_id: RoomId, slot: Slot },

    /// Nothing is attached to this slot.
    #[error("slot {slot} of room {room_id} is not connected")]
    SlotVacant { room_id: RoomId, slot: Slot },

    /// Relaying needs every slot attached.
    #[error("room {0} is not full")]
    RoomNotFull(RoomId),

    /// The connection watchdog already fired for this room.
    #[error("room {0} has timed out")]
    AlreadyTimedOut(RoomId),

    /// The watchdog fired while this session was waiting for the room
    /// to fill.
    #[error("timed out waiting for room {0} to fill")]
    ConnectionTimedOut(RoomId),

    /// The room reached its maximum lifetime.
    #[error("room {0} expired")]
    RoomExpired(RoomId),

    /// The room has been closed and removed from the registry.
    #[error("room {0} is closed")]
    RoomClosed(RoomId),

    /// The next room ID is still held by a live room.
    #[error("room ID space exhausted at {0}")]
    IdExhausted(RoomId),

    /// A session refused an event during a fan-out.
    #[error("delivery to slot {slot} failed")]
    Delivery {
        slot: Slot,
        #[source]
        source: DeliveryError,
    },
}

/// A session could not accept an event.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct DeliveryError(pub String);

impl DeliveryError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}
