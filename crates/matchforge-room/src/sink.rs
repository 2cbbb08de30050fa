//! The outbound side of a room session.
//!
//! A room never touches a socket. Every attached slot holds a
//! [`RoomSink`], and the room hands it [`RoomEvent`]s. The server crate
//! implements the trait over a live connection; tests use a channel.

use std::future::Future;

use matchforge_protocol::{PlayerInfo, RoomDetail};
use tokio::sync::mpsc;

use crate::DeliveryError;

/// Something a room tells one of its sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// A player attached to their slot.
    PlayerConnected(PlayerInfo),
    /// A player detached from their slot.
    PlayerDisconnected(PlayerInfo),
    /// Every slot is attached; this is the roster.
    Detail(RoomDetail),
    /// Game data from another player, passed through untouched.
    Relay(Vec<u8>),
}

/// Delivers room events to one session.
///
/// `deliver` is awaited while the room's lock is held, so implementations
/// should hand the event off quickly (write to a socket, push onto a
/// channel) rather than wait on the peer.
pub trait RoomSink: Send + Sync + 'static {
    fn deliver(
        &self,
        event: &RoomEvent,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

impl RoomSink for mpsc::UnboundedSender<RoomEvent> {
    async fn deliver(&self, event: &RoomEvent) -> Result<(), DeliveryError> {
        self.send(event.clone())
            .map_err(|_| DeliveryError::new("session receiver dropped"))
    }
}
