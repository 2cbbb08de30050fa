//! The two per-room timers: the connection watchdog and the expiration
//! deadline.
//!
//! Each runs as its own task holding an `Arc` to the room and ends early
//! once the room closes, so a deleted room doesn't linger until its
//! deadline.

use std::sync::Arc;
use std::time::Duration;

use crate::{GameRoom, RoomSink};

pub(crate) fn spawn_room_timers<S: RoomSink>(
    room: Arc<GameRoom<S>>,
    connect_timeout: Duration,
) {
    tokio::spawn(watchdog(Arc::clone(&room), connect_timeout));
    tokio::spawn(expiration(room));
}

/// Times the room out if it hasn't filled within `connect_timeout`.
async fn watchdog<S: RoomSink>(room: Arc<GameRoom<S>>, connect_timeout: Duration) {
    tokio::select! {
        _ = tokio::time::sleep(connect_timeout) => {
            room.connect_deadline_passed().await;
        }
        _ = room.settled() => {}
        _ = room.closed() => {}
    }
}

/// Signals every relay loop in the room once its lifetime is up.
async fn expiration<S: RoomSink>(room: Arc<GameRoom<S>>) {
    tokio::select! {
        _ = tokio::time::sleep_until(room.expires_at()) => room.expire(),
        _ = room.closed() => {}
    }
}
