//! Room registry: allocates room IDs, tracks live rooms and which player
//! is seated where.
//!
//! The registry's maps sit behind one synchronous lock that is never held
//! across an `.await`, so lookups from the session handlers and the
//! scheduler never wait on a room.

use std::collections::HashMap;
use std::sync::Arc;

use matchforge_protocol::{PlayerId, RoomAssignment, RoomId, Slot};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::timers::spawn_room_timers;
use crate::{GameRoom, RoomConfig, RoomError, RoomSink};

/// The registry's maps. Rooms reach this through a `Weak` to remove
/// themselves on close.
pub(crate) struct Directory<S: RoomSink> {
    rooms: HashMap<RoomId, Arc<GameRoom<S>>>,
    seats: HashMap<PlayerId, RoomAssignment>,
    next_room_id: u32,
}

impl<S: RoomSink> Directory<S> {
    /// Removes `room` and the seats that still point at it. A newer room
    /// that reused the ID is left alone.
    pub(crate) fn remove_room(&mut self, room: &GameRoom<S>) -> bool {
        let room_id = room.id();
        let is_registered = self
            .rooms
            .get(&room_id)
            .is_some_and(|stored| std::ptr::eq(Arc::as_ptr(stored), room));
        if !is_registered {
            return false;
        }
        self.rooms.remove(&room_id);
        for player in room.roster() {
            if self
                .seats
                .get(player)
                .is_some_and(|seat| seat.room_id == room_id)
            {
                self.seats.remove(player);
            }
        }
        true
    }
}

/// Counts reported by [`RoomRegistry::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub active_rooms: usize,
    pub in_game_players: usize,
    pub next_room_id: RoomId,
}

/// Owns every live [`GameRoom`] and the player → seat index.
///
/// Cheap to clone: clones share the same maps.
pub struct RoomRegistry<S: RoomSink> {
    directory: Arc<Mutex<Directory<S>>>,
    config: RoomConfig,
}

impl<S: RoomSink> Clone for RoomRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            directory: Arc::clone(&self.directory),
            config: self.config.clone(),
        }
    }
}

impl<S: RoomSink> RoomRegistry<S> {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            directory: Arc::new(Mutex::new(Directory {
                rooms: HashMap::new(),
                seats: HashMap::new(),
                next_room_id: 0,
            })),
            config: config.validated(),
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Creates a room for `players`, seated in the given order.
    ///
    /// Every player is recorded as in-game and the room's connection
    /// watchdog and expiration timers start now. Must be called from
    /// within a Tokio runtime.
    ///
    /// # Errors
    /// `IdExhausted` if the next room ID is still taken by a live room.
    /// The ID counter is not advanced in that case.
    pub fn create_room(
        &self,
        players: Vec<PlayerId>,
    ) -> Result<Arc<GameRoom<S>>, RoomError> {
        let room = {
            let mut directory = self.directory.lock();
            let room_id = RoomId(directory.next_room_id);
            if directory.rooms.contains_key(&room_id) {
                tracing::error!(%room_id, "room ID space exhausted");
                return Err(RoomError::IdExhausted(room_id));
            }
            directory.next_room_id =
                ((u64::from(room_id.0) + 1) % u64::from(self.config.id_space)) as u32;

            let room = Arc::new(GameRoom::new(
                room_id,
                players,
                Instant::now() + self.config.expiration,
                Arc::downgrade(&self.directory),
            ));
            for (index, player) in room.roster().iter().enumerate() {
                directory.seats.insert(
                    player.clone(),
                    RoomAssignment {
                        room_id,
                        slot: Slot(index as u32),
                    },
                );
            }
            directory.rooms.insert(room_id, Arc::clone(&room));
            room
        };

        tracing::info!(
            room_id = %room.id(),
            players = room.capacity(),
            "room created"
        );
        spawn_room_timers(Arc::clone(&room), self.config.connect_timeout);
        Ok(room)
    }

    /// Closes a room by hand and removes it with its roster's seats.
    ///
    /// Rooms delete themselves when their last session leaves; this is
    /// for callers that need a room gone now. Attached sessions are
    /// dropped and relay loops watching [`GameRoom::closed`] end.
    /// Returns `false` if the room was already gone.
    pub async fn delete_room(&self, room_id: RoomId) -> bool {
        let Some(room) = self.room(room_id) else {
            return false;
        };
        room.shut_down().await
    }

    pub fn room(&self, room_id: RoomId) -> Option<Arc<GameRoom<S>>> {
        self.directory.lock().rooms.get(&room_id).cloned()
    }

    /// Where `player` is seated, if anywhere.
    pub fn seat_of(&self, player: &PlayerId) -> Option<RoomAssignment> {
        self.directory.lock().seats.get(player).copied()
    }

    pub fn is_in_game(&self, player: &PlayerId) -> bool {
        self.directory.lock().seats.contains_key(player)
    }

    /// Live rooms, ascending by ID.
    pub fn rooms(&self) -> Vec<Arc<GameRoom<S>>> {
        let mut rooms: Vec<_> =
            self.directory.lock().rooms.values().cloned().collect();
        rooms.sort_by_key(|room| room.id());
        rooms
    }

    pub fn stats(&self) -> RegistryStats {
        let directory = self.directory.lock();
        RegistryStats {
            active_rooms: directory.rooms.len(),
            in_game_players: directory.seats.len(),
            next_room_id: RoomId(directory.next_room_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RoomEvent, RoomState};
    use std::time::Duration;
    use tokio::sync::mpsc::{self, UnboundedSender};

    type Registry = RoomRegistry<UnboundedSender<RoomEvent>>;

    fn players(names: &[&str]) -> Vec<PlayerId> {
        names.iter().map(|name| PlayerId::from(*name)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_room_seats_players_in_order() {
        let registry = Registry::new(RoomConfig::default());

        let room = registry.create_room(players(&["alice", "bob"])).unwrap();

        assert_eq!(room.id(), RoomId(0));
        assert_eq!(
            registry.seat_of(&PlayerId::from("bob")),
            Some(RoomAssignment {
                room_id: RoomId(0),
                slot: Slot(1),
            })
        );
        assert!(registry.is_in_game(&PlayerId::from("alice")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_room_ids_are_sequential() {
        let registry = Registry::new(RoomConfig::default());

        let first = registry.create_room(players(&["a", "b"])).unwrap();
        let second = registry.create_room(players(&["c", "d"])).unwrap();

        assert_eq!(first.id(), RoomId(0));
        assert_eq!(second.id(), RoomId(1));
        assert_eq!(registry.stats().next_room_id, RoomId(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_room_occupied_id_returns_exhausted() {
        let registry = Registry::new(RoomConfig {
            id_space: 2,
            ..RoomConfig::default()
        });
        registry.create_room(players(&["a", "b"])).unwrap();
        registry.create_room(players(&["c", "d"])).unwrap();

        let result = registry.create_room(players(&["e", "f"]));

        assert!(matches!(result, Err(RoomError::IdExhausted(RoomId(0)))));
        assert!(!registry.is_in_game(&PlayerId::from("e")));
        assert_eq!(registry.stats().next_room_id, RoomId(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_room_wraps_to_freed_id() {
        let registry = Registry::new(RoomConfig {
            id_space: 2,
            ..RoomConfig::default()
        });
        registry.create_room(players(&["a", "b"])).unwrap();
        registry.create_room(players(&["c", "d"])).unwrap();
        assert!(registry.delete_room(RoomId(0)).await);

        let room = registry.create_room(players(&["e", "f"])).unwrap();

        assert_eq!(room.id(), RoomId(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_room_clears_seats_once() {
        let registry = Registry::new(RoomConfig::default());
        let room = registry.create_room(players(&["alice", "bob"])).unwrap();

        assert!(registry.delete_room(room.id()).await);
        assert!(!registry.delete_room(room.id()).await);

        assert!(registry.room(room.id()).is_none());
        assert!(!registry.is_in_game(&PlayerId::from("alice")));
        assert_eq!(registry.stats().in_game_players, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_room_keeps_seat_in_newer_room() {
        let registry = Registry::new(RoomConfig::default());
        let old = registry.create_room(players(&["alice", "bob"])).unwrap();
        let new = registry.create_room(players(&["alice", "carol"])).unwrap();

        registry.delete_room(old.id()).await;

        assert_eq!(
            registry.seat_of(&PlayerId::from("alice")).map(|s| s.room_id),
            Some(new.id())
        );
        assert!(!registry.is_in_game(&PlayerId::from("bob")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_room_closes_room_before_id_is_reused() {
        let registry = Registry::new(RoomConfig {
            id_space: 2,
            ..RoomConfig::default()
        });
        let old = registry.create_room(players(&["a", "b"])).unwrap();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        let (first, second) =
            tokio::join!(old.connect(Slot(0), tx_a), old.connect(Slot(1), tx_b));
        first.unwrap();
        second.unwrap();

        assert!(registry.delete_room(old.id()).await);
        assert!(old.is_closed());
        assert_eq!(old.snapshot().await.state, RoomState::Closed);
        assert_eq!(old.snapshot().await.connected, 0);

        registry.create_room(players(&["c", "d"])).unwrap();
        let new = registry.create_room(players(&["e", "f"])).unwrap();
        assert_eq!(new.id(), old.id());

        assert!(matches!(
            old.disconnect(Slot(0)).await,
            Err(RoomError::RoomClosed(_))
        ));
        assert!(registry.room(new.id()).is_some());
        assert!(registry.is_in_game(&PlayerId::from("e")));
        assert!(!registry.is_in_game(&PlayerId::from("a")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_room_ignores_stale_room_with_reused_id() {
        let registry = Registry::new(RoomConfig {
            id_space: 1,
            ..RoomConfig::default()
        });
        let stale = registry.create_room(players(&["a", "b"])).unwrap();
        registry.directory.lock().rooms.remove(&stale.id());
        let current = registry.create_room(players(&["c", "d"])).unwrap();

        assert!(!registry.directory.lock().remove_room(&stale));

        assert!(registry.room(current.id()).is_some());
        assert!(registry.is_in_game(&PlayerId::from("c")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_room_releases_parked_connect() {
        let registry = Registry::new(RoomConfig::default());
        let room = registry.create_room(players(&["a", "b"])).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();

        let parked = tokio::spawn({
            let room = Arc::clone(&room);
            async move { room.connect(Slot(0), tx).await }
        });
        while room.snapshot().await.connected < 1 {
            tokio::task::yield_now().await;
        }
        assert!(registry.delete_room(room.id()).await);

        assert!(matches!(
            parked.await.unwrap(),
            Err(RoomError::RoomClosed(_))
        ));
        assert!(!registry.is_in_game(&PlayerId::from("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_counts_rooms_and_players() {
        let registry = Registry::new(RoomConfig {
            connect_timeout: Duration::from_secs(10),
            ..RoomConfig::default()
        });
        registry.create_room(players(&["a", "b"])).unwrap();
        registry.create_room(players(&["c", "d", "e"])).unwrap();

        let stats = registry.stats();

        assert_eq!(stats.active_rooms, 2);
        assert_eq!(stats.in_game_players, 5);
        assert_eq!(registry.rooms().len(), 2);
    }
}
