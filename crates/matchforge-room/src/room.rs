//! A single game room: the slots of one match and the sessions attached
//! to them.
//!
//! Unlike a room actor, a `GameRoom` is shared state behind one async
//! lock. Every caller (the session handlers, the two room timers) takes
//! the lock, does its work, and releases it. The only operation that
//! waits on another task is a [`connect`](GameRoom::connect) that arrives
//! before the room is full: it parks on a `watch` channel with the lock
//! released.
//!
//! Lock order is room, then registry. The registry never takes a room
//! lock, so a room may remove itself from the registry while holding its
//! own lock.

use std::sync::Weak;

use matchforge_protocol::{PlayerId, PlayerInfo, RoomDetail, RoomId, Slot};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::registry::Directory;
use crate::{RoomError, RoomEvent, RoomSink, RoomState};

/// The result of a successful [`GameRoom::connect`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Admission {
    /// Slots that could not be sent the room detail when this connect
    /// filled the room. The room is full regardless.
    pub undelivered: Vec<Slot>,
}

/// The result of a successful [`GameRoom::disconnect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// The room stays open with this many sessions attached. Zero only
    /// while the room is still filling.
    Remaining(usize),
    /// That was the last session. The room is closed and deleted.
    Closed,
}

/// A point-in-time view of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub state: RoomState,
    pub capacity: usize,
    pub connected: usize,
    /// Slots with a session attached, ascending.
    pub attached: Vec<Slot>,
}

struct Occupancy<S> {
    sessions: Vec<Option<S>>,
    connected: usize,
    state: RoomState,
}

/// One match: a fixed roster, one session slot per player, and the
/// lifecycle described by [`RoomState`].
pub struct GameRoom<S: RoomSink> {
    id: RoomId,
    roster: Vec<PlayerId>,
    expires_at: Instant,
    occupancy: Mutex<Occupancy<S>>,
    /// Published once when the room leaves `Filling`. Parked connects
    /// subscribe to it.
    fill_outcome: watch::Sender<RoomState>,
    expired: CancellationToken,
    closed: CancellationToken,
    directory: Weak<SyncMutex<Directory<S>>>,
}

impl<S: RoomSink> GameRoom<S> {
    pub(crate) fn new(
        id: RoomId,
        roster: Vec<PlayerId>,
        expires_at: Instant,
        directory: Weak<SyncMutex<Directory<S>>>,
    ) -> Self {
        let sessions = roster.iter().map(|_| None).collect();
        let (fill_outcome, _) = watch::channel(RoomState::Filling);
        Self {
            id,
            roster,
            expires_at,
            occupancy: Mutex::new(Occupancy {
                sessions,
                connected: 0,
                state: RoomState::Filling,
            }),
            fill_outcome,
            expired: CancellationToken::new(),
            closed: CancellationToken::new(),
            directory,
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Player IDs in slot order.
    pub fn roster(&self) -> &[PlayerId] {
        &self.roster
    }

    pub fn capacity(&self) -> usize {
        self.roster.len()
    }

    /// When the room's maximum lifetime runs out.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Checks that `slot` exists and belongs to `player`.
    pub fn validate(
        &self,
        slot: Slot,
        player: &PlayerId,
    ) -> Result<(), RoomError> {
        match self.roster.get(slot.index()) {
            Some(owner) if owner == player => Ok(()),
            _ => Err(RoomError::SlotMismatch {
                room_id: self.id,
                slot,
            }),
        }
    }

    /// Attaches `session` to `slot`.
    ///
    /// While the room is filling, this waits (without holding the room
    /// lock) until every slot is attached or the connection watchdog
    /// fires. The connect that fills the room sends the room detail to
    /// every slot and then releases the waiters.
    ///
    /// # Errors
    /// - `AlreadyTimedOut` / `RoomClosed` if the room no longer accepts
    ///   sessions, or `RoomClosed` if the room is deleted while waiting.
    /// - `AlreadyConnected` if the slot is taken.
    /// - `ConnectionTimedOut` if the watchdog fired while waiting. The
    ///   session stays attached; the caller must still
    ///   [`disconnect`](Self::disconnect).
    ///
    /// Dropping the future while it waits also leaves the session
    /// attached. Release the slot with [`disconnect`](Self::disconnect),
    /// which is allowed while the room is filling.
    pub async fn connect(
        &self,
        slot: Slot,
        session: S,
    ) -> Result<Admission, RoomError> {
        let mut occupancy = self.occupancy.lock().await;
        if !occupancy.state.accepts_connections() {
            return Err(match occupancy.state {
                RoomState::TimedOut => RoomError::AlreadyTimedOut(self.id),
                _ => RoomError::RoomClosed(self.id),
            });
        }

        let Some(entry) = occupancy.sessions.get_mut(slot.index()) else {
            return Err(RoomError::SlotMismatch {
                room_id: self.id,
                slot,
            });
        };
        if entry.is_some() {
            return Err(RoomError::AlreadyConnected {
                room_id: self.id,
                slot,
            });
        }
        *entry = Some(session);
        occupancy.connected += 1;

        tracing::info!(
            room_id = %self.id,
            %slot,
            connected = occupancy.connected,
            capacity = self.capacity(),
            "player connected"
        );

        let notice = RoomEvent::PlayerConnected(self.player_info(slot));
        self.notify_others(&occupancy, &notice, slot).await;

        let is_full = occupancy.connected == self.capacity();
        let state = occupancy.state;
        match state {
            RoomState::Filling if !is_full => {
                let mut outcome = self.fill_outcome.subscribe();
                drop(occupancy);
                self.await_fill(&mut outcome).await?;
                Ok(Admission::default())
            }
            RoomState::Filling => {
                self.advance(&mut occupancy, RoomState::Full);
                tracing::info!(room_id = %self.id, "room full");
                let undelivered = self.fan_out_detail(&occupancy).await;
                self.fill_outcome.send_replace(RoomState::Full);
                Ok(Admission { undelivered })
            }
            // Reconnect into a vacated slot of a running match.
            _ if is_full => {
                tracing::info!(room_id = %self.id, %slot, "room full again");
                let undelivered = self.fan_out_detail(&occupancy).await;
                Ok(Admission { undelivered })
            }
            _ => Ok(Admission::default()),
        }
    }

    /// Detaches the session at `slot`.
    ///
    /// When the last session leaves a full or timed-out room, the room
    /// closes and removes itself (and its roster's seats) from the
    /// registry. Otherwise the others get a best-effort "player
    /// disconnected" notice.
    ///
    /// A room still filling stays registered even when emptied, so the
    /// rest of the roster can still attach. The watchdog deletes it if
    /// nobody does.
    pub async fn disconnect(&self, slot: Slot) -> Result<Departure, RoomError> {
        let mut occupancy = self.occupancy.lock().await;
        if occupancy.state.is_terminal() {
            return Err(RoomError::RoomClosed(self.id));
        }

        let detached = occupancy
            .sessions
            .get_mut(slot.index())
            .and_then(Option::take);
        if detached.is_none() {
            return Err(RoomError::SlotVacant {
                room_id: self.id,
                slot,
            });
        }
        occupancy.connected -= 1;

        tracing::info!(
            room_id = %self.id,
            %slot,
            connected = occupancy.connected,
            "player disconnected"
        );

        if occupancy.connected == 0 && occupancy.state != RoomState::Filling {
            self.close(&mut occupancy);
            return Ok(Departure::Closed);
        }

        let notice = RoomEvent::PlayerDisconnected(self.player_info(slot));
        self.notify_others(&occupancy, &notice, slot).await;
        Ok(Departure::Remaining(occupancy.connected))
    }

    /// Relays game data from `issuer` to every other slot.
    ///
    /// Requires every slot to be attached. Holds the room lock for the
    /// whole fan-out, so broadcasts on one room never interleave. The
    /// first failed delivery stops the fan-out and is returned; earlier
    /// recipients have already received the data.
    pub async fn broadcast(
        &self,
        data: Vec<u8>,
        issuer: Slot,
    ) -> Result<(), RoomError> {
        let occupancy = self.occupancy.lock().await;
        if occupancy.connected < self.capacity() {
            return Err(RoomError::RoomNotFull(self.id));
        }

        let event = RoomEvent::Relay(data);
        for (index, session) in occupancy.sessions.iter().enumerate() {
            let slot = Slot(index as u32);
            if slot == issuer {
                continue;
            }
            if let Some(session) = session {
                session
                    .deliver(&event)
                    .await
                    .map_err(|source| RoomError::Delivery { slot, source })?;
            }
        }
        Ok(())
    }

    /// Sends the room detail to every slot, stopping at the first
    /// failure. Requires every slot to be attached.
    pub async fn send_room_detail(&self) -> Result<(), RoomError> {
        let occupancy = self.occupancy.lock().await;
        if occupancy.connected < self.capacity() {
            return Err(RoomError::RoomNotFull(self.id));
        }

        let event = RoomEvent::Detail(self.detail());
        for (index, session) in occupancy.sessions.iter().enumerate() {
            if let Some(session) = session {
                session.deliver(&event).await.map_err(|source| {
                    RoomError::Delivery {
                        slot: Slot(index as u32),
                        source,
                    }
                })?;
            }
        }
        Ok(())
    }

    /// The roster as sent to clients.
    pub fn detail(&self) -> RoomDetail {
        RoomDetail {
            room_size: self.capacity() as u32,
            players: (0..self.capacity())
                .map(|index| self.player_info(Slot(index as u32)))
                .collect(),
        }
    }

    pub async fn snapshot(&self) -> RoomSnapshot {
        let occupancy = self.occupancy.lock().await;
        RoomSnapshot {
            room_id: self.id,
            state: occupancy.state,
            capacity: self.capacity(),
            connected: occupancy.connected,
            attached: occupancy
                .sessions
                .iter()
                .enumerate()
                .filter(|(_, session)| session.is_some())
                .map(|(index, _)| Slot(index as u32))
                .collect(),
        }
    }

    /// Resolves once the room's maximum lifetime has run out.
    ///
    /// Relay loops race their next read against this.
    pub async fn expired(&self) {
        self.expired.cancelled().await;
    }

    pub fn is_expired(&self) -> bool {
        self.expired.is_cancelled()
    }

    /// Resolves once the room is closed and deleted.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Closes the room whatever its state. Every session is detached
    /// without notice, parked connects fail with `RoomClosed`, and the
    /// room leaves the registry. Returns `false` if already closed.
    pub(crate) async fn shut_down(&self) -> bool {
        let mut occupancy = self.occupancy.lock().await;
        if occupancy.state.is_terminal() {
            return false;
        }

        let was_filling = occupancy.state == RoomState::Filling;
        if was_filling {
            self.advance(&mut occupancy, RoomState::TimedOut);
        }
        for session in occupancy.sessions.iter_mut() {
            *session = None;
        }
        occupancy.connected = 0;
        tracing::info!(room_id = %self.id, "room shut down");
        self.close(&mut occupancy);
        if was_filling {
            self.fill_outcome.send_replace(RoomState::Closed);
        }
        true
    }

    // -- Timer hooks --

    /// Resolves when the room stops filling, either way.
    pub(crate) async fn settled(&self) {
        let mut outcome = self.fill_outcome.subscribe();
        let _ = outcome.wait_for(|state| *state != RoomState::Filling).await;
    }

    /// The connection watchdog fired.
    pub(crate) async fn connect_deadline_passed(&self) {
        let mut occupancy = self.occupancy.lock().await;
        if occupancy.state != RoomState::Filling {
            return;
        }

        tracing::warn!(
            room_id = %self.id,
            connected = occupancy.connected,
            capacity = self.capacity(),
            "room timed out before filling"
        );
        self.advance(&mut occupancy, RoomState::TimedOut);
        self.fill_outcome.send_replace(RoomState::TimedOut);

        if occupancy.connected == 0 {
            self.close(&mut occupancy);
        }
    }

    /// The expiration timer fired.
    pub(crate) fn expire(&self) {
        tracing::info!(room_id = %self.id, "room expired");
        self.expired.cancel();
    }

    // -- Internals --

    async fn await_fill(
        &self,
        outcome: &mut watch::Receiver<RoomState>,
    ) -> Result<(), RoomError> {
        let settled = outcome
            .wait_for(|state| *state != RoomState::Filling)
            .await
            .map(|state| *state);
        match settled {
            Ok(RoomState::Full) => Ok(()),
            Ok(RoomState::TimedOut) => Err(RoomError::ConnectionTimedOut(self.id)),
            Ok(_) | Err(_) => Err(RoomError::RoomClosed(self.id)),
        }
    }

    fn advance(&self, occupancy: &mut Occupancy<S>, to: RoomState) {
        if !occupancy.state.can_transition_to(to) {
            tracing::error!(
                room_id = %self.id,
                from = %occupancy.state,
                %to,
                "refusing invalid room transition"
            );
            return;
        }
        occupancy.state = to;
    }

    /// Marks the room closed and removes it from the registry. Runs at
    /// most once because `Closed` is terminal.
    fn close(&self, occupancy: &mut Occupancy<S>) {
        self.advance(occupancy, RoomState::Closed);
        if !occupancy.state.is_terminal() || self.closed.is_cancelled() {
            return;
        }
        self.closed.cancel();

        match self.directory.upgrade() {
            Some(directory) => {
                directory.lock().remove_room(self);
                tracing::info!(room_id = %self.id, "room closed");
            }
            None => {
                tracing::debug!(room_id = %self.id, "registry gone, room closed");
            }
        }
    }

    fn player_info(&self, slot: Slot) -> PlayerInfo {
        PlayerInfo {
            slot,
            player_id: self.roster[slot.index()].clone(),
        }
    }

    /// Best-effort notice to every attached slot except `skip`.
    async fn notify_others(
        &self,
        occupancy: &Occupancy<S>,
        event: &RoomEvent,
        skip: Slot,
    ) {
        for (index, session) in occupancy.sessions.iter().enumerate() {
            let slot = Slot(index as u32);
            if slot == skip {
                continue;
            }
            let Some(session) = session else { continue };
            if let Err(e) = session.deliver(event).await {
                tracing::debug!(room_id = %self.id, %slot, error = %e, "notice dropped");
            }
        }
    }

    /// Sends the room detail to every slot without stopping on failure.
    /// Returns the slots that could not be reached.
    async fn fan_out_detail(&self, occupancy: &Occupancy<S>) -> Vec<Slot> {
        let event = RoomEvent::Detail(self.detail());
        let mut undelivered = Vec::new();
        for (index, session) in occupancy.sessions.iter().enumerate() {
            let slot = Slot(index as u32);
            let Some(session) = session else { continue };
            if let Err(e) = session.deliver(&event).await {
                tracing::warn!(room_id = %self.id, %slot, error = %e, "room detail not delivered");
                undelivered.push(slot);
            }
        }
        undelivered
    }
}

impl<S: RoomSink> std::fmt::Debug for GameRoom<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameRoom")
            .field("id", &self.id)
            .field("roster", &self.roster)
            .field("expired", &self.is_expired())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
