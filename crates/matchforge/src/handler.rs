//! Per-connection handler: handshake, lobby, queue and room relay.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version, authenticate the token
//!   2. Send HandshakeAck → the connection now speaks for a `PlayerId`
//!   3. Lobby loop: heartbeats, `CheckRoom`, and the two long-running
//!      requests, `JoinQueue` and `EnterRoom`
//!   4. Once a room stream ends, send `Disconnect { reason }` and close
//!
//! Every loop also watches the server's shutdown token.

use std::sync::Arc;

use matchforge_matchmaker::{MatchError, MatchOutcome, MatchRequest, Scheduler, Ticket};
use matchforge_protocol::{
    Codec, GameMode, Payload, PlayerId, ProtocolError, RoomId, Slot, SystemMessage,
};
use matchforge_room::{Departure, GameRoom, RoomError, RoomSink};
use matchforge_session::Authenticator;
use matchforge_transport::Connection;

use crate::MatchforgeError;
use crate::server::{PROTOCOL_VERSION, ServerState};
use crate::sink::{ConnectionSink, Inbound, Outbox};

type Shared<C, K> = Arc<Outbox<C, K>>;
type Room<C, K> = GameRoom<ConnectionSink<C, K>>;

/// What the lobby does after a request completes.
enum Flow {
    Continue,
    /// Close the connection, with the reason to send (if any).
    End(Option<String>),
}

/// Cancels a queued match request when the waiting handler exits, however
/// it exits. A no-op once the request has been paired.
struct QueueGuard<'a, S: RoomSink> {
    scheduler: &'a Scheduler<S>,
    ticket: Ticket,
}

impl<S: RoomSink> Drop for QueueGuard<'_, S> {
    fn drop(&mut self) {
        if self.scheduler.cancel(self.ticket) {
            tracing::debug!(mode = %self.ticket.mode(), "queued request cancelled");
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, C, K>(
    conn: C,
    state: Arc<ServerState<A, C, K>>,
) -> Result<(), MatchforgeError>
where
    A: Authenticator,
    C: Connection,
    K: Codec + Clone,
{
    let outbox = Arc::new(Outbox::new(conn, state.codec.clone()));
    let conn_id = outbox.id();
    tracing::debug!(%conn_id, "handling new connection");

    let player_id = match perform_handshake(&outbox, &state).await {
        Ok(player_id) => player_id,
        Err(e) => {
            outbox.close(None).await;
            return Err(e);
        }
    };
    tracing::info!(%conn_id, %player_id, "player authenticated");

    let result = lobby(&outbox, &state, &player_id).await;
    let reason = match &result {
        Ok(reason) => reason.clone(),
        Err(_) => None,
    };
    outbox.close(reason).await;
    tracing::debug!(%conn_id, %player_id, "connection closed");
    result.map(|_| ())
}

/// Receives Handshake, checks the version, authenticates, sends the ack.
async fn perform_handshake<A, C, K>(
    outbox: &Shared<C, K>,
    state: &ServerState<A, C, K>,
) -> Result<PlayerId, MatchforgeError>
where
    A: Authenticator,
    C: Connection,
    K: Codec,
{
    let inbound = tokio::time::timeout(state.handshake_timeout, outbox.recv())
        .await
        .map_err(|_| invalid("handshake timed out"))??;

    let envelope = match inbound {
        Inbound::Envelope(envelope) => envelope,
        Inbound::Malformed(e) => {
            let error = MatchforgeError::from(e);
            outbox.reject(&error).await?;
            return Err(error);
        }
        Inbound::Closed => return Err(invalid("connection closed before handshake")),
    };

    let (version, token) = match envelope.payload {
        Payload::System(SystemMessage::Handshake { version, token }) => (version, token),
        _ => {
            let error = invalid("first message must be Handshake");
            outbox.reject(&error).await?;
            return Err(error);
        }
    };

    if version != PROTOCOL_VERSION {
        let error = invalid(format!(
            "version mismatch: expected {PROTOCOL_VERSION}, got {version}"
        ));
        outbox.reject(&error).await?;
        return Err(error);
    }

    let player_id = match state.auth.authenticate(&token).await {
        Ok(player_id) => player_id,
        Err(e) => {
            tracing::warn!(conn_id = %outbox.id(), error = %e, "authentication failed");
            outbox.error(401, "unauthorized").await?;
            return Err(e.into());
        }
    };

    outbox
        .system(SystemMessage::HandshakeAck {
            player_id: player_id.clone(),
            server_time: outbox.elapsed_ms(),
        })
        .await?;
    Ok(player_id)
}

/// Serves requests until the client leaves, a room stream ends, or the
/// server shuts down. Returns the farewell reason.
async fn lobby<A, C, K>(
    outbox: &Shared<C, K>,
    state: &ServerState<A, C, K>,
    player_id: &PlayerId,
) -> Result<Option<String>, MatchforgeError>
where
    A: Authenticator,
    C: Connection,
    K: Codec,
{
    loop {
        let inbound = tokio::select! {
            _ = state.shutdown.cancelled() => {
                return Ok(Some(MatchforgeError::ShuttingDown.to_string()));
            }
            inbound = outbox.recv() => inbound?,
        };

        let envelope = match inbound {
            Inbound::Envelope(envelope) => envelope,
            Inbound::Malformed(e) => {
                tracing::debug!(%player_id, error = %e, "failed to decode envelope");
                outbox.reject(&e.into()).await?;
                continue;
            }
            Inbound::Closed => {
                tracing::info!(%player_id, "connection closed cleanly");
                return Ok(None);
            }
        };

        let msg = match envelope.payload {
            Payload::System(msg) => msg,
            Payload::Game(_) => {
                outbox.error(400, "game data outside a room").await?;
                continue;
            }
        };

        let flow = match msg {
            SystemMessage::Heartbeat { client_time } => {
                heartbeat(outbox, client_time).await?;
                Flow::Continue
            }
            SystemMessage::JoinQueue { mode } => {
                join_queue(outbox, state, player_id, mode).await?
            }
            SystemMessage::CancelQueue => {
                outbox.system(SystemMessage::QueueCancelled).await?;
                Flow::Continue
            }
            SystemMessage::CheckRoom => {
                let assignment = state.registry.seat_of(player_id);
                outbox
                    .system(SystemMessage::RoomStatus { assignment })
                    .await?;
                Flow::Continue
            }
            SystemMessage::EnterRoom { room_id, slot } => {
                room_stream(outbox, state, player_id, room_id, slot).await?
            }
            SystemMessage::Disconnect { reason } => {
                tracing::info!(%player_id, %reason, "client disconnected");
                Flow::End(None)
            }
            _ => {
                tracing::debug!(%player_id, "ignoring unexpected system message");
                outbox.error(400, "unexpected message").await?;
                Flow::Continue
            }
        };

        if let Flow::End(reason) = flow {
            return Ok(reason);
        }
    }
}

/// Queues the player and waits for the outcome while still listening to
/// the client, so it can cancel or leave.
async fn join_queue<A, C, K>(
    outbox: &Shared<C, K>,
    state: &ServerState<A, C, K>,
    player_id: &PlayerId,
    mode: GameMode,
) -> Result<Flow, MatchforgeError>
where
    A: Authenticator,
    C: Connection,
    K: Codec,
{
    let (request, mut outcome) = MatchRequest::new(player_id.clone());
    let ticket = match state.scheduler.enqueue(mode, request) {
        Ok(ticket) => ticket,
        Err(e) => {
            tracing::warn!(%player_id, %mode, error = %e, "match request rejected");
            outbox.reject(&e.into()).await?;
            return Ok(Flow::Continue);
        }
    };
    let _guard = QueueGuard {
        scheduler: &state.scheduler,
        ticket,
    };
    tracing::debug!(%player_id, %mode, "queued for match");

    loop {
        tokio::select! {
            result = &mut outcome => {
                match result {
                    Ok(MatchOutcome::Matched(seat)) => {
                        outbox
                            .system(SystemMessage::Matched {
                                room_id: seat.room_id,
                                slot: seat.slot,
                            })
                            .await?;
                    }
                    Ok(MatchOutcome::Unavailable) => {
                        outbox.system(SystemMessage::MatchUnavailable).await?;
                    }
                    Err(_) => {
                        // The scheduler dropped the request on its way down.
                        outbox.reject(&MatchError::Stopped.into()).await?;
                    }
                }
                return Ok(Flow::Continue);
            }
            _ = state.shutdown.cancelled() => {
                return Ok(Flow::End(Some(MatchforgeError::ShuttingDown.to_string())));
            }
            inbound = outbox.recv() => {
                let envelope = match inbound? {
                    Inbound::Envelope(envelope) => envelope,
                    Inbound::Malformed(e) => {
                        outbox.reject(&e.into()).await?;
                        continue;
                    }
                    Inbound::Closed => return Ok(Flow::End(None)),
                };
                match envelope.payload {
                    Payload::System(SystemMessage::CancelQueue) => {
                        if !state.scheduler.cancel(ticket) {
                            tracing::debug!(%player_id, "cancel arrived after pairing");
                        }
                        outbox.system(SystemMessage::QueueCancelled).await?;
                        return Ok(Flow::Continue);
                    }
                    Payload::System(SystemMessage::Disconnect { reason }) => {
                        tracing::info!(%player_id, %reason, "client left the queue");
                        return Ok(Flow::End(None));
                    }
                    Payload::System(SystemMessage::Heartbeat { client_time }) => {
                        heartbeat(outbox, client_time).await?;
                    }
                    _ => {
                        outbox.error(409, "waiting for a match").await?;
                    }
                }
            }
        }
    }
}

/// Attaches the connection to its slot and relays until the stream ends.
///
/// Lookup, ownership and connect failures are reported and leave the
/// client in the lobby. Once attached, the stream always ends with a
/// disconnect from the room and a closed connection.
async fn room_stream<A, C, K>(
    outbox: &Shared<C, K>,
    state: &ServerState<A, C, K>,
    player_id: &PlayerId,
    room_id: RoomId,
    slot: Slot,
) -> Result<Flow, MatchforgeError>
where
    A: Authenticator,
    C: Connection,
    K: Codec,
{
    let Some(room) = state.registry.room(room_id) else {
        tracing::warn!(%player_id, %room_id, "enter for unknown room");
        outbox
            .reject(&RoomError::UnknownRoom(room_id).into())
            .await?;
        return Ok(Flow::Continue);
    };
    if let Err(e) = room.validate(slot, player_id) {
        tracing::warn!(%player_id, %room_id, %slot, "slot not owned by player");
        outbox.reject(&e.into()).await?;
        return Ok(Flow::Continue);
    }

    match room.connect(slot, ConnectionSink::new(Arc::clone(outbox))).await {
        Ok(admission) => {
            if !admission.undelivered.is_empty() {
                tracing::warn!(
                    %room_id,
                    undelivered = ?admission.undelivered,
                    "room detail not delivered to every slot"
                );
            }
        }
        Err(e @ RoomError::ConnectionTimedOut(_)) => {
            tracing::info!(%player_id, %room_id, "room never filled");
            leave(&room, slot).await;
            let reason = e.to_string();
            outbox.reject(&e.into()).await?;
            return Ok(Flow::End(Some(reason)));
        }
        Err(e) => {
            tracing::warn!(%player_id, %room_id, %slot, error = %e, "connect refused");
            outbox.reject(&e.into()).await?;
            return Ok(Flow::Continue);
        }
    }
    tracing::info!(%player_id, %room_id, %slot, "player in room");

    let result = relay(outbox, state, &room, slot).await;
    leave(&room, slot).await;
    result.map(Flow::End)
}

/// Forwards the client's game data to the room until the room expires
/// or is closed, the server stops, or the client leaves.
async fn relay<A, C, K>(
    outbox: &Shared<C, K>,
    state: &ServerState<A, C, K>,
    room: &Room<C, K>,
    slot: Slot,
) -> Result<Option<String>, MatchforgeError>
where
    A: Authenticator,
    C: Connection,
    K: Codec,
{
    let room_id = room.id();
    loop {
        let inbound = tokio::select! {
            _ = room.expired() => {
                return Ok(Some(RoomError::RoomExpired(room_id).to_string()));
            }
            _ = room.closed() => {
                return Ok(Some(RoomError::RoomClosed(room_id).to_string()));
            }
            _ = state.shutdown.cancelled() => {
                return Ok(Some(MatchforgeError::ShuttingDown.to_string()));
            }
            inbound = outbox.recv() => inbound?,
        };

        let envelope = match inbound {
            Inbound::Envelope(envelope) => envelope,
            Inbound::Malformed(e) => {
                outbox.reject(&e.into()).await?;
                continue;
            }
            Inbound::Closed => return Ok(None),
        };

        match envelope.payload {
            Payload::Game(data) => {
                if let Err(e) = room.broadcast(data, slot).await {
                    tracing::warn!(%room_id, %slot, error = %e, "relay failed");
                }
            }
            Payload::System(SystemMessage::Heartbeat { client_time }) => {
                heartbeat(outbox, client_time).await?;
            }
            Payload::System(SystemMessage::Disconnect { reason }) => {
                tracing::info!(%room_id, %slot, %reason, "player left room");
                return Ok(Some("left the room".to_string()));
            }
            Payload::System(_) => {
                outbox.error(400, "unexpected message in room").await?;
            }
        }
    }
}

async fn leave<S: RoomSink>(room: &GameRoom<S>, slot: Slot) {
    match room.disconnect(slot).await {
        Ok(Departure::Closed) => {}
        Ok(Departure::Remaining(remaining)) => {
            tracing::debug!(room_id = %room.id(), %slot, remaining, "session detached");
        }
        Err(e) => {
            tracing::debug!(room_id = %room.id(), %slot, error = %e, "detach failed");
        }
    }
}

async fn heartbeat<C: Connection, K: Codec>(
    outbox: &Shared<C, K>,
    client_time: u64,
) -> Result<(), MatchforgeError> {
    outbox
        .system(SystemMessage::HeartbeatAck {
            client_time,
            server_time: outbox.elapsed_ms(),
        })
        .await
}

fn invalid(message: impl Into<String>) -> MatchforgeError {
    ProtocolError::InvalidMessage(message.into()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use matchforge_matchmaker::SchedulerConfig;
    use matchforge_protocol::{Envelope, JsonCodec, PlayerInfo, RoomAssignment, RoomDetail};
    use matchforge_room::RoomConfig;
    use matchforge_session::DevAuthenticator;
    use matchforge_transport::MemoryConnection;

    type State = ServerState<DevAuthenticator, MemoryConnection, JsonCodec>;

    fn state() -> Arc<State> {
        state_with(RoomConfig::default())
    }

    fn state_with(room_config: RoomConfig) -> Arc<State> {
        Arc::new(ServerState::new(
            DevAuthenticator,
            JsonCodec,
            room_config,
            SchedulerConfig::default(),
            Duration::from_secs(5),
        ))
    }

    /// Starts a handler on one end of a memory pair; returns the client end.
    fn connect(
        state: &Arc<State>,
    ) -> (MemoryConnection, tokio::task::JoinHandle<Result<(), MatchforgeError>>) {
        let (server, client) = MemoryConnection::pair();
        let task = tokio::spawn(handle_connection(server, Arc::clone(state)));
        (client, task)
    }

    async fn send(client: &MemoryConnection, msg: SystemMessage) {
        let bytes = JsonCodec.encode(&Envelope::system(0, 0, msg)).unwrap();
        client.send(&bytes).await.unwrap();
    }

    async fn read(client: &MemoryConnection) -> Payload {
        let bytes = tokio::time::timeout(Duration::from_secs(60), client.recv())
            .await
            .expect("timed out waiting for frame")
            .unwrap()
            .expect("connection closed");
        JsonCodec.decode::<Envelope>(&bytes).unwrap().payload
    }

    async fn expect_error(client: &MemoryConnection, expected: u16) {
        match read(client).await {
            Payload::System(SystemMessage::Error { code, .. }) => assert_eq!(code, expected),
            other => panic!("expected Error {expected}, got {other:?}"),
        }
    }

    async fn login(state: &Arc<State>, name: &str) -> MemoryConnection {
        let (client, _task) = connect(state);
        send(
            &client,
            SystemMessage::Handshake {
                version: PROTOCOL_VERSION,
                token: name.into(),
            },
        )
        .await;
        match read(&client).await {
            Payload::System(SystemMessage::HandshakeAck { player_id, .. }) => {
                assert_eq!(player_id, PlayerId::from(name));
            }
            other => panic!("expected HandshakeAck, got {other:?}"),
        }
        client
    }

    /// Creates room 0 for alice and bob, enters both, and consumes the
    /// traffic of the fill.
    async fn enter_full_room(state: &Arc<State>) -> (MemoryConnection, MemoryConnection) {
        state
            .registry
            .create_room(vec![PlayerId::from("alice"), PlayerId::from("bob")])
            .unwrap();
        let alice = login(state, "alice").await;
        let bob = login(state, "bob").await;

        send(
            &alice,
            SystemMessage::EnterRoom {
                room_id: RoomId(0),
                slot: Slot(0),
            },
        )
        .await;
        let room = state.registry.room(RoomId(0)).unwrap();
        while room.snapshot().await.connected < 1 {
            tokio::task::yield_now().await;
        }
        send(
            &bob,
            SystemMessage::EnterRoom {
                room_id: RoomId(0),
                slot: Slot(1),
            },
        )
        .await;

        assert!(matches!(
            read(&alice).await,
            Payload::System(SystemMessage::PlayerConnection { connected: true, .. })
        ));
        assert!(matches!(
            read(&alice).await,
            Payload::System(SystemMessage::RoomDetail(_))
        ));
        assert!(matches!(
            read(&bob).await,
            Payload::System(SystemMessage::RoomDetail(_))
        ));
        (alice, bob)
    }

    /// Reads up to the farewell, skipping the other player's departure
    /// notice, and checks the connection closes after it.
    async fn expect_farewell(client: &MemoryConnection) -> String {
        loop {
            match read(client).await {
                Payload::System(SystemMessage::PlayerConnection { connected: false, .. }) => {}
                Payload::System(SystemMessage::Disconnect { reason }) => {
                    assert!(client.recv().await.unwrap().is_none());
                    return reason;
                }
                other => panic!("expected Disconnect, got {other:?}"),
            }
        }
    }

    // =====================================================================
    // Handshake
    // =====================================================================

    #[tokio::test]
    async fn test_handshake_wrong_version_rejected() {
        let state = state();
        let (client, task) = connect(&state);

        send(
            &client,
            SystemMessage::Handshake {
                version: 99,
                token: "alice".into(),
            },
        )
        .await;

        expect_error(&client, 400).await;
        assert!(task.await.unwrap().is_err());
        assert!(client.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_handshake_empty_token_unauthorized() {
        let state = state();
        let (client, task) = connect(&state);

        send(
            &client,
            SystemMessage::Handshake {
                version: PROTOCOL_VERSION,
                token: "  ".into(),
            },
        )
        .await;

        expect_error(&client, 401).await;
        assert!(matches!(
            task.await.unwrap(),
            Err(MatchforgeError::Session(_))
        ));
    }

    #[tokio::test]
    async fn test_handshake_other_message_first_rejected() {
        let state = state();
        let (client, task) = connect(&state);

        send(&client, SystemMessage::CheckRoom).await;

        expect_error(&client, 400).await;
        assert!(task.await.unwrap().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_silence_times_out() {
        let state = state();
        let (client, task) = connect(&state);

        let result = task.await.unwrap();

        assert!(matches!(result, Err(MatchforgeError::Protocol(_))));
        assert!(client.recv().await.unwrap().is_none());
    }

    // =====================================================================
    // Lobby
    // =====================================================================

    #[tokio::test]
    async fn test_lobby_heartbeat_echoes_client_time() {
        let state = state();
        let client = login(&state, "alice").await;

        send(&client, SystemMessage::Heartbeat { client_time: 42 }).await;

        match read(&client).await {
            Payload::System(SystemMessage::HeartbeatAck { client_time, .. }) => {
                assert_eq!(client_time, 42);
            }
            other => panic!("expected HeartbeatAck, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lobby_malformed_frame_reported_and_survives() {
        let state = state();
        let client = login(&state, "alice").await;

        client.send(b"not json").await.unwrap();
        expect_error(&client, 400).await;

        send(&client, SystemMessage::CheckRoom).await;
        assert_eq!(
            read(&client).await,
            Payload::System(SystemMessage::RoomStatus { assignment: None })
        );
    }

    #[tokio::test]
    async fn test_lobby_check_room_reports_seat() {
        let state = state();
        state
            .registry
            .create_room(vec![PlayerId::from("alice"), PlayerId::from("bob")])
            .unwrap();
        let client = login(&state, "bob").await;

        send(&client, SystemMessage::CheckRoom).await;

        assert_eq!(
            read(&client).await,
            Payload::System(SystemMessage::RoomStatus {
                assignment: Some(RoomAssignment {
                    room_id: RoomId(0),
                    slot: Slot(1),
                }),
            })
        );
    }

    #[tokio::test]
    async fn test_lobby_game_data_outside_room_rejected() {
        let state = state();
        let client = login(&state, "alice").await;

        let bytes = JsonCodec.encode(&Envelope::game(0, 0, vec![1])).unwrap();
        client.send(&bytes).await.unwrap();

        expect_error(&client, 400).await;
    }

    #[tokio::test]
    async fn test_lobby_shutdown_sends_reason() {
        let state = state();
        let client = login(&state, "alice").await;

        state.shutdown.cancel();

        assert_eq!(
            read(&client).await,
            Payload::System(SystemMessage::Disconnect {
                reason: MatchforgeError::ShuttingDown.to_string(),
            })
        );
        assert!(client.recv().await.unwrap().is_none());
    }

    // =====================================================================
    // JoinQueue
    // =====================================================================

    #[tokio::test]
    async fn test_join_queue_unknown_mode_not_found() {
        let state = state();
        let client = login(&state, "alice").await;

        send(&client, SystemMessage::JoinQueue { mode: GameMode(5) }).await;

        expect_error(&client, 404).await;
    }

    #[tokio::test]
    async fn test_join_queue_cancel_replies_and_dequeues() {
        let state = state();
        let client = login(&state, "alice").await;

        send(&client, SystemMessage::JoinQueue { mode: GameMode::DEFAULT }).await;
        send(&client, SystemMessage::CancelQueue).await;

        assert_eq!(read(&client).await, Payload::System(SystemMessage::QueueCancelled));
        assert_eq!(state.scheduler.queue_depth(GameMode::DEFAULT), Some(0));
    }

    #[tokio::test]
    async fn test_join_queue_close_while_waiting_dequeues() {
        let state = state();
        let (client, task) = connect(&state);
        send(
            &client,
            SystemMessage::Handshake {
                version: PROTOCOL_VERSION,
                token: "alice".into(),
            },
        )
        .await;
        read(&client).await;

        send(&client, SystemMessage::JoinQueue { mode: GameMode::DEFAULT }).await;
        client.close().await.unwrap();

        task.await.unwrap().unwrap();
        assert_eq!(state.scheduler.queue_depth(GameMode::DEFAULT), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_queue_two_players_matched() {
        let state = state();
        let handle = state.scheduler.spawn();
        let alice = login(&state, "alice").await;
        let bob = login(&state, "bob").await;

        send(&alice, SystemMessage::JoinQueue { mode: GameMode::DEFAULT }).await;
        send(&bob, SystemMessage::JoinQueue { mode: GameMode::DEFAULT }).await;

        let mut seats = vec![read(&alice).await, read(&bob).await];
        seats.sort_by_key(|payload| format!("{payload:?}"));
        assert_eq!(
            seats,
            vec![
                Payload::System(SystemMessage::Matched {
                    room_id: RoomId(0),
                    slot: Slot(0),
                }),
                Payload::System(SystemMessage::Matched {
                    room_id: RoomId(0),
                    slot: Slot(1),
                }),
            ]
        );
        handle.stop().await;
    }

    // =====================================================================
    // EnterRoom
    // =====================================================================

    #[tokio::test]
    async fn test_enter_unknown_room_not_found() {
        let state = state();
        let client = login(&state, "alice").await;

        send(
            &client,
            SystemMessage::EnterRoom {
                room_id: RoomId(3),
                slot: Slot(0),
            },
        )
        .await;

        expect_error(&client, 404).await;
    }

    #[tokio::test]
    async fn test_enter_someone_elses_slot_forbidden() {
        let state = state();
        state
            .registry
            .create_room(vec![PlayerId::from("alice"), PlayerId::from("bob")])
            .unwrap();
        let client = login(&state, "alice").await;

        send(
            &client,
            SystemMessage::EnterRoom {
                room_id: RoomId(0),
                slot: Slot(1),
            },
        )
        .await;

        expect_error(&client, 403).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_alone_times_out_and_closes() {
        let state = state();
        state
            .registry
            .create_room(vec![PlayerId::from("alice"), PlayerId::from("bob")])
            .unwrap();
        let client = login(&state, "alice").await;

        send(
            &client,
            SystemMessage::EnterRoom {
                room_id: RoomId(0),
                slot: Slot(0),
            },
        )
        .await;

        expect_error(&client, 408).await;
        assert!(matches!(
            read(&client).await,
            Payload::System(SystemMessage::Disconnect { .. })
        ));
        assert!(client.recv().await.unwrap().is_none());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(state.registry.room(RoomId(0)).is_none());
        assert!(!state.registry.is_in_game(&PlayerId::from("alice")));
    }

    #[tokio::test]
    async fn test_room_detail_delivered_to_both_on_fill() {
        let state = state();
        state
            .registry
            .create_room(vec![PlayerId::from("alice"), PlayerId::from("bob")])
            .unwrap();
        let alice = login(&state, "alice").await;
        let bob = login(&state, "bob").await;
        let detail = Payload::System(SystemMessage::RoomDetail(RoomDetail {
            room_size: 2,
            players: vec![
                PlayerInfo {
                    slot: Slot(0),
                    player_id: PlayerId::from("alice"),
                },
                PlayerInfo {
                    slot: Slot(1),
                    player_id: PlayerId::from("bob"),
                },
            ],
        }));

        send(
            &alice,
            SystemMessage::EnterRoom {
                room_id: RoomId(0),
                slot: Slot(0),
            },
        )
        .await;
        let room = state.registry.room(RoomId(0)).unwrap();
        while room.snapshot().await.connected < 1 {
            tokio::task::yield_now().await;
        }
        send(
            &bob,
            SystemMessage::EnterRoom {
                room_id: RoomId(0),
                slot: Slot(1),
            },
        )
        .await;

        // alice: bob's connect notice, then the detail.
        assert!(matches!(
            read(&alice).await,
            Payload::System(SystemMessage::PlayerConnection { connected: true, .. })
        ));
        assert_eq!(read(&alice).await, detail);
        assert_eq!(read(&bob).await, detail);

        let bytes = JsonCodec.encode(&Envelope::game(1, 0, vec![7, 7])).unwrap();
        bob.send(&bytes).await.unwrap();
        assert_eq!(read(&alice).await, Payload::Game(vec![7, 7]));

        send(&bob, SystemMessage::Disconnect { reason: "done".into() }).await;
        assert!(matches!(
            read(&bob).await,
            Payload::System(SystemMessage::Disconnect { .. })
        ));
        assert_eq!(
            read(&alice).await,
            Payload::System(SystemMessage::PlayerConnection {
                player: PlayerInfo {
                    slot: Slot(1),
                    player_id: PlayerId::from("bob"),
                },
                connected: false,
            })
        );
    }

    // =====================================================================
    // Relay
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_relay_room_expiry_disconnects_everyone_and_deletes_room() {
        let state = state_with(RoomConfig {
            connect_timeout: Duration::from_secs(10),
            expiration: Duration::from_secs(30),
            ..RoomConfig::default()
        });
        let (alice, bob) = enter_full_room(&state).await;
        let expected = RoomError::RoomExpired(RoomId(0)).to_string();

        assert_eq!(expect_farewell(&alice).await, expected);
        assert_eq!(expect_farewell(&bob).await, expected);

        assert!(state.registry.room(RoomId(0)).is_none());
        assert!(!state.registry.is_in_game(&PlayerId::from("alice")));
        assert!(!state.registry.is_in_game(&PlayerId::from("bob")));
    }

    #[tokio::test]
    async fn test_relay_shutdown_disconnects_everyone_and_deletes_room() {
        let state = state();
        let (alice, bob) = enter_full_room(&state).await;

        state.shutdown.cancel();

        let expected = MatchforgeError::ShuttingDown.to_string();
        assert_eq!(expect_farewell(&alice).await, expected);
        assert_eq!(expect_farewell(&bob).await, expected);
        assert!(state.registry.room(RoomId(0)).is_none());
        assert_eq!(state.registry.stats().in_game_players, 0);
    }

    #[tokio::test]
    async fn test_relay_deleted_room_disconnects_everyone() {
        let state = state();
        let (alice, bob) = enter_full_room(&state).await;

        assert!(state.registry.delete_room(RoomId(0)).await);

        let expected = RoomError::RoomClosed(RoomId(0)).to_string();
        assert_eq!(expect_farewell(&alice).await, expected);
        assert_eq!(expect_farewell(&bob).await, expected);
        assert!(!state.registry.is_in_game(&PlayerId::from("alice")));
    }
}
