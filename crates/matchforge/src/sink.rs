//! Framing for one connection: envelopes out, envelopes in.
//!
//! The [`Outbox`] owns the connection and its sequence counter. The
//! handler reads and replies through it, and the room writes to it
//! through a [`ConnectionSink`], so both share one ordered stream of
//! sequence numbers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use matchforge_protocol::{Codec, Envelope, Payload, ProtocolError, SystemMessage};
use matchforge_room::{DeliveryError, RoomEvent, RoomSink};
use matchforge_transport::{Connection, ConnectionId, TransportError};

use crate::MatchforgeError;

/// What the next read produced.
#[derive(Debug)]
pub(crate) enum Inbound {
    Envelope(Envelope),
    /// A frame arrived but did not decode.
    Malformed(ProtocolError),
    /// The peer closed the connection.
    Closed,
}

pub(crate) struct Outbox<C, K> {
    conn: C,
    codec: K,
    seq: AtomicU64,
    opened: Instant,
}

impl<C: Connection, K: Codec> Outbox<C, K> {
    pub(crate) fn new(conn: C, codec: K) -> Self {
        Self {
            conn,
            codec,
            seq: AtomicU64::new(0),
            opened: Instant::now(),
        }
    }

    pub(crate) fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    /// Milliseconds since the connection was accepted.
    pub(crate) fn elapsed_ms(&self) -> u64 {
        self.opened.elapsed().as_millis() as u64
    }

    pub(crate) async fn send(&self, payload: Payload) -> Result<(), MatchforgeError> {
        let envelope = Envelope {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            timestamp: self.elapsed_ms(),
            payload,
        };
        let bytes = self.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }

    pub(crate) async fn system(&self, msg: SystemMessage) -> Result<(), MatchforgeError> {
        self.send(Payload::System(msg)).await
    }

    /// Sends a `SystemMessage::Error` to the client.
    pub(crate) async fn error(
        &self,
        code: u16,
        message: impl Into<String>,
    ) -> Result<(), MatchforgeError> {
        self.system(SystemMessage::Error {
            code,
            message: message.into(),
        })
        .await
    }

    /// Reports `error` to the client with its status code.
    pub(crate) async fn reject(&self, error: &MatchforgeError) -> Result<(), MatchforgeError> {
        self.error(error.code(), error.to_string()).await
    }

    pub(crate) async fn recv(&self) -> Result<Inbound, TransportError> {
        let Some(data) = self.conn.recv().await? else {
            return Ok(Inbound::Closed);
        };
        Ok(match self.codec.decode::<Envelope>(&data) {
            Ok(envelope) => Inbound::Envelope(envelope),
            Err(e) => Inbound::Malformed(e),
        })
    }

    /// Says goodbye (when there is a reason to give) and closes. Failures
    /// are expected here since the peer may already be gone.
    pub(crate) async fn close(&self, reason: Option<String>) {
        if let Some(reason) = reason {
            if let Err(e) = self.system(SystemMessage::Disconnect { reason }).await {
                tracing::debug!(conn_id = %self.id(), error = %e, "farewell not delivered");
            }
        }
        if let Err(e) = self.conn.close().await {
            tracing::debug!(conn_id = %self.id(), error = %e, "close failed");
        }
    }
}

/// A room's handle on a client connection.
pub struct ConnectionSink<C, K>(Arc<Outbox<C, K>>);

impl<C, K> ConnectionSink<C, K> {
    pub(crate) fn new(outbox: Arc<Outbox<C, K>>) -> Self {
        Self(outbox)
    }
}

impl<C: Connection, K: Codec> RoomSink for ConnectionSink<C, K> {
    async fn deliver(&self, event: &RoomEvent) -> Result<(), DeliveryError> {
        let payload = match event {
            RoomEvent::PlayerConnected(player) => {
                Payload::System(SystemMessage::PlayerConnection {
                    player: player.clone(),
                    connected: true,
                })
            }
            RoomEvent::PlayerDisconnected(player) => {
                Payload::System(SystemMessage::PlayerConnection {
                    player: player.clone(),
                    connected: false,
                })
            }
            RoomEvent::Detail(detail) => {
                Payload::System(SystemMessage::RoomDetail(detail.clone()))
            }
            RoomEvent::Relay(data) => Payload::Game(data.clone()),
        };
        self.0
            .send(payload)
            .await
            .map_err(|e| DeliveryError::new(e.to_string()))
    }
}
