//! `MatchforgeServer` builder and server loop.
//!
//! This is the entry point for running a Matchforge server. It ties
//! together all the layers: transport → protocol → identity → matchmaker
//! → rooms.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use matchforge_matchmaker::{Scheduler, SchedulerConfig};
use matchforge_protocol::{Codec, JsonCodec};
use matchforge_room::{RoomConfig, RoomRegistry};
use matchforge_session::Authenticator;
use matchforge_transport::{Connection, Transport, WebSocketConnection, WebSocketTransport};
use tokio_util::sync::CancellationToken;

use crate::handler::handle_connection;
use crate::sink::ConnectionSink;
use crate::status::run_status_reporter;
use crate::{MatchforgeError, ServerConfig, StatusConfig};

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A, C: Connection, K: Codec> {
    pub(crate) auth: A,
    pub(crate) codec: K,
    pub(crate) registry: RoomRegistry<ConnectionSink<C, K>>,
    pub(crate) scheduler: Scheduler<ConnectionSink<C, K>>,
    /// Cancelled once when the server stops. Lobby, queue and relay loops
    /// all watch it.
    pub(crate) shutdown: CancellationToken,
    pub(crate) handshake_timeout: Duration,
}

impl<A: Authenticator, C: Connection, K: Codec> ServerState<A, C, K> {
    pub(crate) fn new(
        auth: A,
        codec: K,
        room_config: RoomConfig,
        scheduler_config: SchedulerConfig,
        handshake_timeout: Duration,
    ) -> Self {
        let registry = RoomRegistry::new(room_config);
        let scheduler = Scheduler::new(scheduler_config, registry.clone());
        Self {
            auth,
            codec,
            registry,
            scheduler,
            shutdown: CancellationToken::new(),
            handshake_timeout,
        }
    }
}

type WsState<A> = ServerState<A, WebSocketConnection, JsonCodec>;

/// Builder for configuring and starting a Matchforge server.
///
/// # Example
///
/// ```rust,ignore
/// use matchforge::prelude::*;
///
/// let server = MatchforgeServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(DevAuthenticator)
///     .await?;
/// server.run().await
/// ```
pub struct MatchforgeServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    scheduler_config: SchedulerConfig,
    status: Option<StatusConfig>,
    handshake_timeout: Duration,
}

impl MatchforgeServerBuilder {
    /// Creates a new builder with default settings. The status file is
    /// off until [`status`](Self::status) is called.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room_config: RoomConfig::default(),
            scheduler_config: SchedulerConfig::default(),
            status: None,
            handshake_timeout: Duration::from_secs(5),
        }
    }

    /// Takes every setting from a loaded configuration file.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            bind_addr: config.server.bind.clone(),
            room_config: config.room_config(),
            scheduler_config: config.scheduler_config(),
            status: config.status_config(),
            handshake_timeout: config.handshake_timeout(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    pub fn scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler_config = config;
        self
    }

    /// Enables the periodic status file.
    pub fn status(mut self, config: StatusConfig) -> Self {
        self.status = Some(config);
        self
    }

    /// How long a new connection has to complete its handshake.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Binds the listener with the given authenticator.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<MatchforgeServer<A>, MatchforgeError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let state = Arc::new(ServerState::new(
            auth,
            JsonCodec,
            self.room_config,
            self.scheduler_config,
            self.handshake_timeout,
        ));

        Ok(MatchforgeServer {
            transport,
            state,
            status: self.status,
        })
    }
}

impl Default for MatchforgeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Matchforge server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct MatchforgeServer<A: Authenticator> {
    transport: WebSocketTransport,
    state: Arc<WsState<A>>,
    status: Option<StatusConfig>,
}

impl<A: Authenticator> MatchforgeServer<A> {
    /// Creates a new builder.
    pub fn builder() -> MatchforgeServerBuilder {
        MatchforgeServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn registry(&self) -> &RoomRegistry<ConnectionSink<WebSocketConnection, JsonCodec>> {
        &self.state.registry
    }

    pub fn scheduler(&self) -> &Scheduler<ConnectionSink<WebSocketConnection, JsonCodec>> {
        &self.state.scheduler
    }

    /// Runs until the process is terminated.
    pub async fn run(self) -> Result<(), MatchforgeError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the scheduler, the status reporter and the accept loop until
    /// `shutdown` resolves.
    ///
    /// On shutdown the server stops accepting, stops the scheduler
    /// (dropping queued requests), and tells every live lobby and relay
    /// loop to end. Relay loops still detach from their rooms on the way
    /// out.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), MatchforgeError>
    where
        F: Future<Output = ()>,
    {
        let matchmaking = self.state.scheduler.spawn();
        let reporter = self.status.take().map(|config| {
            tokio::spawn(run_status_reporter(
                config,
                self.state.registry.clone(),
                self.state.scheduler.clone(),
                self.state.shutdown.clone(),
            ))
        });

        match self.transport.local_addr() {
            Ok(addr) => tracing::info!(%addr, "Matchforge server running"),
            Err(_) => tracing::info!("Matchforge server running"),
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("Matchforge server shutting down");
        self.state.shutdown.cancel();
        matchmaking.stop().await;
        if let Some(reporter) = reporter {
            if let Err(e) = reporter.await {
                tracing::warn!(error = %e, "status reporter task failed");
            }
        }
        self.transport.shutdown().await?;
        tracing::info!("Matchforge server stopped");
        Ok(())
    }
}
