//! # Matchforge
//!
//! Matchmaking and game room relay server.
//!
//! Players connect over WebSocket, present an identity token, and queue
//! for a game mode. The scheduler pairs the oldest waiting players into a
//! room; each player then enters their slot and, once every slot is
//! attached, the room relays opaque game data between them until they
//! leave or the room expires.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use matchforge::prelude::*;
//!
//! # async fn start() -> Result<(), MatchforgeError> {
//! let server = MatchforgeServer::<SignedTokenAuthenticator>::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(SignedTokenAuthenticator::new("change-me"))
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! ## Crates
//!
//! | Layer | Crate |
//! |---|---|
//! | Transport | [`matchforge_transport`] |
//! | Wire protocol | [`matchforge_protocol`] |
//! | Identity | [`matchforge_session`] |
//! | Rooms | [`matchforge_room`] |
//! | Matchmaking | [`matchforge_matchmaker`] |

mod config;
mod error;
mod handler;
mod server;
mod sink;
mod status;

pub use config::{
    AuthSection, ConfigError, ListenSection, MatchmakingSection, ModeSection,
    RoomsSection, ServerConfig, StatusSection,
};
pub use error::MatchforgeError;
pub use server::{MatchforgeServer, MatchforgeServerBuilder, PROTOCOL_VERSION};
pub use sink::ConnectionSink;
pub use status::{StatusConfig, StatusSnapshot};

pub use matchforge_matchmaker as matchmaker;
pub use matchforge_protocol as protocol;
pub use matchforge_room as room;
pub use matchforge_session as session;
pub use matchforge_transport as transport;

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{
        ConfigError, MatchforgeError, MatchforgeServer, MatchforgeServerBuilder,
        PROTOCOL_VERSION, ServerConfig, StatusConfig,
    };
    pub use matchforge_matchmaker::{ModeConfig, SchedulerConfig};
    pub use matchforge_protocol::{
        Envelope, GameMode, Payload, PlayerId, RoomId, Slot, SystemMessage,
    };
    pub use matchforge_room::RoomConfig;
    pub use matchforge_session::{
        Authenticator, DevAuthenticator, SignedTokenAuthenticator,
        StaticAuthenticator,
    };
}
