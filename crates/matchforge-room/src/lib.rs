//! Room lifecycle management for Matchforge.
//!
//! A room is created by the matchmaker for a fixed roster of players.
//! Each player then attaches a session to their slot. Once every slot is
//! attached the room is full and relays game data between the sessions
//! until the players leave or the room expires.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: allocates room IDs and tracks who is seated where
//! - [`GameRoom`]: slots, sessions and the fill/relay logic
//! - [`RoomSink`]: how a room talks to an attached session
//! - [`RoomState`]: lifecycle state machine
//! - [`RoomConfig`]: connect timeout, expiration, ID space

mod config;
mod error;
mod registry;
mod room;
mod sink;
mod timers;

pub use config::{RoomConfig, RoomState};
pub use error::{DeliveryError, RoomError};
pub use registry::{RegistryStats, RoomRegistry};
pub use room::{Admission, Departure, GameRoom, RoomSnapshot};
pub use sink::{RoomEvent, RoomSink};
