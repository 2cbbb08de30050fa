//! Wire protocol for Matchforge.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Types** ([`Envelope`], [`SystemMessage`], [`PlayerId`], [`RoomId`],
//!   [`Slot`], ...): the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those structures
//!   become bytes and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! The protocol layer knows nothing about connections, queues or rooms.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Room / Matchmaker
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Envelope, GameMode, Payload, PlayerId, PlayerInfo, RoomAssignment,
    RoomDetail, RoomId, Slot, SystemMessage,
};
