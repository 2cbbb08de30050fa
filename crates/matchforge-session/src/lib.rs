//! Player identity for Matchforge.
//!
//! The core never decides who a player is. It asks an identity provider
//! (the [`Authenticator`] trait) to turn the token a client presents
//! into a stable, opaque [`PlayerId`](matchforge_protocol::PlayerId),
//! and trusts that identity for the rest of the connection.
//!
//! # Providers
//!
//! - [`SignedTokenAuthenticator`]: HMAC-SHA512 signed identity tokens.
//!   The same type issues tokens, so an account service can share it.
//! - [`StaticAuthenticator`]: a fixed token table, handy for LAN games
//!   and tests.
//! - [`DevAuthenticator`]: trusts the token as the identity. Development
//!   only.
//!
//! ```text
//! Room / Matchmaker (above)  ← trusts PlayerId
//!     ↕
//! Identity (this crate)      ← token → PlayerId
//!     ↕
//! Protocol (below)           ← Handshake { token }
//! ```

mod auth;
mod error;

pub use auth::{
    Authenticator, DevAuthenticator, SignedTokenAuthenticator,
    StaticAuthenticator,
};
pub use error::SessionError;
