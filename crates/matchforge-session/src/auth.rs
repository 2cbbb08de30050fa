//! Authentication hook for resolving player identity.
//!
//! Matchforge doesn't own accounts. It defines the [`Authenticator`]
//! trait: a single async method that takes the token from the client's
//! handshake and returns a [`PlayerId`] or an error. The server calls it
//! once per connection.

use std::collections::HashMap;
use std::future::Future;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use matchforge_protocol::PlayerId;
use sha2::Sha512;

use crate::SessionError;

type HmacSha512 = Hmac<Sha512>;

/// Validates a client's token and returns their identity.
///
/// `Send + Sync + 'static` because a single authenticator is shared by
/// every connection task for the lifetime of the server.
///
/// # Example
///
/// ```rust
/// use matchforge_protocol::PlayerId;
/// use matchforge_session::{Authenticator, SessionError};
///
/// /// Accepts tokens of the form "user:<name>".
/// struct PrefixAuthenticator;
///
/// impl Authenticator for PrefixAuthenticator {
///     async fn authenticate(
///         &self,
///         token: &str,
///     ) -> Result<PlayerId, SessionError> {
///         token
///             .strip_prefix("user:")
///             .map(PlayerId::from)
///             .ok_or_else(|| SessionError::AuthFailed("no user prefix".into()))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token and returns the player's identity.
    ///
    /// # Returns
    /// - `Ok(PlayerId)`: the identity to use for this connection
    /// - `Err(SessionError)`: the connection must be refused
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<PlayerId, SessionError>> + Send;
}

// ---------------------------------------------------------------------------
// SignedTokenAuthenticator
// ---------------------------------------------------------------------------

/// Verifies `<identity>.<signature>` tokens, where the signature is the
/// URL-safe base64 of `HMAC-SHA512(secret, identity)`.
///
/// Whoever holds the secret can [`issue`](Self::issue) tokens; the game
/// server only needs to verify them.
#[derive(Clone)]
pub struct SignedTokenAuthenticator {
    secret: Vec<u8>,
}

impl SignedTokenAuthenticator {
    /// Creates an authenticator for the given shared secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Issues a token for `player_id`.
    pub fn issue(&self, player_id: &PlayerId) -> Result<String, SessionError> {
        let signature = URL_SAFE_NO_PAD.encode(self.sign(player_id.as_str())?);
        Ok(format!("{player_id}.{signature}"))
    }

    /// Checks a token and returns the identity it carries.
    pub fn verify(&self, token: &str) -> Result<PlayerId, SessionError> {
        // Identities may contain dots; the signature never does.
        let (identity, signature) = token.rsplit_once('.').ok_or_else(|| {
            SessionError::MalformedToken("missing signature".into())
        })?;
        if identity.is_empty() {
            return Err(SessionError::MalformedToken("empty identity".into()));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| SessionError::MalformedToken(e.to_string()))?;

        self.mac(identity)?
            .verify_slice(&signature)
            .map_err(|_| SessionError::BadSignature)?;

        Ok(PlayerId::from(identity))
    }

    fn sign(&self, identity: &str) -> Result<Vec<u8>, SessionError> {
        Ok(self.mac(identity)?.finalize().into_bytes().to_vec())
    }

    fn mac(&self, identity: &str) -> Result<HmacSha512, SessionError> {
        let mut mac = <HmacSha512 as Mac>::new_from_slice(&self.secret)
            .map_err(|e| SessionError::SigningKey(e.to_string()))?;
        mac.update(identity.as_bytes());
        Ok(mac)
    }
}

impl std::fmt::Debug for SignedTokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedTokenAuthenticator")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Authenticator for SignedTokenAuthenticator {
    async fn authenticate(
        &self,
        token: &str,
    ) -> Result<PlayerId, SessionError> {
        self.verify(token).inspect_err(|e| {
            tracing::warn!(error = %e, "rejected identity token");
        })
    }
}

// ---------------------------------------------------------------------------
// StaticAuthenticator
// ---------------------------------------------------------------------------

/// A fixed table of token → identity.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    tokens: HashMap<String, PlayerId>,
}

impl StaticAuthenticator {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a token for a player. Builder-style.
    pub fn with_token(
        mut self,
        token: impl Into<String>,
        player_id: impl Into<PlayerId>,
    ) -> Self {
        self.tokens.insert(token.into(), player_id.into());
        self
    }
}

impl Authenticator for StaticAuthenticator {
    async fn authenticate(
        &self,
        token: &str,
    ) -> Result<PlayerId, SessionError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| SessionError::AuthFailed("unknown token".into()))
    }
}

// ---------------------------------------------------------------------------
// DevAuthenticator
// ---------------------------------------------------------------------------

/// Uses the token itself as the player identity.
///
/// Anyone can claim any identity. Never use this outside development.
#[derive(Debug, Clone, Copy, Default)]
pub struct DevAuthenticator;

impl Authenticator for DevAuthenticator {
    async fn authenticate(
        &self,
        token: &str,
    ) -> Result<PlayerId, SessionError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SessionError::AuthFailed("empty token".into()));
        }
        Ok(PlayerId::from(token))
    }
}
