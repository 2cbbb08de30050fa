//! Error types for the identity layer.

/// Errors an [`Authenticator`](crate::Authenticator) can return.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The token was rejected: unknown, empty, or revoked.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The token is not in the `<identity>.<signature>` shape, or the
    /// signature part is not valid base64.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The token is well-formed but its signature does not match.
    /// Either a forged token or one signed with another secret.
    #[error("token signature mismatch")]
    BadSignature,

    /// The shared secret could not key the signature MAC.
    #[error("unusable signing key: {0}")]
    SigningKey(String),
}
