//! Error types for the transport layer.

/// Errors that can occur while moving frames between peers.
///
/// Every variant is terminal for the connection it came from: the
/// caller is expected to stop using that connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed by either side.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending a frame failed (broken peer).
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving a frame failed for a reason other than a clean close.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),
}
