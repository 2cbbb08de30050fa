//! In-memory connection pairs.
//!
//! Two [`MemoryConnection`]s created by [`MemoryConnection::pair`] behave
//! like the two ends of a socket: frames sent on one are received on the
//! other, in order. Closing either end (or dropping it) ends the peer's
//! stream with `Ok(None)`.

use tokio::sync::{Mutex, mpsc};

use crate::{Connection, ConnectionId, TransportError};

/// One end of an in-process duplex channel.
pub struct MemoryConnection {
    id: ConnectionId,
    outbound: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl MemoryConnection {
    /// Creates two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();

        let a = Self {
            id: ConnectionId::next(),
            outbound: Mutex::new(Some(a_tx)),
            inbound: Mutex::new(b_rx),
        };
        let b = Self {
            id: ConnectionId::next(),
            outbound: Mutex::new(Some(b_tx)),
            inbound: Mutex::new(a_rx),
        };
        (a, b)
    }
}

impl Connection for MemoryConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let outbound = self.outbound.lock().await;
        let tx = outbound.as_ref().ok_or_else(|| {
            TransportError::ConnectionClosed("local end closed".into())
        })?;
        tx.send(data.to_vec()).map_err(|_| {
            TransportError::ConnectionClosed("peer dropped".into())
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.inbound.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Dropping our sender ends the peer's stream.
        self.outbound.lock().await.take();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_frames_in_order() {
        let (a, b) = MemoryConnection::pair();

        a.send(b"one").await.unwrap();
        a.send(b"two").await.unwrap();

        assert_eq!(b.recv().await.unwrap(), Some(b"one".to_vec()));
        assert_eq!(b.recv().await.unwrap(), Some(b"two".to_vec()));
    }

    #[tokio::test]
    async fn test_close_ends_peer_stream() {
        let (a, b) = MemoryConnection::pair();

        a.close().await.unwrap();

        assert_eq!(b.recv().await.unwrap(), None);
        assert!(a.send(b"late").await.is_err());
    }

    #[tokio::test]
    async fn test_send_to_dropped_peer_fails() {
        let (a, b) = MemoryConnection::pair();
        drop(b);

        let result = a.send(b"hello").await;

        assert!(matches!(result, Err(TransportError::ConnectionClosed(_))));
    }

    #[tokio::test]
    async fn test_ids_differ_between_ends() {
        let (a, b) = MemoryConnection::pair();
        assert_ne!(a.id(), b.id());
    }
}
