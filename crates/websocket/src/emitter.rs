use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Frames buffered per client before the emitter starts dropping.
pub const OUTBOUND_BUFFER: usize = 256;

struct OutboundClient {
    user_id: Uuid,
    sender: mpsc::Sender<String>,
}

/// Fan-out facade bound to one session.
///
/// Serializes each frame once and enqueues it to every connected client's
/// outbound buffer. A full buffer drops the frame for that client only (it
/// re-syncs via `sync_state`); a closed buffer detaches the client. Sending
/// never blocks the owning event loop and never panics for a client that is
/// already gone.
#[derive(Clone)]
pub struct SessionEmitter {
    session_id: Uuid,
    clients: Arc<DashMap<Uuid, OutboundClient>>,
    seq: Arc<AtomicU64>,
}

impl SessionEmitter {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            clients: Arc::new(DashMap::new()),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn attach(&self, connection_id: Uuid, user_id: Uuid, sender: mpsc::Sender<String>) {
        debug!(
            session_id = %self.session_id,
            connection_id = %connection_id,
            user_id = %user_id,
            "attaching client"
        );
        self.clients
            .insert(connection_id, OutboundClient { user_id, sender });
    }

    /// Remove a client. Dropping its sender closes the write loop's channel;
    /// repeated detaches are no-ops.
    pub fn detach(&self, connection_id: Uuid) {
        if self.clients.remove(&connection_id).is_some() {
            debug!(
                session_id = %self.session_id,
                connection_id = %connection_id,
                "detached client"
            );
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn connection_ids(&self) -> Vec<Uuid> {
        self.clients.iter().map(|entry| *entry.key()).collect()
    }

    pub fn user_of(&self, connection_id: Uuid) -> Option<Uuid> {
        self.clients.get(&connection_id).map(|c| c.user_id)
    }

    /// Monotonic sequence number stamped on event frames.
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Broadcast a frame to every connected client.
    pub fn broadcast<T: Serialize>(&self, frame: &T) {
        let json = match serde_json::to_string(frame) {
            Ok(json) => json,
            Err(e) => {
                error!(session_id = %self.session_id, error = %e, "failed to serialize frame");
                return;
            }
        };

        let mut closed = Vec::new();
        for entry in self.clients.iter() {
            match entry.sender.try_send(json.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Slow consumer: drop this frame for this client only.
                    debug!(
                        session_id = %self.session_id,
                        connection_id = %entry.key(),
                        "outbound buffer full, dropping frame"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    closed.push(*entry.key());
                }
            }
        }
        for connection_id in closed {
            warn!(
                session_id = %self.session_id,
                connection_id = %connection_id,
                "client channel closed, detaching"
            );
            self.detach(connection_id);
        }
    }

    /// Send a frame to one client. Returns false if the client is gone.
    pub fn send_to<T: Serialize>(&self, connection_id: Uuid, frame: &T) -> bool {
        let json = match serde_json::to_string(frame) {
            Ok(json) => json,
            Err(e) => {
                error!(session_id = %self.session_id, error = %e, "failed to serialize frame");
                return false;
            }
        };
        match self.clients.get(&connection_id) {
            Some(client) => match client.sender.try_send(json) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(
                        session_id = %self.session_id,
                        connection_id = %connection_id,
                        "outbound buffer full, dropping frame"
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    drop(client);
                    self.detach(connection_id);
                    false
                }
            },
            None => false,
        }
    }

    /// Close every client channel exactly once, as part of session teardown.
    pub fn close_all(&self) {
        self.clients.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_broadcast_reaches_all_clients() {
        let emitter = SessionEmitter::new(Uuid::new_v4());
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        emitter.attach(Uuid::new_v4(), Uuid::new_v4(), tx_a);
        emitter.attach(Uuid::new_v4(), Uuid::new_v4(), tx_b);

        emitter.broadcast(&json!({"type": "ping"}));
        assert_eq!(rx_a.recv().await.unwrap(), r#"{"type":"ping"}"#);
        assert_eq!(rx_b.recv().await.unwrap(), r#"{"type":"ping"}"#);
    }

    #[tokio::test]
    async fn test_full_buffer_drops_without_detaching() {
        let emitter = SessionEmitter::new(Uuid::new_v4());
        let conn = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(1);
        emitter.attach(conn, Uuid::new_v4(), tx);

        emitter.broadcast(&json!({"n": 1}));
        emitter.broadcast(&json!({"n": 2}));
        assert_eq!(emitter.client_count(), 1);

        // Only the first frame made it; the second was dropped.
        assert_eq!(rx.recv().await.unwrap(), r#"{"n":1}"#);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_client_is_detached() {
        let emitter = SessionEmitter::new(Uuid::new_v4());
        let conn = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(1);
        emitter.attach(conn, Uuid::new_v4(), tx);
        drop(rx);

        emitter.broadcast(&json!({"type": "ping"}));
        assert_eq!(emitter.client_count(), 0);
        assert!(!emitter.send_to(conn, &json!({"type": "ping"})));
    }

    #[tokio::test]
    async fn test_detach_is_idempotent() {
        let emitter = SessionEmitter::new(Uuid::new_v4());
        let conn = Uuid::new_v4();
        let (tx, _rx) = mpsc::channel(1);
        emitter.attach(conn, Uuid::new_v4(), tx);
        emitter.detach(conn);
        emitter.detach(conn);
        assert_eq!(emitter.client_count(), 0);
    }

    #[test]
    fn test_seq_is_monotonic() {
        let emitter = SessionEmitter::new(Uuid::new_v4());
        let a = emitter.next_seq();
        let b = emitter.next_seq();
        assert!(b > a);
    }
}
