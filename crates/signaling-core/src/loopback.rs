//! In-process signaling hub.
//!
//! Routes messages between endpoints registered on the same hub, preserving
//! per-sender FIFO order. Backs the integration tests and demos, and is a
//! workable transport for embedders that run every endpoint in one process.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::{Connection, SignalingTransport, TransportEvent};

const EVENT_QUEUE_DEPTH: usize = 256;

/// Shared endpoint registry for a set of [`LoopbackTransport`]s.
#[derive(Debug, Default, Clone)]
pub struct LoopbackHub {
    inner: Arc<HubInner>,
}

#[derive(Debug, Default)]
struct HubInner {
    endpoints: DashMap<String, mpsc::Sender<TransportEvent>>,
    denied_tokens: Mutex<HashSet<String>>,
}

impl LoopbackHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport whose `connect` registers `endpoint_id` on this hub.
    pub fn transport(&self, endpoint_id: impl Into<String>) -> Arc<LoopbackTransport> {
        Arc::new(LoopbackTransport {
            hub: self.inner.clone(),
            endpoint_id: endpoint_id.into(),
        })
    }

    /// Reject future `connect` calls that carry `token`.
    pub async fn deny_token(&self, token: impl Into<String>) {
        self.inner.denied_tokens.lock().await.insert(token.into());
    }

    /// Forcibly disconnect an endpoint, as a server-side drop would.
    pub async fn drop_endpoint(&self, endpoint_id: &str) {
        if let Some((_, tx)) = self.inner.endpoints.remove(endpoint_id) {
            debug!(endpoint = %endpoint_id, "dropping endpoint from hub");
            let _ = tx.send(TransportEvent::Disconnected).await;
        }
    }

    /// Number of connected endpoints.
    pub fn endpoint_count(&self) -> usize {
        self.inner.endpoints.len()
    }
}

/// One endpoint's transport on a [`LoopbackHub`].
#[derive(Debug)]
pub struct LoopbackTransport {
    hub: Arc<HubInner>,
    endpoint_id: String,
}

#[async_trait::async_trait]
impl SignalingTransport for LoopbackTransport {
    async fn connect(&self, token: &str) -> Result<Connection> {
        if self.hub.denied_tokens.lock().await.contains(token) {
            return Err(Error::AuthRejected(format!(
                "token not accepted for {}",
                self.endpoint_id
            )));
        }

        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        // A reconnect replaces the previous registration; the old receiver
        // observes its sender closing.
        self.hub.endpoints.insert(self.endpoint_id.clone(), tx);
        debug!(endpoint = %self.endpoint_id, "endpoint connected to hub");

        Ok(Connection {
            local_id: self.endpoint_id.clone(),
            events: rx,
        })
    }

    async fn send_message(&self, payload: &str, target: Option<&str>) -> Result<()> {
        if !self.hub.endpoints.contains_key(&self.endpoint_id) {
            return Err(Error::NotConnected);
        }

        match target {
            Some(target) => {
                let tx = self
                    .hub
                    .endpoints
                    .get(target)
                    .map(|entry| entry.value().clone())
                    .ok_or_else(|| Error::TargetUnreachable(target.to_string()))?;
                tx.send(TransportEvent::MessageReceived {
                    from: self.endpoint_id.clone(),
                    payload: payload.to_string(),
                })
                .await
                .map_err(|_| Error::TargetUnreachable(target.to_string()))
            }
            None => {
                let peers: Vec<(String, mpsc::Sender<TransportEvent>)> = self
                    .hub
                    .endpoints
                    .iter()
                    .filter(|entry| entry.key() != &self.endpoint_id)
                    .map(|entry| (entry.key().clone(), entry.value().clone()))
                    .collect();
                for (peer, tx) in peers {
                    if tx
                        .send(TransportEvent::MessageReceived {
                            from: self.endpoint_id.clone(),
                            payload: payload.to_string(),
                        })
                        .await
                        .is_err()
                    {
                        debug!(endpoint = %peer, "skipping closed endpoint during broadcast");
                    }
                }
                Ok(())
            }
        }
    }

    async fn disconnect(&self) -> Result<()> {
        self.hub.endpoints.remove(&self.endpoint_id);
        debug!(endpoint = %self.endpoint_id, "endpoint disconnected from hub");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn recv_message(connection: &mut Connection) -> (String, String) {
        match connection.events.recv().await {
            Some(TransportEvent::MessageReceived { from, payload }) => (from, payload),
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn routes_between_endpoints() {
        let hub = LoopbackHub::new();
        let alice = hub.transport("alice");
        let bob = hub.transport("bob");

        let _alice_conn = alice.connect("t").await.unwrap();
        let mut bob_conn = bob.connect("t").await.unwrap();

        alice.send_message("hello", Some("bob")).await.unwrap();
        let (from, payload) = recv_message(&mut bob_conn).await;
        assert_eq!(from, "alice");
        assert_eq!(payload, "hello");
    }

    #[tokio::test]
    async fn preserves_per_sender_order() {
        let hub = LoopbackHub::new();
        let alice = hub.transport("alice");
        let bob = hub.transport("bob");

        let _alice_conn = alice.connect("t").await.unwrap();
        let mut bob_conn = bob.connect("t").await.unwrap();

        for i in 0..10 {
            alice
                .send_message(&format!("m{}", i), Some("bob"))
                .await
                .unwrap();
        }
        for i in 0..10 {
            let (_, payload) = recv_message(&mut bob_conn).await;
            assert_eq!(payload, format!("m{}", i));
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_everyone_but_sender() {
        let hub = LoopbackHub::new();
        let alice = hub.transport("alice");
        let bob = hub.transport("bob");
        let carol = hub.transport("carol");

        let mut alice_conn = alice.connect("t").await.unwrap();
        let mut bob_conn = bob.connect("t").await.unwrap();
        let mut carol_conn = carol.connect("t").await.unwrap();

        alice.send_message("all", None).await.unwrap();
        assert_eq!(recv_message(&mut bob_conn).await.1, "all");
        assert_eq!(recv_message(&mut carol_conn).await.1, "all");
        assert!(alice_conn.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_target_is_unreachable() {
        let hub = LoopbackHub::new();
        let alice = hub.transport("alice");
        let _conn = alice.connect("t").await.unwrap();

        let err = alice.send_message("hi", Some("nobody")).await.unwrap_err();
        assert!(matches!(err, Error::TargetUnreachable(_)));
    }

    #[tokio::test]
    async fn denied_token_is_rejected() {
        let hub = LoopbackHub::new();
        hub.deny_token("expired").await;

        let alice = hub.transport("alice");
        let err = alice.connect("expired").await.unwrap_err();
        assert!(matches!(err, Error::AuthRejected(_)));
        assert_eq!(hub.endpoint_count(), 0);
    }

    #[tokio::test]
    async fn dropped_endpoint_sees_disconnect() {
        let hub = LoopbackHub::new();
        let alice = hub.transport("alice");
        let mut conn = alice.connect("t").await.unwrap();

        hub.drop_endpoint("alice").await;
        assert!(matches!(
            conn.events.recv().await,
            Some(TransportEvent::Disconnected)
        ));
        assert!(matches!(
            alice.send_message("hi", Some("bob")).await.unwrap_err(),
            Error::NotConnected
        ));
    }
}
