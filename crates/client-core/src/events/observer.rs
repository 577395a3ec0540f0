//! Observer traits implemented by the embedding application.
//!
//! Every method has a default empty implementation; applications implement
//! the ones they care about. Callbacks are delivered on the client's event
//! dispatcher in generation order, never on the signaling transport's
//! thread and never while a control-plane lock is held, so observers may
//! call back into the client, including registering or removing observers.
//! Removal takes effect for subsequent dispatches, not the one in flight.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::stream::RemoteStream;
use crate::types::TrackKind;

/// Observer for client and session lifecycle events.
#[async_trait::async_trait]
pub trait ClientObserver: Send + Sync {
    /// A remote endpoint invited the local endpoint to a session.
    async fn on_invited(&self, _remote_id: &str) {}

    /// The remote endpoint accepted a pending invite.
    async fn on_accepted(&self, _remote_id: &str) {}

    /// The remote endpoint refused a pending invite.
    async fn on_denied(&self, _remote_id: &str) {}

    /// The session with `_remote_id` reached the connected state.
    async fn on_session_connected(&self, _remote_id: &str) {}

    /// The session with `_remote_id` ended.
    async fn on_session_ended(&self, _remote_id: &str) {}

    /// A remote stream was announced.
    async fn on_stream_added(&self, _stream: Arc<RemoteStream>) {}

    /// A previously announced stream ended.
    async fn on_stream_ended(&self, _stream: Arc<RemoteStream>) {}

    /// Application data arrived.
    async fn on_message(&self, _sender_id: &str, _message: &str) {}

    /// A participant joined the conference.
    async fn on_participant_joined(&self, _participant_id: &str) {}

    /// A participant left the conference.
    async fn on_participant_left(&self, _participant_id: &str) {}

    /// The signaling transport was lost. Sessions do not reconnect on their
    /// own; the application decides whether to connect again.
    async fn on_server_disconnected(&self) {}
}

/// Observer for one publication's lifecycle.
#[async_trait::async_trait]
pub trait PublicationObserver: Send + Sync {
    /// The publication ended. Fires exactly once.
    async fn on_ended(&self) {}

    /// The server confirmed a mute of `_kind`.
    async fn on_mute(&self, _kind: TrackKind) {}

    /// The server confirmed an unmute of `_kind`.
    async fn on_unmute(&self, _kind: TrackKind) {}
}

/// Observer for one subscription's lifecycle.
#[async_trait::async_trait]
pub trait SubscriptionObserver: Send + Sync {
    /// The subscription ended. Fires exactly once.
    async fn on_ended(&self) {}

    /// The server confirmed a mute of `_kind`.
    async fn on_mute(&self, _kind: TrackKind) {}

    /// The server confirmed an unmute of `_kind`.
    async fn on_unmute(&self, _kind: TrackKind) {}
}

/// Registration-ordered set of observers.
///
/// Dispatch sites take a snapshot before queueing, so add/remove from
/// inside a callback never affects the dispatch currently in flight.
pub(crate) struct ObserverSet<T: ?Sized> {
    observers: Mutex<Vec<Arc<T>>>,
}

impl<T: ?Sized> ObserverSet<T> {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }

    pub async fn add(&self, observer: Arc<T>) {
        self.observers.lock().await.push(observer);
    }

    pub async fn remove(&self, observer: &Arc<T>) {
        self.observers
            .lock()
            .await
            .retain(|existing| !Arc::ptr_eq(existing, observer));
    }

    pub async fn snapshot(&self) -> Vec<Arc<T>> {
        self.observers.lock().await.clone()
    }
}
