//! Event delivery: observer traits and the per-client dispatch task.

mod dispatcher;
mod observer;

pub use dispatcher::EventDispatcher;
pub use observer::{ClientObserver, PublicationObserver, SubscriptionObserver};

pub(crate) use observer::ObserverSet;

use std::sync::Arc;

use crate::stream::RemoteStream;

/// Client-level events generated by the control plane.
#[derive(Debug, Clone)]
pub(crate) enum ClientEvent {
    Invited { remote_id: String },
    Accepted { remote_id: String },
    Denied { remote_id: String },
    SessionConnected { remote_id: String },
    SessionEnded { remote_id: String },
    StreamAdded { stream: Arc<RemoteStream> },
    StreamEnded { stream: Arc<RemoteStream> },
    Message { sender_id: String, message: String },
    ParticipantJoined { participant_id: String },
    ParticipantLeft { participant_id: String },
    ServerDisconnected,
}

/// Snapshot the observer set and queue one ordered delivery of `event` to
/// every observer in registration order.
pub(crate) async fn emit_client_event(
    observers: &ObserverSet<dyn ClientObserver>,
    dispatcher: &EventDispatcher,
    event: ClientEvent,
) {
    let snapshot = observers.snapshot().await;
    if snapshot.is_empty() {
        return;
    }
    dispatcher.dispatch(async move {
        for observer in snapshot {
            match &event {
                ClientEvent::Invited { remote_id } => observer.on_invited(remote_id).await,
                ClientEvent::Accepted { remote_id } => observer.on_accepted(remote_id).await,
                ClientEvent::Denied { remote_id } => observer.on_denied(remote_id).await,
                ClientEvent::SessionConnected { remote_id } => {
                    observer.on_session_connected(remote_id).await
                }
                ClientEvent::SessionEnded { remote_id } => {
                    observer.on_session_ended(remote_id).await
                }
                ClientEvent::StreamAdded { stream } => {
                    observer.on_stream_added(stream.clone()).await
                }
                ClientEvent::StreamEnded { stream } => {
                    observer.on_stream_ended(stream.clone()).await
                }
                ClientEvent::Message { sender_id, message } => {
                    observer.on_message(sender_id, message).await
                }
                ClientEvent::ParticipantJoined { participant_id } => {
                    observer.on_participant_joined(participant_id).await
                }
                ClientEvent::ParticipantLeft { participant_id } => {
                    observer.on_participant_left(participant_id).await
                }
                ClientEvent::ServerDisconnected => observer.on_server_disconnected().await,
            }
        }
    });
}
