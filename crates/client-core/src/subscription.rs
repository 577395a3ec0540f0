//! Subscription: the inbound flow of one remote stream from one session.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::channel::ChannelCommand;
use crate::errors::{ClientError, Result};
use crate::events::{EventDispatcher, ObserverSet, SubscriptionObserver};
use crate::registry::StreamRegistry;
use crate::stream::RemoteStream;
use crate::types::{ConnectionStats, SessionMode, SubscribeOptions, SubscriptionId, TrackKind};

/// Handle for one remote stream subscribed from one session.
///
/// Once ended it cannot be resumed; the application subscribes again to get
/// a new handle. The subscription pins its stream in the registry for as
/// long as it lives.
pub struct Subscription {
    id: SubscriptionId,
    target: String,
    mode: SessionMode,
    stream: Arc<RemoteStream>,
    options: SubscribeOptions,
    ended: AtomicBool,
    audio_muted: AtomicBool,
    video_muted: AtomicBool,
    observers: ObserverSet<dyn SubscriptionObserver>,
    commands: mpsc::Sender<ChannelCommand>,
    dispatcher: EventDispatcher,
    registry: Arc<StreamRegistry>,
}

impl Subscription {
    pub(crate) fn new(
        target: String,
        mode: SessionMode,
        stream: Arc<RemoteStream>,
        options: SubscribeOptions,
        commands: mpsc::Sender<ChannelCommand>,
        dispatcher: EventDispatcher,
        registry: Arc<StreamRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: SubscriptionId::new(),
            target,
            mode,
            stream,
            options,
            ended: AtomicBool::new(false),
            audio_muted: AtomicBool::new(false),
            video_muted: AtomicBool::new(false),
            observers: ObserverSet::new(),
            commands,
            dispatcher,
            registry,
        })
    }

    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    /// Remote endpoint or room this subscription flows from.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn stream(&self) -> &Arc<RemoteStream> {
        &self.stream
    }

    /// Constraint snapshot used to request the subscription.
    pub fn options(&self) -> &SubscribeOptions {
        &self.options
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    /// Server-confirmed mute state of `kind`.
    pub fn is_muted(&self, kind: TrackKind) -> bool {
        self.mute_flag(kind).load(Ordering::SeqCst)
    }

    pub async fn add_observer(&self, observer: Arc<dyn SubscriptionObserver>) {
        self.observers.add(observer).await;
    }

    pub async fn remove_observer(&self, observer: &Arc<dyn SubscriptionObserver>) {
        self.observers.remove(observer).await;
    }

    /// Ask the server to stop delivering `kind`. Local state flips on the
    /// server's confirmation.
    pub async fn mute(&self, kind: TrackKind) -> Result<()> {
        self.request_track_control(kind, true).await
    }

    /// Ask the server to resume delivering `kind`.
    pub async fn unmute(&self, kind: TrackKind) -> Result<()> {
        self.request_track_control(kind, false).await
    }

    /// End the inbound flow. Idempotent: a second call is a no-op.
    pub async fn stop(&self) -> Result<()> {
        if self.is_ended() {
            return Ok(());
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .commands
            .send(ChannelCommand::Unsubscribe {
                id: self.id.clone(),
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            return Ok(());
        }
        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Ok(()),
        }
    }

    /// Connection statistics for the owning session.
    pub async fn stats(&self) -> Result<ConnectionStats> {
        if self.is_ended() {
            return Err(ClientError::InvalidState(
                "subscription has ended".to_string(),
            ));
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(ChannelCommand::Stats { reply: reply_tx })
            .await
            .map_err(|_| ClientError::InvalidState("session has closed".to_string()))?;
        reply_rx
            .await
            .map_err(|_| ClientError::InvalidState("session has closed".to_string()))?
    }

    async fn request_track_control(&self, kind: TrackKind, muted: bool) -> Result<()> {
        if self.mode == SessionMode::Peer {
            return Err(ClientError::NotSupported(
                "mute is not available in peer-to-peer sessions".to_string(),
            ));
        }
        if self.is_ended() {
            return Err(ClientError::InvalidState(
                "subscription has ended".to_string(),
            ));
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(ChannelCommand::TrackControl {
                stream_id: self.stream.id().to_string(),
                track: kind,
                muted,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ClientError::InvalidState("session has closed".to_string()))?;
        reply_rx
            .await
            .map_err(|_| ClientError::InvalidState("session has closed".to_string()))?
    }

    fn mute_flag(&self, kind: TrackKind) -> &AtomicBool {
        match kind {
            TrackKind::Audio => &self.audio_muted,
            TrackKind::Video => &self.video_muted,
        }
    }

    /// Mark ended, release the registry pin, and notify observers exactly
    /// once.
    pub(crate) async fn mark_ended(&self) {
        if self.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        self.registry.unpin(self.stream.id()).await;
        let snapshot = self.observers.snapshot().await;
        self.dispatcher.dispatch(async move {
            for observer in snapshot {
                observer.on_ended().await;
            }
        });
    }

    /// Apply a server-confirmed track state change.
    pub(crate) async fn apply_track_control(&self, kind: TrackKind, muted: bool) {
        if self.is_ended() {
            return;
        }
        if self.mute_flag(kind).swap(muted, Ordering::SeqCst) == muted {
            return;
        }
        let snapshot = self.observers.snapshot().await;
        self.dispatcher.dispatch(async move {
            for observer in snapshot {
                if muted {
                    observer.on_mute(kind).await;
                } else {
                    observer.on_unmute(kind).await;
                }
            }
        });
    }

    pub(crate) fn stream_id(&self) -> &str {
        self.stream.id()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("mode", &self.mode)
            .field("stream", &self.stream.id())
            .field("ended", &self.is_ended())
            .finish()
    }
}
