//! Publication: the outbound flow of one local stream into one session.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::channel::ChannelCommand;
use crate::errors::{ClientError, Result};
use crate::events::{EventDispatcher, ObserverSet, PublicationObserver};
use crate::stream::LocalStream;
use crate::types::{ConnectionStats, PublicationId, PublishOptions, SessionMode, TrackKind};

/// Handle for one local stream published into one session.
///
/// Created by a successful `publish` call and owned jointly by the
/// application and the session channel. The channel marks it ended when
/// the session goes away; `on_ended` fires exactly once either way.
pub struct Publication {
    id: PublicationId,
    target: String,
    mode: SessionMode,
    stream: Arc<LocalStream>,
    options: PublishOptions,
    ended: AtomicBool,
    audio_muted: AtomicBool,
    video_muted: AtomicBool,
    observers: ObserverSet<dyn PublicationObserver>,
    commands: mpsc::Sender<ChannelCommand>,
    dispatcher: EventDispatcher,
}

impl Publication {
    pub(crate) fn new(
        target: String,
        mode: SessionMode,
        stream: Arc<LocalStream>,
        options: PublishOptions,
        commands: mpsc::Sender<ChannelCommand>,
        dispatcher: EventDispatcher,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: PublicationId::new(),
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
        })
    }

    pub fn id(&self) -> &PublicationId {
        &self.id
    }

    /// Remote endpoint or room this publication flows into.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn stream(&self) -> &Arc<LocalStream> {
        &self.stream
    }

    pub fn options(&self) -> &PublishOptions {
        &self.options
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    /// Server-confirmed mute state of `kind`.
    pub fn is_muted(&self, kind: TrackKind) -> bool {
        self.mute_flag(kind).load(Ordering::SeqCst)
    }

    pub async fn add_observer(&self, observer: Arc<dyn PublicationObserver>) {
        self.observers.add(observer).await;
    }

    pub async fn remove_observer(&self, observer: &Arc<dyn PublicationObserver>) {
        self.observers.remove(observer).await;
    }

    /// Ask the server to mute `kind`. Local state flips on the server's
    /// confirmation, not on this call returning.
    pub async fn mute(&self, kind: TrackKind) -> Result<()> {
        self.request_track_control(kind, true).await
    }

    /// Ask the server to unmute `kind`.
    pub async fn unmute(&self, kind: TrackKind) -> Result<()> {
        self.request_track_control(kind, false).await
    }

    /// End the outbound flow. Idempotent: a second call is a no-op.
    pub async fn stop(&self) -> Result<()> {
        if self.is_ended() {
            return Ok(());
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .commands
            .send(ChannelCommand::Unpublish {
                id: self.id.clone(),
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            // Channel already torn down; it marked this handle ended on the
            // way out.
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
                "publication has ended".to_string(),
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
                "publication has ended".to_string(),
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

    /// Mark ended and notify observers. Safe to call more than once; only
    /// the first call dispatches `on_ended`.
    pub(crate) async fn mark_ended(&self) {
        if self.ended.swap(true, Ordering::SeqCst) {
            return;
        }
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
            // Confirmation matches what we already show; nothing to report.
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

impl fmt::Debug for Publication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publication")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("mode", &self.mode)
            .field("stream", &self.stream.id())
            .field("ended", &self.is_ended())
            .finish()
    }
}
