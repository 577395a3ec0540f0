//! Per-target session channel: the signaling state machine.
//!
//! One channel exists per remote endpoint (peer mode) or per joined room
//! (conference mode). Each channel runs as an actor with a single command
//! loop, so its state transitions are serialized; channels for different
//! targets proceed independently. Commands carry a oneshot reply, which is
//! how public operations stay asynchronous without blocking callers on
//! anything but their own result.

mod state;

pub use state::SessionState;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use rtclink_signaling_core::SignalingTransport;

use crate::errors::{ClientError, Result};
use crate::events::{emit_client_event, ClientEvent, ClientObserver, EventDispatcher, ObserverSet};
use crate::media::{MediaEngine, MediaSession};
use crate::publication::Publication;
use crate::registry::StreamRegistry;
use crate::signaling::SignalEnvelope;
use crate::stream::{LocalStream, RemoteStream, StreamInfo};
use crate::subscription::Subscription;
use crate::types::{
    ConnectionStats, PublicationId, PublishOptions, SessionMode, StreamCapabilities,
    SubscribeOptions, SubscriptionId, TrackKind,
};

const COMMAND_QUEUE_DEPTH: usize = 64;

/// Commands processed by a channel's actor loop.
pub(crate) enum ChannelCommand {
    Invite {
        reply: oneshot::Sender<Result<()>>,
    },
    Accept {
        reply: oneshot::Sender<Result<()>>,
    },
    Deny {
        reply: oneshot::Sender<Result<()>>,
    },
    Publish {
        stream: Arc<LocalStream>,
        options: PublishOptions,
        reply: oneshot::Sender<Result<Arc<Publication>>>,
    },
    Unpublish {
        id: PublicationId,
        reply: oneshot::Sender<Result<()>>,
    },
    Subscribe {
        stream: Arc<RemoteStream>,
        options: SubscribeOptions,
        reply: oneshot::Sender<Result<Arc<Subscription>>>,
    },
    Unsubscribe {
        id: SubscriptionId,
        reply: oneshot::Sender<Result<()>>,
    },
    SendData {
        message: String,
        reply: oneshot::Sender<Result<()>>,
    },
    TrackControl {
        stream_id: String,
        track: TrackKind,
        muted: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    Stats {
        reply: oneshot::Sender<Result<ConnectionStats>>,
    },
    Stop {
        reply: oneshot::Sender<Result<()>>,
    },
    Signal {
        envelope: SignalEnvelope,
    },
    TransportLost,
    QueryState {
        reply: oneshot::Sender<SessionState>,
    },
}

/// Dependencies shared by every channel of one client.
pub(crate) struct ChannelContext {
    pub local_id: String,
    pub transport: Arc<dyn SignalingTransport>,
    pub engine: Arc<dyn MediaEngine>,
    pub registry: Arc<StreamRegistry>,
    pub observers: Arc<ObserverSet<dyn ClientObserver>>,
    pub dispatcher: EventDispatcher,
    pub hardware_acceleration: bool,
}

/// Handle to a running channel actor.
#[derive(Clone)]
pub(crate) struct ChannelHandle {
    pub target: String,
    pub mode: SessionMode,
    commands: mpsc::Sender<ChannelCommand>,
}

impl ChannelHandle {
    /// Spawn the actor for `target` and return its handle. The actor
    /// removes itself from `channels` when it retires.
    pub fn spawn(
        target: String,
        mode: SessionMode,
        ctx: Arc<ChannelContext>,
        channels: Arc<DashMap<String, ChannelHandle>>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let handle = Self {
            target: target.clone(),
            mode,
            commands: tx.clone(),
        };
        let runner = ChannelRunner {
            target,
            mode,
            ctx,
            channels,
            commands: tx,
            state: SessionState::Idle,
            retired: false,
            media: None,
            publications: Vec::new(),
            subscriptions: Vec::new(),
            pending_invite: None,
        };
        tokio::spawn(runner.run(rx));
        handle
    }

    /// Invite the target; resolves when the remote accepts or denies.
    pub async fn invite(&self) -> Result<()> {
        self.request(|reply| ChannelCommand::Invite { reply }).await
    }

    pub async fn accept(&self) -> Result<()> {
        self.request(|reply| ChannelCommand::Accept { reply }).await
    }

    pub async fn deny(&self) -> Result<()> {
        self.request(|reply| ChannelCommand::Deny { reply }).await
    }

    pub async fn publish(
        &self,
        stream: Arc<LocalStream>,
        options: PublishOptions,
    ) -> Result<Arc<Publication>> {
        self.request(|reply| ChannelCommand::Publish {
            stream,
            options,
            reply,
        })
        .await
    }

    pub async fn subscribe(
        &self,
        stream: Arc<RemoteStream>,
        options: SubscribeOptions,
    ) -> Result<Arc<Subscription>> {
        self.request(|reply| ChannelCommand::Subscribe {
            stream,
            options,
            reply,
        })
        .await
    }

    pub async fn send_data(&self, message: String) -> Result<()> {
        self.request(|reply| ChannelCommand::SendData { message, reply })
            .await
    }

    pub async fn stats(&self) -> Result<ConnectionStats> {
        self.request(|reply| ChannelCommand::Stats { reply }).await
    }

    /// Stop the session. Succeeds even when the channel is already gone.
    pub async fn stop(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .commands
            .send(ChannelCommand::Stop { reply: reply_tx })
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

    /// Current state, or `None` when the actor has retired.
    pub async fn state(&self) -> Option<SessionState> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .commands
            .send(ChannelCommand::QueryState { reply: reply_tx })
            .await
            .is_err()
        {
            return None;
        }
        reply_rx.await.ok()
    }

    /// Forward an inbound signaling envelope.
    pub async fn signal(&self, envelope: SignalEnvelope) {
        let _ = self.commands.send(ChannelCommand::Signal { envelope }).await;
    }

    /// Tear the session down after a transport loss.
    pub async fn transport_lost(&self) {
        let _ = self.commands.send(ChannelCommand::TransportLost).await;
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> ChannelCommand,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply_tx))
            .await
            .map_err(|_| ClientError::InvalidState("session has closed".to_string()))?;
        reply_rx
            .await
            .map_err(|_| ClientError::InvalidState("session has closed".to_string()))?
    }
}

struct ChannelRunner {
    target: String,
    mode: SessionMode,
    ctx: Arc<ChannelContext>,
    channels: Arc<DashMap<String, ChannelHandle>>,
    commands: mpsc::Sender<ChannelCommand>,
    state: SessionState,
    retired: bool,
    media: Option<Arc<dyn MediaSession>>,
    publications: Vec<Arc<Publication>>,
    subscriptions: Vec<Arc<Subscription>>,
    pending_invite: Option<oneshot::Sender<Result<()>>>,
}

impl ChannelRunner {
    async fn run(mut self, mut rx: mpsc::Receiver<ChannelCommand>) {
        debug!(target = %self.target, mode = %self.mode, "session channel started");
        while let Some(command) = rx.recv().await {
            self.handle_command(command).await;
            if self.retired {
                break;
            }
        }
        rx.close();
        self.channels.remove_if(&self.target, |_, handle| {
            handle.commands.same_channel(&self.commands)
        });
        debug!(target = %self.target, "session channel retired");
    }

    async fn handle_command(&mut self, command: ChannelCommand) {
        match command {
            ChannelCommand::Invite { reply } => self.handle_invite(reply).await,
            ChannelCommand::Accept { reply } => self.handle_accept(reply).await,
            ChannelCommand::Deny { reply } => self.handle_deny(reply).await,
            ChannelCommand::Publish {
                stream,
                options,
                reply,
            } => {
                let _ = reply.send(self.handle_publish(stream, options).await);
            }
            ChannelCommand::Unpublish { id, reply } => {
                let _ = reply.send(self.handle_unpublish(id).await);
            }
            ChannelCommand::Subscribe {
                stream,
                options,
                reply,
            } => {
                let _ = reply.send(self.handle_subscribe(stream, options).await);
            }
            ChannelCommand::Unsubscribe { id, reply } => {
                let _ = reply.send(self.handle_unsubscribe(id).await);
            }
            ChannelCommand::SendData { message, reply } => {
                let _ = reply.send(self.handle_send_data(message).await);
            }
            ChannelCommand::TrackControl {
                stream_id,
                track,
                muted,
                reply,
            } => {
                let _ = reply.send(self.handle_track_control(stream_id, track, muted).await);
            }
            ChannelCommand::Stats { reply } => {
                let _ = reply.send(self.handle_stats().await);
            }
            ChannelCommand::Stop { reply } => {
                if !self.state.is_closed() {
                    self.teardown(true).await;
                }
                let _ = reply.send(Ok(()));
            }
            ChannelCommand::Signal { envelope } => self.handle_signal(envelope).await,
            ChannelCommand::TransportLost => {
                if !self.state.is_closed() {
                    debug!(target = %self.target, "transport lost; closing session");
                    self.teardown(false).await;
                }
            }
            ChannelCommand::QueryState { reply } => {
                let _ = reply.send(self.state);
            }
        }
    }

    // ===== Local operations =====

    async fn handle_invite(&mut self, reply: oneshot::Sender<Result<()>>) {
        if self.state != SessionState::Idle {
            let _ = reply.send(Err(ClientError::InvalidState(format!(
                "cannot invite {} while {}",
                self.target, self.state
            ))));
            return;
        }
        if let Err(e) = self.send_envelope(SignalEnvelope::Invite).await {
            // Nothing was sent, so the channel stays Idle; retire it so the
            // client map does not accumulate dead entries.
            self.retired = true;
            let error = match e {
                ClientError::MessageUnreachable(target) => ClientError::RemoteNotExisting(target),
                other => other,
            };
            let _ = reply.send(Err(error));
            return;
        }
        self.set_state(SessionState::Inviting);
        self.pending_invite = Some(reply);
    }

    async fn handle_accept(&mut self, reply: oneshot::Sender<Result<()>>) {
        if self.state != SessionState::Invited {
            let _ = reply.send(Err(ClientError::InvalidState(format!(
                "no pending invitation from {} (state {})",
                self.target, self.state
            ))));
            return;
        }
        if let Err(e) = self.send_envelope(SignalEnvelope::Accept).await {
            let _ = reply.send(Err(e));
            return;
        }
        self.set_state(SessionState::Connecting);

        let media = match self
            .ctx
            .engine
            .open_session(&self.target, self.ctx.hardware_acceleration)
            .await
        {
            Ok(media) => media,
            Err(e) => {
                let _ = reply.send(Err(e));
                self.teardown(true).await;
                return;
            }
        };
        self.media = Some(media.clone());
        let offer = match media.create_offer().await {
            Ok(offer) => offer,
            Err(e) => {
                let _ = reply.send(Err(e));
                self.teardown(true).await;
                return;
            }
        };
        if let Err(e) = self
            .send_envelope(SignalEnvelope::Sdp { description: offer })
            .await
        {
            let _ = reply.send(Err(e));
            self.teardown(true).await;
            return;
        }
        let _ = reply.send(Ok(()));
    }

    async fn handle_deny(&mut self, reply: oneshot::Sender<Result<()>>) {
        if self.state != SessionState::Invited {
            let _ = reply.send(Err(ClientError::InvalidState(format!(
                "no pending invitation from {} (state {})",
                self.target, self.state
            ))));
            return;
        }
        if let Err(e) = self.send_envelope(SignalEnvelope::Deny).await {
            let _ = reply.send(Err(e));
            return;
        }
        self.set_state(SessionState::Idle);
        self.retired = true;
        let _ = reply.send(Ok(()));
    }

    async fn handle_publish(
        &mut self,
        stream: Arc<LocalStream>,
        options: PublishOptions,
    ) -> Result<Arc<Publication>> {
        if !self.state.allows_media_ops() {
            return Err(ClientError::InvalidState(format!(
                "cannot publish to {} while {}",
                self.target, self.state
            )));
        }
        if stream.is_ended() {
            return Err(ClientError::InvalidParam("stream has ended".to_string()));
        }
        let info = stream.to_info(&self.ctx.local_id, capabilities_from_options(&options));
        self.send_envelope(SignalEnvelope::Publish { stream: info })
            .await?;

        let publication = Publication::new(
            self.target.clone(),
            self.mode,
            stream,
            options,
            self.commands.clone(),
            self.ctx.dispatcher.clone(),
        );
        info!(target = %self.target, publication = %publication.id(), "stream published");
        self.publications.push(publication.clone());
        Ok(publication)
    }

    async fn handle_unpublish(&mut self, id: PublicationId) -> Result<()> {
        let position = match self.publications.iter().position(|p| *p.id() == id) {
            Some(position) => position,
            None => return Ok(()),
        };
        let publication = self.publications.remove(position);
        if self.state.allows_media_ops() {
            let retired = SignalEnvelope::Unpublish {
                stream_id: publication.stream_id().to_string(),
            };
            if let Err(e) = self.send_envelope(retired).await {
                warn!(target = %self.target, error = %e, "unpublish signal not delivered");
            }
        }
        publication.mark_ended().await;
        Ok(())
    }

    async fn handle_subscribe(
        &mut self,
        stream: Arc<RemoteStream>,
        options: SubscribeOptions,
    ) -> Result<Arc<Subscription>> {
        if !self.state.allows_media_ops() {
            return Err(ClientError::InvalidState(format!(
                "cannot subscribe via {} while {}",
                self.target, self.state
            )));
        }
        if stream.is_ended() {
            return Err(ClientError::InvalidParam("stream has ended".to_string()));
        }
        if self.mode == SessionMode::Peer && stream.origin() != self.target {
            return Err(ClientError::NotSupported(
                "peer-to-peer subscribe is limited to streams from the session peer".to_string(),
            ));
        }
        if !self.ctx.registry.pin(stream.id()).await {
            return Err(ClientError::InvalidParam(format!(
                "stream {} is not announced",
                stream.id()
            )));
        }
        let request = SignalEnvelope::Subscribe {
            stream_id: stream.id().to_string(),
            options: options.clone(),
        };
        if let Err(e) = self.send_envelope(request).await {
            self.ctx.registry.unpin(stream.id()).await;
            return Err(e);
        }

        let subscription = Subscription::new(
            self.target.clone(),
            self.mode,
            stream,
            options,
            self.commands.clone(),
            self.ctx.dispatcher.clone(),
            self.ctx.registry.clone(),
        );
        info!(target = %self.target, subscription = %subscription.id(), "stream subscribed");
        self.subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    async fn handle_unsubscribe(&mut self, id: SubscriptionId) -> Result<()> {
        let position = match self.subscriptions.iter().position(|s| *s.id() == id) {
            Some(position) => position,
            None => return Ok(()),
        };
        let subscription = self.subscriptions.remove(position);
        if self.state.allows_media_ops() {
            let retired = SignalEnvelope::Unsubscribe {
                stream_id: subscription.stream_id().to_string(),
            };
            if let Err(e) = self.send_envelope(retired).await {
                warn!(target = %self.target, error = %e, "unsubscribe signal not delivered");
            }
        }
        subscription.mark_ended().await;
        Ok(())
    }

    async fn handle_send_data(&mut self, message: String) -> Result<()> {
        if !self.state.allows_media_ops() {
            return Err(ClientError::InvalidState(format!(
                "cannot send to {} while {}",
                self.target, self.state
            )));
        }
        self.send_envelope(SignalEnvelope::Data { message }).await
    }

    async fn handle_track_control(
        &mut self,
        stream_id: String,
        track: TrackKind,
        muted: bool,
    ) -> Result<()> {
        if self.mode == SessionMode::Peer {
            return Err(ClientError::NotSupported(
                "mute is not available in peer-to-peer sessions".to_string(),
            ));
        }
        if !self.state.allows_media_ops() {
            return Err(ClientError::InvalidState(format!(
                "cannot change tracks on {} while {}",
                self.target, self.state
            )));
        }
        self.send_envelope(SignalEnvelope::TrackControl {
            stream_id,
            track,
            muted,
        })
        .await
    }

    async fn handle_stats(&mut self) -> Result<ConnectionStats> {
        if !self.state.allows_stats() {
            return Err(ClientError::InvalidState(format!(
                "no stats for {} while {}",
                self.target, self.state
            )));
        }
        match &self.media {
            Some(media) => media.stats().await,
            None => Err(ClientError::InvalidState(
                "media session is not established".to_string(),
            )),
        }
    }

    // ===== Inbound signaling =====

    async fn handle_signal(&mut self, envelope: SignalEnvelope) {
        match envelope {
            SignalEnvelope::Invite => self.on_remote_invite().await,
            SignalEnvelope::Accept => self.on_remote_accept().await,
            SignalEnvelope::Deny => self.on_remote_deny().await,
            SignalEnvelope::Stop => {
                if self.state.is_closed() {
                    debug!(target = %self.target, "duplicate stop signal ignored");
                } else {
                    self.teardown(false).await;
                }
            }
            SignalEnvelope::Sdp { description } => self.on_remote_description(description).await,
            SignalEnvelope::Ice { candidate } => self.on_remote_candidate(candidate).await,
            SignalEnvelope::Publish { stream } => self.on_stream_announced(stream).await,
            SignalEnvelope::Unpublish { stream_id }
            | SignalEnvelope::StreamEnded { stream_id } => {
                self.on_stream_retired(stream_id).await;
            }
            SignalEnvelope::TrackControl {
                stream_id,
                track,
                muted,
            }
            | SignalEnvelope::TrackControlAck {
                stream_id,
                track,
                muted,
            } => {
                self.on_track_control_confirmed(stream_id, track, muted)
                    .await;
            }
            SignalEnvelope::Data { message } => {
                if self.state.allows_media_ops() {
                    self.emit(ClientEvent::Message {
                        sender_id: self.target.clone(),
                        message,
                    })
                    .await;
                } else {
                    warn!(target = %self.target, state = %self.state, "dropping data outside a connected session");
                }
            }
            SignalEnvelope::ParticipantJoined { participant_id } => {
                if self.mode == SessionMode::Conference {
                    self.emit(ClientEvent::ParticipantJoined { participant_id })
                        .await;
                } else {
                    warn!(target = %self.target, "participant event on a peer session ignored");
                }
            }
            SignalEnvelope::ParticipantLeft { participant_id } => {
                if self.mode == SessionMode::Conference {
                    self.emit(ClientEvent::ParticipantLeft { participant_id })
                        .await;
                } else {
                    warn!(target = %self.target, "participant event on a peer session ignored");
                }
            }
            SignalEnvelope::Subscribe { .. } | SignalEnvelope::Unsubscribe { .. } => {
                warn!(target = %self.target, "subscription request addressed to a client ignored");
            }
        }
    }

    async fn on_remote_invite(&mut self) {
        match self.state {
            SessionState::Idle => {
                self.set_state(SessionState::Invited);
                self.emit(ClientEvent::Invited {
                    remote_id: self.target.clone(),
                })
                .await;
            }
            SessionState::Invited => {
                debug!(target = %self.target, "duplicate invite ignored");
            }
            _ => {
                warn!(target = %self.target, state = %self.state, "invite ignored in current state");
            }
        }
    }

    async fn on_remote_accept(&mut self) {
        if self.state != SessionState::Inviting {
            warn!(target = %self.target, state = %self.state, "accept ignored in current state");
            return;
        }
        let media = match self
            .ctx
            .engine
            .open_session(&self.target, self.ctx.hardware_acceleration)
            .await
        {
            Ok(media) => media,
            Err(e) => {
                if let Some(reply) = self.pending_invite.take() {
                    let _ = reply.send(Err(e));
                }
                self.teardown(true).await;
                return;
            }
        };
        self.media = Some(media);
        self.set_state(SessionState::Connected);
        if let Some(reply) = self.pending_invite.take() {
            let _ = reply.send(Ok(()));
        }
        self.emit(ClientEvent::Accepted {
            remote_id: self.target.clone(),
        })
        .await;
        self.emit(ClientEvent::SessionConnected {
            remote_id: self.target.clone(),
        })
        .await;
    }

    async fn on_remote_deny(&mut self) {
        if self.state != SessionState::Inviting {
            warn!(target = %self.target, state = %self.state, "deny ignored in current state");
            return;
        }
        self.set_state(SessionState::Idle);
        self.retired = true;
        if let Some(reply) = self.pending_invite.take() {
            let _ = reply.send(Err(ClientError::RemoteNotAllowed(self.target.clone())));
        }
        self.emit(ClientEvent::Denied {
            remote_id: self.target.clone(),
        })
        .await;
    }

    async fn on_remote_description(&mut self, description: String) {
        match self.state {
            SessionState::Connecting => {
                let media = match &self.media {
                    Some(media) => media.clone(),
                    None => return,
                };
                if let Err(e) = media.set_remote_description(&description).await {
                    warn!(target = %self.target, error = %e, "remote description rejected; closing session");
                    self.teardown(true).await;
                    return;
                }
                self.set_state(SessionState::Connected);
                self.emit(ClientEvent::SessionConnected {
                    remote_id: self.target.clone(),
                })
                .await;
            }
            SessionState::Connected => {
                // Offer from the remote side (initial accepter offer, or a
                // renegotiation); answer it.
                let media = match &self.media {
                    Some(media) => media.clone(),
                    None => return,
                };
                let answer = match media.create_answer(&description).await {
                    Ok(answer) => answer,
                    Err(e) => {
                        warn!(target = %self.target, error = %e, "failed to answer remote description; closing session");
                        self.teardown(true).await;
                        return;
                    }
                };
                if let Err(e) = self
                    .send_envelope(SignalEnvelope::Sdp {
                        description: answer,
                    })
                    .await
                {
                    warn!(target = %self.target, error = %e, "answer not delivered; closing session");
                    self.teardown(true).await;
                }
            }
            _ => {
                warn!(target = %self.target, state = %self.state, "session description ignored in current state");
            }
        }
    }

    async fn on_remote_candidate(&mut self, candidate: String) {
        let media = match &self.media {
            Some(media) => media.clone(),
            None => {
                debug!(target = %self.target, "candidate before media session; dropped");
                return;
            }
        };
        if let Err(e) = media.add_ice_candidate(&candidate).await {
            warn!(target = %self.target, error = %e, "candidate rejected by engine");
        }
    }

    async fn on_stream_announced(&mut self, mut info: StreamInfo) {
        if !matches!(
            self.state,
            SessionState::Connecting | SessionState::Connected
        ) {
            warn!(target = %self.target, state = %self.state, "stream announcement ignored in current state");
            return;
        }
        if self.mode == SessionMode::Peer {
            // A peer can only announce its own streams.
            info.origin = self.target.clone();
        }
        let (stream, is_new) = self.ctx.registry.register(info, &self.target).await;
        if is_new {
            self.emit(ClientEvent::StreamAdded { stream }).await;
        }
    }

    async fn on_stream_retired(&mut self, stream_id: String) {
        let mut ended = Vec::new();
        self.subscriptions.retain(|subscription| {
            if subscription.stream_id() == stream_id {
                ended.push(subscription.clone());
                false
            } else {
                true
            }
        });
        for subscription in ended {
            subscription.mark_ended().await;
        }
        if let Some(stream) = self.ctx.registry.mark_ended(&stream_id).await {
            self.emit(ClientEvent::StreamEnded { stream }).await;
        }
    }

    async fn on_track_control_confirmed(
        &mut self,
        stream_id: String,
        track: TrackKind,
        muted: bool,
    ) {
        if self.mode == SessionMode::Peer {
            warn!(target = %self.target, "track control on a peer session ignored");
            return;
        }
        for publication in &self.publications {
            if publication.stream_id() == stream_id {
                publication.apply_track_control(track, muted).await;
                return;
            }
        }
        for subscription in &self.subscriptions {
            if subscription.stream_id() == stream_id {
                subscription.apply_track_control(track, muted).await;
                return;
            }
        }
        debug!(target = %self.target, stream = %stream_id, "track control for unknown stream");
    }

    // ===== Shared plumbing =====

    /// Close the session: mark every owned publication and subscription
    /// ended, release the media session, optionally signal the remote, and
    /// land in `Closed`. The channel retires afterwards.
    async fn teardown(&mut self, send_stop: bool) {
        let had_session = self.state != SessionState::Idle;
        self.set_state(SessionState::Ending);

        if send_stop {
            if let Err(e) = self.send_envelope(SignalEnvelope::Stop).await {
                debug!(target = %self.target, error = %e, "stop signal not delivered");
            }
        }
        for publication in self.publications.drain(..) {
            publication.mark_ended().await;
        }
        for subscription in self.subscriptions.drain(..) {
            subscription.mark_ended().await;
        }
        if let Some(media) = self.media.take() {
            if let Err(e) = media.close().await {
                warn!(target = %self.target, error = %e, "media session close failed");
            }
        }
        if let Some(reply) = self.pending_invite.take() {
            let _ = reply.send(Err(ClientError::InvalidState(
                "session stopped".to_string(),
            )));
        }
        self.set_state(SessionState::Closed);
        self.retired = true;
        if had_session {
            self.emit(ClientEvent::SessionEnded {
                remote_id: self.target.clone(),
            })
            .await;
        }
    }

    async fn send_envelope(&self, envelope: SignalEnvelope) -> Result<()> {
        let payload = envelope.encode()?;
        self.ctx
            .transport
            .send_message(&payload, Some(&self.target))
            .await
            .map_err(ClientError::from)
    }

    async fn emit(&self, event: ClientEvent) {
        emit_client_event(&self.ctx.observers, &self.ctx.dispatcher, event).await;
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state != next {
            info!(target = %self.target, from = %self.state, to = %next, "session state changed");
            self.state = next;
        }
    }
}

fn capabilities_from_options(options: &PublishOptions) -> StreamCapabilities {
    StreamCapabilities {
        audio: options.audio_codecs.clone(),
        video: options.video_codecs.clone(),
        max_resolution: None,
        max_frame_rate: None,
        max_bitrate_bps: options
            .max_video_bitrate_bps
            .or(options.max_audio_bitrate_bps),
    }
}
