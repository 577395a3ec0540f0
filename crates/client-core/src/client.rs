//! Top-level client: the object the application talks to.
//!
//! The client owns the signaling transport, the stream registry, and one
//! session channel per target. It routes inbound signaling to the matching
//! channel by sender id, creates channels for unmatched invites, and fans
//! lifecycle events out to registered observers through its dispatcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use rtclink_signaling_core::{SignalingTransport, TransportEvent};

use crate::channel::{ChannelContext, ChannelHandle, SessionState};
use crate::config::ClientConfig;
use crate::errors::{ClientError, Result};
use crate::events::{
    emit_client_event, ClientEvent, ClientObserver, EventDispatcher, ObserverSet,
};
use crate::media::{MediaEngine, NullMediaEngine};
use crate::publication::Publication;
use crate::registry::StreamRegistry;
use crate::signaling::SignalEnvelope;
use crate::stream::{LocalStream, RemoteStream};
use crate::subscription::Subscription;
use crate::types::{ConnectionStats, PublishOptions, SessionMode, SubscribeOptions};

/// Builder for [`Client`].
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn SignalingTransport>>,
    engine: Arc<dyn MediaEngine>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            transport: None,
            engine: Arc::new(NullMediaEngine),
        }
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the signaling transport. Required.
    pub fn with_transport(mut self, transport: Arc<dyn SignalingTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the media engine. Defaults to [`NullMediaEngine`].
    pub fn with_media_engine(mut self, engine: Arc<dyn MediaEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Build the client. Must run inside a tokio runtime; the client's
    /// event dispatch task starts here.
    pub async fn build(self) -> Result<Arc<Client>> {
        let transport = self.transport.ok_or_else(|| {
            ClientError::InvalidParam("a signaling transport is required".to_string())
        })?;
        Ok(Arc::new(Client {
            config: self.config,
            transport,
            engine: self.engine,
            registry: Arc::new(StreamRegistry::new()),
            channels: Arc::new(DashMap::new()),
            observers: Arc::new(ObserverSet::new()),
            dispatcher: EventDispatcher::spawn(),
            ctx: RwLock::new(None),
            local_id: RwLock::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            transport_lost: RwLock::new(Arc::new(AtomicBool::new(true))),
        }))
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Session manager for peer-to-peer and conference media sessions.
pub struct Client {
    config: ClientConfig,
    transport: Arc<dyn SignalingTransport>,
    engine: Arc<dyn MediaEngine>,
    registry: Arc<StreamRegistry>,
    channels: Arc<DashMap<String, ChannelHandle>>,
    observers: Arc<ObserverSet<dyn ClientObserver>>,
    dispatcher: EventDispatcher,
    ctx: RwLock<Option<Arc<ChannelContext>>>,
    local_id: RwLock<Option<String>>,
    connected: Arc<AtomicBool>,
    /// Loss marker for the current connection; replaced on every connect so
    /// a stale router task cannot tear down a newer connection.
    transport_lost: RwLock<Arc<AtomicBool>>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    // ===== Connection =====

    /// Open the signaling transport. Returns the endpoint id assigned by
    /// the server. Fails with `InvalidState` when already connected and
    /// `AuthFailed` when the server rejects `token`.
    pub async fn connect(&self, token: &str) -> Result<String> {
        if self
            .connected
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ClientError::InvalidState(
                "client is already connected".to_string(),
            ));
        }

        let connection = match self.transport.connect(token).await {
            Ok(connection) => connection,
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };
        info!(client = %self.config.name, local_id = %connection.local_id, "connected to signaling");

        let ctx = Arc::new(ChannelContext {
            local_id: connection.local_id.clone(),
            transport: self.transport.clone(),
            engine: self.engine.clone(),
            registry: self.registry.clone(),
            observers: self.observers.clone(),
            dispatcher: self.dispatcher.clone(),
            hardware_acceleration: self.config.hardware_acceleration,
        });
        *self.ctx.write().await = Some(ctx.clone());
        *self.local_id.write().await = Some(connection.local_id.clone());
        let lost_marker = Arc::new(AtomicBool::new(false));
        *self.transport_lost.write().await = lost_marker.clone();

        let router = Router {
            channels: self.channels.clone(),
            ctx,
            observers: self.observers.clone(),
            dispatcher: self.dispatcher.clone(),
            connected: self.connected.clone(),
            transport_lost: lost_marker,
        };
        tokio::spawn(router.run(connection.events));

        Ok(connection.local_id)
    }

    /// Close the transport and end every session.
    pub async fn disconnect(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Err(ClientError::InvalidState(
                "client is not connected".to_string(),
            ));
        }
        // A local disconnect is not a server loss; suppress that path.
        self.transport_lost
            .read()
            .await
            .store(true, Ordering::SeqCst);

        let handles: Vec<ChannelHandle> = self
            .channels
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for handle in handles {
            let _ = handle.stop().await;
        }
        self.transport.disconnect().await.map_err(ClientError::from)?;
        *self.ctx.write().await = None;
        *self.local_id.write().await = None;
        info!(client = %self.config.name, "disconnected from signaling");
        Ok(())
    }

    /// Endpoint id assigned by the signaling server, when connected.
    pub async fn local_id(&self) -> Option<String> {
        self.local_id.read().await.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    // ===== Observers =====

    pub async fn add_observer(&self, observer: Arc<dyn ClientObserver>) {
        self.observers.add(observer).await;
    }

    pub async fn remove_observer(&self, observer: &Arc<dyn ClientObserver>) {
        self.observers.remove(observer).await;
    }

    // ===== Session lifecycle =====

    /// Invite `remote_id` to a peer-to-peer session. Resolves when the
    /// remote accepts (`Ok`) or denies (`RemoteNotAllowed`).
    pub async fn invite(&self, remote_id: &str) -> Result<()> {
        let ctx = self.require_connected().await?;
        self.validate_target(remote_id, &ctx)?;
        let handle = self.channel_or_spawn(remote_id, SessionMode::Peer, &ctx)?;
        handle.invite().await
    }

    /// Join a conference room. The room channel runs the same invite
    /// handshake against the server.
    pub async fn join(&self, room_id: &str) -> Result<()> {
        let ctx = self.require_connected().await?;
        self.validate_target(room_id, &ctx)?;
        let handle = self.channel_or_spawn(room_id, SessionMode::Conference, &ctx)?;
        handle.invite().await
    }

    /// Accept a pending invitation from `remote_id`.
    pub async fn accept(&self, remote_id: &str) -> Result<()> {
        self.require_connected().await?;
        let handle = self.channel(remote_id).ok_or_else(|| {
            ClientError::InvalidState(format!("no pending invitation from {remote_id}"))
        })?;
        handle.accept().await
    }

    /// Refuse a pending invitation from `remote_id`.
    pub async fn deny(&self, remote_id: &str) -> Result<()> {
        self.require_connected().await?;
        let handle = self.channel(remote_id).ok_or_else(|| {
            ClientError::InvalidState(format!("no pending invitation from {remote_id}"))
        })?;
        handle.deny().await
    }

    /// End the session with `target`. Idempotent: succeeds when no session
    /// exists.
    pub async fn stop(&self, target: &str) -> Result<()> {
        match self.channel(target) {
            Some(handle) => handle.stop().await,
            None => Ok(()),
        }
    }

    // ===== Media flows =====

    /// Publish `stream` into the session with `target`. The session must be
    /// connected.
    pub async fn publish(
        &self,
        stream: &Arc<LocalStream>,
        target: &str,
        options: Option<PublishOptions>,
    ) -> Result<Arc<Publication>> {
        self.require_connected().await?;
        if stream.is_ended() {
            return Err(ClientError::InvalidParam("stream has ended".to_string()));
        }
        let handle = self.channel(target).ok_or_else(|| {
            ClientError::InvalidState(format!("no active session with {target}"))
        })?;
        let options = options.unwrap_or_else(|| self.config.default_publish_options.clone());
        handle.publish(stream.clone(), options).await
    }

    /// Subscribe to an announced remote stream through the session that
    /// announced it.
    pub async fn subscribe(
        &self,
        stream: &Arc<RemoteStream>,
        options: Option<SubscribeOptions>,
    ) -> Result<Arc<Subscription>> {
        self.require_connected().await?;
        let handle = self.channel(stream.via()).ok_or_else(|| {
            ClientError::InvalidParam(format!(
                "stream {} does not belong to an active session",
                stream.id()
            ))
        })?;
        handle
            .subscribe(stream.clone(), options.unwrap_or_default())
            .await
    }

    /// Send application data: unicast with a target, or broadcast into the
    /// joined room without one.
    pub async fn send(&self, message: &str, target: Option<&str>) -> Result<()> {
        self.require_connected().await?;
        let handle = match target {
            Some(target) => self.channel(target).ok_or_else(|| {
                ClientError::InvalidState(format!("no active session with {target}"))
            })?,
            None => {
                let rooms: Vec<ChannelHandle> = self
                    .channels
                    .iter()
                    .filter(|entry| entry.value().mode == SessionMode::Conference)
                    .map(|entry| entry.value().clone())
                    .collect();
                match rooms.len() {
                    0 => {
                        return Err(ClientError::InvalidParam(
                            "a target is required outside a conference".to_string(),
                        ))
                    }
                    1 => rooms.into_iter().next().ok_or_else(|| {
                        ClientError::Unknown("room channel disappeared".to_string())
                    })?,
                    _ => {
                        return Err(ClientError::InvalidParam(
                            "multiple rooms joined; a target is required".to_string(),
                        ))
                    }
                }
            }
        };
        handle.send_data(message.to_string()).await
    }

    /// Connection statistics for the session with `target`.
    pub async fn stats(&self, target: &str) -> Result<ConnectionStats> {
        self.require_connected().await?;
        let handle = self.channel(target).ok_or_else(|| {
            ClientError::InvalidState(format!("no active session with {target}"))
        })?;
        handle.stats().await
    }

    /// Current state of the session with `target`, when one exists.
    pub async fn session_state(&self, target: &str) -> Option<SessionState> {
        match self.channel(target) {
            Some(handle) => handle.state().await,
            None => None,
        }
    }

    /// Look up an announced remote stream by id.
    pub async fn remote_stream(&self, stream_id: &str) -> Option<Arc<RemoteStream>> {
        self.registry.get(stream_id).await
    }

    // ===== Internal helpers =====

    async fn require_connected(&self) -> Result<Arc<ChannelContext>> {
        if !self.is_connected() {
            return Err(ClientError::InvalidState(
                "client is not connected to signaling".to_string(),
            ));
        }
        self.ctx.read().await.clone().ok_or_else(|| {
            ClientError::InvalidState("client is not connected to signaling".to_string())
        })
    }

    fn validate_target(&self, target: &str, ctx: &Arc<ChannelContext>) -> Result<()> {
        if target.is_empty() {
            return Err(ClientError::InvalidParam(
                "target id must not be empty".to_string(),
            ));
        }
        if target == ctx.local_id {
            return Err(ClientError::InvalidParam(
                "target id must not be the local endpoint".to_string(),
            ));
        }
        Ok(())
    }

    fn channel(&self, target: &str) -> Option<ChannelHandle> {
        self.channels.get(target).map(|entry| entry.value().clone())
    }

    fn channel_or_spawn(
        &self,
        target: &str,
        mode: SessionMode,
        ctx: &Arc<ChannelContext>,
    ) -> Result<ChannelHandle> {
        let entry = self.channels.entry(target.to_string()).or_insert_with(|| {
            ChannelHandle::spawn(
                target.to_string(),
                mode,
                ctx.clone(),
                self.channels.clone(),
            )
        });
        let handle = entry.value().clone();
        if handle.mode != mode {
            return Err(ClientError::InvalidParam(format!(
                "{target} is already in use as a {} session",
                handle.mode
            )));
        }
        Ok(handle)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("name", &self.config.name)
            .field("connected", &self.is_connected())
            .field("channels", &self.channels.len())
            .finish()
    }
}

/// Inbound half of the client: consumes transport events and routes them to
/// channels.
struct Router {
    channels: Arc<DashMap<String, ChannelHandle>>,
    ctx: Arc<ChannelContext>,
    observers: Arc<ObserverSet<dyn ClientObserver>>,
    dispatcher: EventDispatcher,
    connected: Arc<AtomicBool>,
    transport_lost: Arc<AtomicBool>,
}

impl Router {
    async fn run(self, mut events: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::MessageReceived { from, payload } => {
                    self.route_message(from, payload).await;
                }
                TransportEvent::Disconnected => {
                    self.handle_transport_lost().await;
                }
            }
        }
        // The transport dropped its sender without an explicit disconnect;
        // treat it the same way. Harmless after a local disconnect.
        self.handle_transport_lost().await;
        debug!("signaling router stopped");
    }

    async fn route_message(&self, from: String, payload: String) {
        let envelope = match SignalEnvelope::decode(&payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(sender = %from, error = %e, "dropping malformed signaling message");
                return;
            }
        };

        if let Some(handle) = self
            .channels
            .get(&from)
            .map(|entry| entry.value().clone())
        {
            handle.signal(envelope).await;
            return;
        }

        match envelope {
            SignalEnvelope::Invite => {
                debug!(sender = %from, "inbound invite; creating session channel");
                let handle = ChannelHandle::spawn(
                    from.clone(),
                    SessionMode::Peer,
                    self.ctx.clone(),
                    self.channels.clone(),
                );
                self.channels.insert(from, handle.clone());
                handle.signal(SignalEnvelope::Invite).await;
            }
            _ => {
                warn!(sender = %from, "dropping message for unknown session");
            }
        }
    }

    async fn handle_transport_lost(&self) {
        if self.transport_lost.swap(true, Ordering::SeqCst) {
            return;
        }
        self.connected.store(false, Ordering::SeqCst);
        info!("signaling transport lost; closing all sessions");

        let handles: Vec<ChannelHandle> = self
            .channels
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for handle in handles {
            handle.transport_lost().await;
        }
        emit_client_event(
            &self.observers,
            &self.dispatcher,
            ClientEvent::ServerDisconnected,
        )
        .await;
    }
}
