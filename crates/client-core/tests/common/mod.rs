//! Shared fixtures: clients on a loopback hub, recording observers, and a
//! scripted conference server.

// Not every test binary uses every fixture.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use rtclink_client_core::{
    Client, ClientConfig, ClientObserver, NullMediaEngine, PublicationObserver, RemoteStream,
    SessionState, SignalEnvelope, StreamInfo, SubscriptionObserver, TrackKind,
};
use rtclink_signaling_core::{
    LoopbackHub, LoopbackTransport, SignalingTransport, TransportEvent,
};

const WAIT_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Build and connect a client on `hub` with the null media engine.
pub async fn connected_client(hub: &LoopbackHub, id: &str) -> Arc<Client> {
    let client = Client::builder()
        .with_config(ClientConfig::new().with_name(id))
        .with_transport(hub.transport(id))
        .with_media_engine(Arc::new(NullMediaEngine))
        .build()
        .await
        .expect("client builds");
    client.connect("test-token").await.expect("client connects");
    client
}

/// Append-only log the recording observers write into.
#[derive(Default)]
pub struct EventLog {
    entries: Mutex<Vec<String>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn push(&self, entry: impl Into<String>) {
        self.entries.lock().await.push(entry.into());
    }

    pub async fn entries(&self) -> Vec<String> {
        self.entries.lock().await.clone()
    }

    pub async fn count_of(&self, needle: &str) -> usize {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|entry| entry.as_str() == needle)
            .count()
    }

    /// Wait until `needle` appears in the log.
    pub async fn wait_for(&self, needle: &str) {
        let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
        loop {
            if self
                .entries
                .lock()
                .await
                .iter()
                .any(|entry| entry.as_str() == needle)
            {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "timed out waiting for {:?}; log: {:?}",
                    needle,
                    self.entries.lock().await
                );
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// Wait until the session with `target` reaches `state`.
pub async fn wait_for_state(client: &Client, target: &str, state: SessionState) {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    loop {
        let current = client.session_state(target).await;
        if current == Some(state) {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {target} to reach {state}; current {current:?}");
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Wait until no session with `target` exists any more.
pub async fn wait_for_no_session(client: &Client, target: &str) {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    loop {
        if client.session_state(target).await.is_none() {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for session with {target} to go away");
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Let queued dispatches drain.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

/// Client observer writing tagged entries into an [`EventLog`].
pub struct Recorder {
    pub log: Arc<EventLog>,
}

impl Recorder {
    pub fn new(log: Arc<EventLog>) -> Arc<Self> {
        Arc::new(Self { log })
    }
}

#[async_trait::async_trait]
impl ClientObserver for Recorder {
    async fn on_invited(&self, remote_id: &str) {
        self.log.push(format!("invited:{remote_id}")).await;
    }

    async fn on_accepted(&self, remote_id: &str) {
        self.log.push(format!("accepted:{remote_id}")).await;
    }

    async fn on_denied(&self, remote_id: &str) {
        self.log.push(format!("denied:{remote_id}")).await;
    }

    async fn on_session_connected(&self, remote_id: &str) {
        self.log.push(format!("connected:{remote_id}")).await;
    }

    async fn on_session_ended(&self, remote_id: &str) {
        self.log.push(format!("session-ended:{remote_id}")).await;
    }

    async fn on_stream_added(&self, stream: Arc<RemoteStream>) {
        self.log.push(format!("stream-added:{}", stream.id())).await;
    }

    async fn on_stream_ended(&self, stream: Arc<RemoteStream>) {
        self.log.push(format!("stream-ended:{}", stream.id())).await;
    }

    async fn on_message(&self, sender_id: &str, message: &str) {
        self.log.push(format!("message:{sender_id}:{message}")).await;
    }

    async fn on_participant_joined(&self, participant_id: &str) {
        self.log.push(format!("joined:{participant_id}")).await;
    }

    async fn on_participant_left(&self, participant_id: &str) {
        self.log.push(format!("left:{participant_id}")).await;
    }

    async fn on_server_disconnected(&self) {
        self.log.push("server-disconnected").await;
    }
}

/// Publication/subscription observer writing prefixed entries into a log.
pub struct FlowRecorder {
    prefix: String,
    pub log: Arc<EventLog>,
}

impl FlowRecorder {
    pub fn new(prefix: &str, log: Arc<EventLog>) -> Arc<Self> {
        Arc::new(Self {
            prefix: prefix.to_string(),
            log,
        })
    }
}

#[async_trait::async_trait]
impl PublicationObserver for FlowRecorder {
    async fn on_ended(&self) {
        self.log.push(format!("{}:ended", self.prefix)).await;
    }

    async fn on_mute(&self, kind: TrackKind) {
        self.log.push(format!("{}:mute:{kind}", self.prefix)).await;
    }

    async fn on_unmute(&self, kind: TrackKind) {
        self.log
            .push(format!("{}:unmute:{kind}", self.prefix))
            .await;
    }
}

#[async_trait::async_trait]
impl SubscriptionObserver for FlowRecorder {
    async fn on_ended(&self) {
        self.log.push(format!("{}:ended", self.prefix)).await;
    }

    async fn on_mute(&self, kind: TrackKind) {
        self.log.push(format!("{}:mute:{kind}", self.prefix)).await;
    }

    async fn on_unmute(&self, kind: TrackKind) {
        self.log
            .push(format!("{}:unmute:{kind}", self.prefix))
            .await;
    }
}

/// Scripted conference server: accepts invites, acks track control, and
/// logs everything it receives as `<type>` entries.
pub struct FakeMcu {
    transport: Arc<LoopbackTransport>,
    pub log: Arc<EventLog>,
    _task: JoinHandle<()>,
}

impl FakeMcu {
    pub async fn spawn(hub: &LoopbackHub, room_id: &str) -> Self {
        let transport = hub.transport(room_id);
        let mut connection = transport.connect("mcu").await.expect("mcu connects");
        let log = EventLog::new();

        let task_transport = transport.clone();
        let task_log = log.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = connection.events.recv().await {
                let (from, payload) = match event {
                    TransportEvent::MessageReceived { from, payload } => (from, payload),
                    TransportEvent::Disconnected => break,
                };
                let envelope = match SignalEnvelope::decode(&payload) {
                    Ok(envelope) => envelope,
                    Err(_) => continue,
                };
                match envelope {
                    SignalEnvelope::Invite => {
                        task_log.push(format!("invite:{from}")).await;
                        let accept = SignalEnvelope::Accept.encode().expect("encode");
                        let _ = task_transport.send_message(&accept, Some(&from)).await;
                    }
                    SignalEnvelope::TrackControl {
                        stream_id,
                        track,
                        muted,
                    } => {
                        task_log
                            .push(format!("track-control:{stream_id}:{track}:{muted}"))
                            .await;
                        let ack = SignalEnvelope::TrackControlAck {
                            stream_id,
                            track,
                            muted,
                        }
                        .encode()
                        .expect("encode");
                        let _ = task_transport.send_message(&ack, Some(&from)).await;
                    }
                    SignalEnvelope::Publish { stream } => {
                        task_log.push(format!("publish:{}", stream.id)).await;
                    }
                    SignalEnvelope::Unpublish { stream_id } => {
                        task_log.push(format!("unpublish:{stream_id}")).await;
                    }
                    SignalEnvelope::Subscribe { stream_id, .. } => {
                        task_log.push(format!("subscribe:{stream_id}")).await;
                    }
                    SignalEnvelope::Unsubscribe { stream_id } => {
                        task_log.push(format!("unsubscribe:{stream_id}")).await;
                    }
                    SignalEnvelope::Data { message } => {
                        task_log.push(format!("data:{message}")).await;
                    }
                    SignalEnvelope::Stop => {
                        task_log.push(format!("stop:{from}")).await;
                    }
                    _ => {}
                }
            }
        });

        Self {
            transport,
            log,
            _task: task,
        }
    }

    /// Announce a stream to `to`, as the server would after another
    /// participant publishes.
    pub async fn announce_stream(&self, to: &str, info: StreamInfo) {
        let payload = SignalEnvelope::Publish { stream: info }
            .encode()
            .expect("encode");
        self.transport
            .send_message(&payload, Some(to))
            .await
            .expect("announce");
    }

    /// Signal that a stream has ended.
    pub async fn end_stream(&self, to: &str, stream_id: &str) {
        let payload = SignalEnvelope::StreamEnded {
            stream_id: stream_id.to_string(),
        }
        .encode()
        .expect("encode");
        self.transport
            .send_message(&payload, Some(to))
            .await
            .expect("end stream");
    }

    /// Notify `to` that a participant joined or left.
    pub async fn participant(&self, to: &str, participant_id: &str, joined: bool) {
        let envelope = if joined {
            SignalEnvelope::ParticipantJoined {
                participant_id: participant_id.to_string(),
            }
        } else {
            SignalEnvelope::ParticipantLeft {
                participant_id: participant_id.to_string(),
            }
        };
        let payload = envelope.encode().expect("encode");
        self.transport
            .send_message(&payload, Some(to))
            .await
            .expect("participant event");
    }
}

/// A mixed-stream announcement as a conference server would send it.
pub fn mixed_stream_info(id: &str, viewport: &str) -> StreamInfo {
    StreamInfo {
        id: id.to_string(),
        origin: String::new(),
        source: Default::default(),
        capabilities: Default::default(),
        attributes: Default::default(),
        viewport: Some(viewport.to_string()),
    }
}
