//! Two clients on one loopback hub: invite, accept, publish, chat, stop.
//!
//! Run with: cargo run --example p2p_loopback

use std::sync::Arc;

use tokio::sync::mpsc;

use rtclink_client_core::{
    Client, ClientConfig, ClientObserver, LocalStream, NullMediaEngine, RemoteStream,
    StreamSourceInfo,
};
use rtclink_signaling_core::LoopbackHub;

struct Printer {
    who: &'static str,
    invites: mpsc::UnboundedSender<String>,
}

#[async_trait::async_trait]
impl ClientObserver for Printer {
    async fn on_invited(&self, remote_id: &str) {
        println!("[{}] invited by {}", self.who, remote_id);
        let _ = self.invites.send(remote_id.to_string());
    }

    async fn on_session_connected(&self, remote_id: &str) {
        println!("[{}] session with {} connected", self.who, remote_id);
    }

    async fn on_stream_added(&self, stream: Arc<RemoteStream>) {
        println!("[{}] remote stream {} added", self.who, stream.id());
    }

    async fn on_message(&self, sender_id: &str, message: &str) {
        println!("[{}] {} says: {}", self.who, sender_id, message);
    }

    async fn on_session_ended(&self, remote_id: &str) {
        println!("[{}] session with {} ended", self.who, remote_id);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("rtclink_client_core=info")
        .init();

    let hub = LoopbackHub::new();
    let (invites_tx, mut invites_rx) = mpsc::unbounded_channel();

    let alice = Client::builder()
        .with_config(ClientConfig::new().with_name("alice"))
        .with_transport(hub.transport("alice"))
        .with_media_engine(Arc::new(NullMediaEngine))
        .build()
        .await?;
    let bob = Client::builder()
        .with_config(ClientConfig::new().with_name("bob"))
        .with_transport(hub.transport("bob"))
        .with_media_engine(Arc::new(NullMediaEngine))
        .build()
        .await?;

    alice
        .add_observer(Arc::new(Printer {
            who: "alice",
            invites: invites_tx.clone(),
        }))
        .await;
    bob.add_observer(Arc::new(Printer {
        who: "bob",
        invites: invites_tx,
    }))
    .await;

    alice.connect("demo-token").await?;
    bob.connect("demo-token").await?;

    // Alice invites; Bob accepts once the invitation arrives.
    let inviter = alice.clone();
    let invite_task = tokio::spawn(async move { inviter.invite("bob").await });
    let from = invites_rx.recv().await.ok_or("no invitation arrived")?;
    bob.accept(&from).await?;
    invite_task.await??;

    // Alice shares a camera stream and says hello.
    let stream = LocalStream::new(StreamSourceInfo::microphone_and_camera());
    let publication = alice.publish(&stream, "bob", None).await?;
    alice.send("hello bob", Some("bob")).await?;

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    publication.stop().await?;
    alice.stop("bob").await?;
    alice.disconnect().await?;
    bob.disconnect().await?;
    Ok(())
}
