//! Media engine collaborator interface.
//!
//! The control plane never touches ICE, DTLS, RTP, or codecs itself; it
//! drives an external engine through these traits during session setup and
//! forwards SDP/ICE payloads between the engine and the signaling channel
//! without interpreting them.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::errors::{ClientError, Result};
use crate::types::ConnectionStats;

/// Factory for per-session media state, implemented by the native engine
/// binding.
#[async_trait::async_trait]
pub trait MediaEngine: Send + Sync + fmt::Debug {
    /// Open the engine-side state for a session with `peer_id`.
    async fn open_session(
        &self,
        peer_id: &str,
        hardware_acceleration: bool,
    ) -> Result<Arc<dyn MediaSession>>;
}

/// One session's slice of the media engine.
#[async_trait::async_trait]
pub trait MediaSession: Send + Sync + fmt::Debug {
    /// Produce a local offer description.
    async fn create_offer(&self) -> Result<String>;

    /// Apply a remote offer and produce the matching answer.
    async fn create_answer(&self, remote_description: &str) -> Result<String>;

    /// Apply a remote answer description.
    async fn set_remote_description(&self, description: &str) -> Result<()>;

    /// Feed a remote ICE candidate to the engine.
    async fn add_ice_candidate(&self, candidate: &str) -> Result<()>;

    /// Snapshot of the session's connection statistics.
    async fn stats(&self) -> Result<ConnectionStats>;

    /// Release all engine-side resources for this session.
    async fn close(&self) -> Result<()>;
}

/// Media engine that negotiates placeholder descriptions and reports empty
/// statistics.
///
/// Used by the integration tests and by embedders that wire up the control
/// plane before a real engine binding is available.
#[derive(Debug, Default)]
pub struct NullMediaEngine;

#[async_trait::async_trait]
impl MediaEngine for NullMediaEngine {
    async fn open_session(
        &self,
        peer_id: &str,
        _hardware_acceleration: bool,
    ) -> Result<Arc<dyn MediaSession>> {
        Ok(Arc::new(NullMediaSession {
            peer_id: peer_id.to_string(),
            remote_description: Mutex::new(None),
            closed: AtomicBool::new(false),
        }))
    }
}

#[derive(Debug)]
struct NullMediaSession {
    peer_id: String,
    remote_description: Mutex<Option<String>>,
    closed: AtomicBool,
}

impl NullMediaSession {
    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Media(format!(
                "media session with {} is closed",
                self.peer_id
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MediaSession for NullMediaSession {
    async fn create_offer(&self) -> Result<String> {
        self.check_open()?;
        Ok(format!("v=0\r\ns=null-offer {}\r\n", self.peer_id))
    }

    async fn create_answer(&self, remote_description: &str) -> Result<String> {
        self.check_open()?;
        *self.remote_description.lock().await = Some(remote_description.to_string());
        Ok(format!("v=0\r\ns=null-answer {}\r\n", self.peer_id))
    }

    async fn set_remote_description(&self, description: &str) -> Result<()> {
        self.check_open()?;
        *self.remote_description.lock().await = Some(description.to_string());
        Ok(())
    }

    async fn add_ice_candidate(&self, _candidate: &str) -> Result<()> {
        self.check_open()
    }

    async fn stats(&self) -> Result<ConnectionStats> {
        self.check_open()?;
        Ok(ConnectionStats::default())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_engine_round_trips_descriptions() {
        let engine = NullMediaEngine;
        let session = engine.open_session("bob", false).await.unwrap();

        let offer = session.create_offer().await.unwrap();
        assert!(offer.contains("null-offer"));

        let answer = session.create_answer(&offer).await.unwrap();
        assert!(answer.contains("null-answer"));
        assert!(session.stats().await.is_ok());
    }

    #[tokio::test]
    async fn closed_session_rejects_operations() {
        let engine = NullMediaEngine;
        let session = engine.open_session("bob", false).await.unwrap();
        session.close().await.unwrap();

        assert!(session.create_offer().await.is_err());
        assert!(session.stats().await.is_err());
    }
}
