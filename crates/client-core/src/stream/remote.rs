use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{StreamInfo, StreamSourceInfo};
use crate::types::StreamCapabilities;

/// What a remote stream represents on the server side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStreamKind {
    /// A single participant's stream forwarded as-is
    Forward,
    /// A server-composed stream aggregating multiple participants,
    /// identified by its viewport label
    Mixed { viewport: String },
}

/// Stream announced by a remote peer or by the conference server.
///
/// Identity fields are fixed for the stream's lifetime; the capability
/// snapshot and attributes are updated in place when the same stream id is
/// re-announced.
#[derive(Debug)]
pub struct RemoteStream {
    id: String,
    origin: String,
    kind: RemoteStreamKind,
    source: StreamSourceInfo,
    /// Channel target through which the stream was announced
    via: String,
    capabilities: RwLock<StreamCapabilities>,
    attributes: RwLock<HashMap<String, String>>,
    ended: AtomicBool,
}

impl RemoteStream {
    pub(crate) fn from_info(info: StreamInfo, via: &str) -> Arc<Self> {
        let kind = match info.viewport {
            Some(viewport) => RemoteStreamKind::Mixed { viewport },
            None => RemoteStreamKind::Forward,
        };
        Arc::new(Self {
            id: info.id,
            origin: info.origin,
            kind,
            source: info.source,
            via: via.to_string(),
            capabilities: RwLock::new(info.capabilities),
            attributes: RwLock::new(info.attributes),
            ended: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Publishing endpoint id; empty for server-synthesized streams.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn kind(&self) -> &RemoteStreamKind {
        &self.kind
    }

    pub fn source(&self) -> &StreamSourceInfo {
        &self.source
    }

    pub fn is_mixed(&self) -> bool {
        matches!(self.kind, RemoteStreamKind::Mixed { .. })
    }

    /// Viewport label when this is a mixed stream.
    pub fn viewport(&self) -> Option<&str> {
        match &self.kind {
            RemoteStreamKind::Mixed { viewport } => Some(viewport),
            RemoteStreamKind::Forward => None,
        }
    }

    /// Current capability snapshot.
    pub async fn capabilities(&self) -> StreamCapabilities {
        self.capabilities.read().await.clone()
    }

    /// Current application-defined attributes.
    pub async fn attributes(&self) -> HashMap<String, String> {
        self.attributes.read().await.clone()
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    /// Channel target that announced this stream.
    pub(crate) fn via(&self) -> &str {
        &self.via
    }

    /// Returns true on the first call only.
    pub(crate) fn mark_ended(&self) -> bool {
        !self.ended.swap(true, Ordering::SeqCst)
    }

    /// Apply a re-announcement of the same stream id.
    pub(crate) async fn update_from(&self, info: StreamInfo) {
        *self.capabilities.write().await = info.capabilities;
        *self.attributes.write().await = info.attributes;
    }
}
