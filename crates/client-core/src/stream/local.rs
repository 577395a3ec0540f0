use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use super::{StreamInfo, StreamSourceInfo};
use crate::types::StreamCapabilities;

/// Locally produced media stream.
///
/// The stream itself only describes the capture sources; the actual frames
/// live inside the media engine. One `LocalStream` may be published to any
/// number of targets, so it is handed around as `Arc<LocalStream>`.
#[derive(Debug)]
pub struct LocalStream {
    id: String,
    source: StreamSourceInfo,
    attributes: HashMap<String, String>,
    ended: AtomicBool,
}

impl LocalStream {
    /// Create a stream fed by `source`.
    pub fn new(source: StreamSourceInfo) -> Arc<Self> {
        Self::with_attributes(source, HashMap::new())
    }

    /// Create a stream with application-defined attributes attached.
    pub fn with_attributes(
        source: StreamSourceInfo,
        attributes: HashMap<String, String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: format!("stream-{}", Uuid::new_v4()),
            source,
            attributes,
            ended: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &StreamSourceInfo {
        &self.source
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    pub fn has_audio(&self) -> bool {
        self.source.audio.is_some()
    }

    pub fn has_video(&self) -> bool {
        self.source.video.is_some()
    }

    /// Stop producing media. Existing publications keep their handles but
    /// new publish calls with this stream fail.
    pub fn close(&self) {
        self.ended.store(true, Ordering::SeqCst);
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    /// Build the wire description announced when this stream is published.
    pub(crate) fn to_info(&self, origin: &str, capabilities: StreamCapabilities) -> StreamInfo {
        StreamInfo {
            id: self.id.clone(),
            origin: origin.to_string(),
            source: self.source,
            capabilities,
            attributes: self.attributes.clone(),
            viewport: None,
        }
    }
}
