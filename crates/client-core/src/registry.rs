//! Stream registry: the single authority on live remote stream handles.
//!
//! A stream id maps to at most one handle system-wide. Re-announcement of a
//! known id updates the existing handle's capability snapshot in place.
//! Subscriptions pin the streams they consume; a handle is dropped from the
//! registry only after an end signal has been processed and the last pin is
//! released. One mutex guards the whole registry, and it is never held
//! across observer callbacks or signaling sends.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::stream::{RemoteStream, StreamInfo};

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<String, Arc<RemoteStream>>,
    pins: HashMap<String, usize>,
    end_pending: HashSet<String>,
}

/// Thread-safe map from stream id to remote stream handle.
#[derive(Debug, Default)]
pub struct StreamRegistry {
    inner: Mutex<Inner>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an announcement. Returns the handle and whether it is new;
    /// a re-announcement updates the existing handle instead of duplicating
    /// it.
    pub async fn register(&self, info: StreamInfo, via: &str) -> (Arc<RemoteStream>, bool) {
        let existing = {
            let inner = self.inner.lock().await;
            inner.streams.get(&info.id).cloned()
        };

        match existing {
            Some(stream) => {
                debug!(stream = %info.id, "updating re-announced stream");
                stream.update_from(info).await;
                (stream, false)
            }
            None => {
                let stream = RemoteStream::from_info(info, via);
                let mut inner = self.inner.lock().await;
                inner.end_pending.remove(stream.id());
                inner
                    .streams
                    .insert(stream.id().to_string(), stream.clone());
                debug!(stream = %stream.id(), "registered remote stream");
                (stream, true)
            }
        }
    }

    /// Look up a live stream handle.
    pub async fn get(&self, stream_id: &str) -> Option<Arc<RemoteStream>> {
        self.inner.lock().await.streams.get(stream_id).cloned()
    }

    /// Pin a stream for the lifetime of a subscription. Returns false when
    /// the id is unknown.
    pub async fn pin(&self, stream_id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.streams.contains_key(stream_id) {
            return false;
        }
        *inner.pins.entry(stream_id.to_string()).or_insert(0) += 1;
        true
    }

    /// Release one pin. Completes a deferred removal when this was the last
    /// pin on an already-ended stream.
    pub async fn unpin(&self, stream_id: &str) {
        let mut inner = self.inner.lock().await;
        let remaining = match inner.pins.get_mut(stream_id) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => return,
        };
        if remaining == 0 {
            inner.pins.remove(stream_id);
            if inner.end_pending.remove(stream_id) {
                inner.streams.remove(stream_id);
                debug!(stream = %stream_id, "removed stream after last unpin");
            }
        }
    }

    /// Process an end/removal signal for a stream. Returns the handle the
    /// first time the signal is seen, `None` on duplicates or unknown ids.
    pub async fn mark_ended(&self, stream_id: &str) -> Option<Arc<RemoteStream>> {
        let mut inner = self.inner.lock().await;
        let stream = inner.streams.get(stream_id).cloned()?;
        if !stream.mark_ended() {
            return None;
        }
        if inner.pins.get(stream_id).copied().unwrap_or(0) == 0 {
            inner.streams.remove(stream_id);
            debug!(stream = %stream_id, "removed ended stream");
        } else {
            // Subscriptions still reference the handle; defer removal.
            inner.end_pending.insert(stream_id.to_string());
        }
        Some(stream)
    }

    /// Number of live stream handles.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.streams.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.streams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AudioCodec, AudioCodecInfo, StreamCapabilities};

    fn info(id: &str, audio: Vec<AudioCodecInfo>) -> StreamInfo {
        StreamInfo {
            id: id.to_string(),
            origin: "alice".to_string(),
            source: Default::default(),
            capabilities: StreamCapabilities {
                audio,
                ..Default::default()
            },
            attributes: Default::default(),
            viewport: None,
        }
    }

    #[tokio::test]
    async fn reannouncement_updates_in_place() {
        let registry = StreamRegistry::new();

        let (first, is_new) = registry.register(info("s1", vec![]), "alice").await;
        assert!(is_new);
        let size_after_first = registry.len().await;

        let updated = info("s1", vec![AudioCodecInfo::new(AudioCodec::Opus)]);
        let (second, is_new) = registry.register(updated, "alice").await;
        assert!(!is_new);
        assert_eq!(registry.len().await, size_after_first);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.capabilities().await.audio.len(), 1);
    }

    #[tokio::test]
    async fn end_signal_removes_unpinned_stream() {
        let registry = StreamRegistry::new();
        registry.register(info("s1", vec![]), "alice").await;

        let ended = registry.mark_ended("s1").await;
        assert!(ended.is_some());
        assert!(ended.map(|s| s.is_ended()).unwrap_or(false));
        assert_eq!(registry.len().await, 0);

        // A duplicate end signal is a no-op.
        assert!(registry.mark_ended("s1").await.is_none());
    }

    #[tokio::test]
    async fn pinned_stream_survives_until_last_unpin() {
        let registry = StreamRegistry::new();
        registry.register(info("s1", vec![]), "room").await;
        assert!(registry.pin("s1").await);
        assert!(registry.pin("s1").await);

        registry.mark_ended("s1").await;
        assert_eq!(registry.len().await, 1);

        registry.unpin("s1").await;
        assert_eq!(registry.len().await, 1);

        registry.unpin("s1").await;
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn pin_unknown_stream_fails() {
        let registry = StreamRegistry::new();
        assert!(!registry.pin("nope").await);
    }
}
