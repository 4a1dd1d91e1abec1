//! Ephemeral store for synthesized audio payloads.
//!
//! Artifacts are written once at synthesis time and read back by the
//! telephony transport via the audio retrieval endpoint. Expiry is fixed at
//! creation; after the TTL elapses the id is invalid and retrieval returns
//! nothing.

use std::time::Duration;

use bytes::Bytes;
use moka::future::Cache;
use uuid::Uuid;

/// A synthesized audio payload held transiently for playback.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    /// Opaque unique token generated at synthesis time.
    pub id: Uuid,
    /// Declared content type of `payload`, e.g. `audio/mpeg`.
    pub content_type: String,
    /// Opaque audio bytes.
    pub payload: Bytes,
}

impl AudioArtifact {
    pub fn new(content_type: impl Into<String>, payload: Bytes) -> Self {
        Self {
            id: Uuid::new_v4(),
            content_type: content_type.into(),
            payload,
        }
    }
}

/// Concurrency-safe artifact cache with a per-entry TTL enforced by `moka`.
#[derive(Clone)]
pub struct AudioArtifactCache {
    inner: Cache<Uuid, AudioArtifact>,
    ttl: Duration,
}

impl AudioArtifactCache {
    /// `ttl` is fixed for every artifact at insertion; `max_entries` bounds
    /// memory across long-lived processes.
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        let inner = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(max_entries)
            .build();
        Self { inner, ttl }
    }

    pub async fn insert(&self, artifact: AudioArtifact) -> Uuid {
        let id = artifact.id;
        self.inner.insert(id, artifact).await;
        id
    }

    /// Retrieve an artifact by id. Returns `None` once expired or if the id
    /// never existed.
    pub async fn get(&self, id: &Uuid) -> Option<AudioArtifact> {
        self.inner.get(id).await
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip_is_byte_identical() {
        let cache = AudioArtifactCache::new(Duration::from_secs(600), 128);
        let payload = Bytes::from_static(&[0x49, 0x44, 0x33, 0x04, 0x00]);
        let artifact = AudioArtifact::new("audio/mpeg", payload.clone());
        let id = cache.insert(artifact).await;

        let fetched = cache.get(&id).await.expect("artifact should be live");
        assert_eq!(fetched.payload, payload);
        assert_eq!(fetched.content_type, "audio/mpeg");
    }

    #[tokio::test]
    async fn expired_artifact_is_gone() {
        let cache = AudioArtifactCache::new(Duration::from_millis(50), 128);
        let id = cache
            .insert(AudioArtifact::new("audio/mpeg", Bytes::from_static(b"x")))
            .await;

        assert!(cache.get(&id).await.is_some());
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let cache = AudioArtifactCache::new(Duration::from_secs(600), 128);
        assert!(cache.get(&Uuid::new_v4()).await.is_none());
    }
}
