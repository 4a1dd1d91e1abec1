//! Process-wide session registry with idle eviction.
//!
//! The registry is one of the two shared mutable structures in the process
//! (the other is the audio artifact cache). It maps call ids to session
//! slots and owns its own idle sweep, so session lifecycle is self-contained
//! and unit-testable by simulating clock advancement via [`SessionRegistry::evict_idle`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::core::session::CallSession;

/// One registry entry. The turn engine serializes per-call processing by
/// holding `session` across the whole turn; `last_activity` lives beside the
/// lock so the idle sweep never blocks on turn processing.
pub struct SessionSlot {
    pub session: tokio::sync::Mutex<CallSession>,
    last_activity: parking_lot::Mutex<Instant>,
}

impl SessionSlot {
    fn new(session: CallSession) -> Self {
        Self {
            session: tokio::sync::Mutex::new(session),
            last_activity: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record activity for idle-eviction purposes.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_activity.lock())
    }
}

pub type SharedSession = Arc<SessionSlot>;

/// Concurrency-safe map from call id to session state.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<DashMap<String, SharedSession>>,
    transcript_cap: usize,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(transcript_cap: usize, idle_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            transcript_cap,
            idle_timeout,
        }
    }

    /// Resolve the session for `call_id`, creating it with defaults on first
    /// reference. Two calls with the same id before eviction return the same
    /// slot, never a reset one.
    pub fn get_or_create(&self, call_id: &str, caller_id: &str) -> SharedSession {
        self.inner
            .entry(call_id.to_string())
            .or_insert_with(|| {
                tracing::info!(call_id, "creating call session");
                Arc::new(SessionSlot::new(CallSession::new(
                    call_id,
                    caller_id,
                    self.transcript_cap,
                )))
            })
            .clone()
    }

    pub fn get(&self, call_id: &str) -> Option<SharedSession> {
        self.inner.get(call_id).map(|slot| slot.clone())
    }

    /// Update `last_activity` for a live session. Unknown ids are ignored.
    pub fn touch(&self, call_id: &str) {
        if let Some(slot) = self.inner.get(call_id) {
            slot.touch();
        }
    }

    pub fn remove(&self, call_id: &str) {
        if self.inner.remove(call_id).is_some() {
            tracing::info!(call_id, "removed call session");
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Remove every session idle longer than the configured threshold,
    /// returning how many were evicted. Called by the sweeper and directly
    /// by tests.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let before = self.inner.len();
        self.inner
            .retain(|_, slot| slot.idle_for(now) < self.idle_timeout);
        let evicted = before - self.inner.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = self.inner.len(), "idle session sweep");
        }
        evicted
    }

    /// Spawn the background sweep task. The task runs for the process
    /// lifetime; the handle is returned so callers can abort it in tests.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately; skip it so a fresh process does
            // not sweep before any call arrives.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                registry.evict_idle(Instant::now());
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let registry = SessionRegistry::new(16, Duration::from_secs(1800));
        let first = registry.get_or_create("CA1", "+61");
        {
            let mut session = first.session.lock().await;
            session.record_agent_line("hello");
        }

        let second = registry.get_or_create("CA1", "+61");
        let session = second.session.lock().await;
        assert_eq!(session.turn_count, 1, "second lookup must not reset state");
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn remove_then_recreate_starts_fresh() {
        let registry = SessionRegistry::new(16, Duration::from_secs(1800));
        {
            let slot = registry.get_or_create("CA1", "");
            slot.session.lock().await.record_agent_line("hello");
        }
        registry.remove("CA1");
        assert!(registry.is_empty());

        let slot = registry.get_or_create("CA1", "");
        assert_eq!(slot.session.lock().await.turn_count, 0);
    }

    #[tokio::test]
    async fn evict_idle_respects_threshold() {
        let registry = SessionRegistry::new(16, Duration::from_secs(30));
        registry.get_or_create("CA1", "");
        registry.get_or_create("CA2", "");

        // Nothing is idle yet
        assert_eq!(registry.evict_idle(Instant::now()), 0);

        // Simulate the clock advancing past the threshold
        let later = Instant::now() + Duration::from_secs(31);
        assert_eq!(registry.evict_idle(later), 2);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn touch_resets_idle_clock() {
        let registry = SessionRegistry::new(16, Duration::from_secs(30));
        let slot = registry.get_or_create("CA1", "");

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(slot.idle_for(Instant::now()) >= Duration::from_millis(20));

        registry.touch("CA1");
        assert!(slot.idle_for(Instant::now()) < Duration::from_millis(20));
    }
}
