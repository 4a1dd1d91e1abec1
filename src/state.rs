//! Shared application state wired once at startup.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::config::ServerConfig;
use crate::core::artifact::AudioArtifactCache;
use crate::core::completion::{CompletionAdapter, CompletionBackend, OpenAiCompletion};
use crate::core::registry::SessionRegistry;
use crate::core::synthesis::{DisabledSynthesizer, ElevenLabsSynthesizer, SpeechSynthesizer};
use crate::core::turn::{ReplyShaper, TurnEngine, TurnPolicy};
use crate::errors::app_error::{AppError, AppResult};
use crate::utils::humanize::{humanize, Mood};

/// Upper bound on concurrently cached audio artifacts.
const ARTIFACT_CACHE_CAPACITY: u64 = 256;

/// Everything handlers need, shared behind an `Arc` in the router.
pub struct AppState {
    pub config: ServerConfig,
    pub sessions: SessionRegistry,
    pub artifacts: AudioArtifactCache,
    pub turns: TurnEngine,
}

impl AppState {
    /// Wire production backends from config and start the idle sweeper.
    pub fn new(config: ServerConfig) -> AppResult<Arc<Self>> {
        let completion_backend: Arc<dyn CompletionBackend> = Arc::new(
            OpenAiCompletion::new(
                config.openai_api_key.clone().unwrap_or_default(),
                config.completion_model.clone(),
                config.completion_max_tokens,
                config.completion_timeout(),
            )
            .map_err(|e| AppError::Config(format!("completion client: {e}")))?,
        );

        let synthesizer: Arc<dyn SpeechSynthesizer> = match (
            config.elevenlabs_api_key.clone(),
            config.elevenlabs_voice_id.clone(),
        ) {
            (Some(key), Some(voice)) => Arc::new(
                ElevenLabsSynthesizer::new(key, voice, config.synthesis_timeout())
                    .map_err(|e| AppError::Config(format!("synthesis client: {e}")))?,
            ),
            _ => Arc::new(DisabledSynthesizer),
        };

        let state = Self::with_backends(config, completion_backend, synthesizer);
        let _sweeper = state.sessions.spawn_sweeper(state.config.sweep_interval());
        Ok(state)
    }

    /// Assemble state around explicit backends. Tests use this to inject
    /// scripted completion and synthesis implementations.
    pub fn with_backends(
        config: ServerConfig,
        completion_backend: Arc<dyn CompletionBackend>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Arc<Self> {
        let sessions = SessionRegistry::new(config.transcript_cap, config.session_idle_timeout());
        let artifacts = AudioArtifactCache::new(config.artifact_ttl(), ARTIFACT_CACHE_CAPACITY);

        let completion = CompletionAdapter::new(
            completion_backend,
            config.completion_max_attempts,
            Duration::from_millis(config.completion_backoff_ms),
            config.fallback_line.clone(),
        );

        let shaper = reply_shaper(config.humanize_intensity);
        let policy = TurnPolicy::from_config(&config);

        let turns = TurnEngine::new(
            sessions.clone(),
            artifacts.clone(),
            completion,
            synthesizer,
            shaper,
            policy,
        );

        Arc::new(Self {
            config,
            sessions,
            artifacts,
            turns,
        })
    }
}

fn reply_shaper(intensity: f32) -> Option<ReplyShaper> {
    if intensity <= 0.0 {
        return None;
    }
    Some(Arc::new(move |text: &str| {
        let mut rng = rand::thread_rng();
        let mood = match rng.gen_range(0..3) {
            0 => Mood::Neutral,
            1 => Mood::Warm,
            _ => Mood::Upbeat,
        };
        humanize(text, mood, intensity, &mut rng)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shaper_disabled_at_zero_intensity() {
        assert!(reply_shaper(0.0).is_none());
        assert!(reply_shaper(0.4).is_some());
    }
}
