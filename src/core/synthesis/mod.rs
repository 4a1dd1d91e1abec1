//! Synthesis adapter: text-to-speech upstream.
//!
//! Single attempt, bounded timeout, no automatic retry: synthesis failures
//! are tolerated at the turn-engine level by degrading to a literal-text
//! reply, so retrying here would only add latency to a path that already
//! has a safe fallback. The adapter is stateless; the caller stores the
//! returned artifact into the cache.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::core::artifact::AudioArtifact;
use crate::errors::app_error::SynthesisError;

/// ElevenLabs text-to-speech endpoint prefix; the voice id is appended.
pub const ELEVENLABS_TTS_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";

/// A speech synthesis upstream. One call, one audio payload.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioArtifact, SynthesisError>;
}

/// Production synthesizer using the ElevenLabs TTS API.
pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    api_key: String,
    voice_id: String,
    model_id: String,
    stability: f32,
    similarity_boost: f32,
    timeout: Duration,
    base_url: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(
        api_key: impl Into<String>,
        voice_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SynthesisError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            voice_id: voice_id.into(),
            model_id: "eleven_turbo_v2".to_string(),
            stability: 0.55,
            similarity_boost: 0.8,
            timeout,
            base_url: ELEVENLABS_TTS_URL.to_string(),
        })
    }

    /// Point the synthesizer at a different endpoint. Used by tests with a
    /// mock HTTP server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url, self.voice_id)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioArtifact, SynthesisError> {
        let body = json!({
            "text": text,
            "model_id": self.model_id,
            "voice_settings": {
                "stability": self.stability,
                "similarity_boost": self.similarity_boost,
            },
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("xi-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SynthesisError::Timeout(self.timeout)
                } else {
                    SynthesisError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SynthesisError::Status(status.as_u16()));
        }

        let payload = response.bytes().await?;
        Ok(AudioArtifact::new("audio/mpeg", payload))
    }
}

/// Stand-in used when synthesis credentials are not configured. Every
/// request fails, which the turn engine already treats as "speak the text
/// via the transport's own voice".
pub struct DisabledSynthesizer;

#[async_trait]
impl SpeechSynthesizer for DisabledSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<AudioArtifact, SynthesisError> {
        Err(SynthesisError::Status(503))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_voice_id() {
        let synth =
            ElevenLabsSynthesizer::new("key", "voice123", Duration::from_secs(25)).unwrap();
        assert_eq!(
            synth.endpoint(),
            "https://api.elevenlabs.io/v1/text-to-speech/voice123"
        );
    }

    #[test]
    fn base_url_override_for_tests() {
        let synth = ElevenLabsSynthesizer::new("key", "v", Duration::from_secs(1))
            .unwrap()
            .with_base_url("http://127.0.0.1:9999/tts");
        assert_eq!(synth.endpoint(), "http://127.0.0.1:9999/tts/v");
    }
}
