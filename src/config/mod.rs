//! Configuration module for the Parlance Gateway server.
//!
//! Configuration is assembled from three sources with the priority
//! YAML > environment variables > defaults. A `.env` file, when present,
//! is loaded into the environment before `from_env` runs (see `main`).
//!
//! # Example
//! ```rust,no_run
//! use parlance_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable fallback
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::env;
use std::path::Path;
use std::time::Duration;

mod yaml;

pub use yaml::YamlConfig;

use crate::errors::app_error::{AppError, AppResult};

/// Default system instructions for the agent persona. Overridable via
/// `PERSONA_INSTRUCTIONS` or the `conversation.persona` YAML key; the content
/// is opaque to the orchestrator.
pub const DEFAULT_PERSONA: &str = "\
You are a warm, natural-sounding voice assistant on a phone call.\n\
Keep each utterance short and spoken (one sentence, roughly 6-12 words).\n\
Ask at most one concise follow-up question when useful.\n\
No lists, no brackets, no stage directions.\n\
Return only the line you would say aloud.";

/// Fixed spoken-safe line used when the completion provider is exhausted.
pub const DEFAULT_FALLBACK_LINE: &str =
    "Sorry, I lost my train of thought for a second. Could you say that again?";

pub const DEFAULT_GREETING_LINE: &str = "Hi, you're through to the assistant. How can I help?";

pub const DEFAULT_CLOSING_LINE: &str = "Thanks for calling. Bye for now!";

/// Server configuration.
///
/// Contains everything needed to run the gateway:
/// - server settings (host, port, public URL for audio links)
/// - provider credentials (completion, synthesis, realtime)
/// - conversation policy knobs (confidence threshold, turn ceiling,
///   transcript cap, spoken lines)
/// - lifecycle settings (artifact TTL, idle eviction, keepalive)
/// - security settings (shared auth token, CORS)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used to build `<Play>` links for
    /// synthesized audio. Falls back to the request `Host` header when unset.
    pub public_url: Option<String>,

    // Provider credentials
    pub openai_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_voice_id: Option<String>,

    // Completion adapter
    pub completion_model: String,
    pub completion_max_tokens: u32,
    pub completion_timeout_secs: u64,
    pub completion_max_attempts: u32,
    pub completion_backoff_ms: u64,

    // Synthesis adapter
    pub synthesis_timeout_secs: u64,

    // Streaming relay
    /// Realtime provider endpoint; overridable so tests can point the relay
    /// at a local WebSocket server.
    pub realtime_url: String,
    pub realtime_model: String,
    pub realtime_voice: String,
    pub keepalive_interval_secs: u64,

    // Conversation policy
    pub persona_instructions: String,
    pub greeting_line: String,
    pub closing_line: String,
    pub fallback_line: String,
    pub speech_language: String,
    pub confidence_threshold: f32,
    pub turn_limit: u32,
    pub transcript_cap: usize,
    /// Probability that the humanizer prefixes a filler word onto a reply.
    /// Zero disables text shaping entirely.
    pub humanize_intensity: f32,

    // Lifecycle
    pub artifact_ttl_secs: u64,
    pub session_idle_secs: u64,
    pub sweep_interval_secs: u64,

    // Security
    pub auth_token: Option<String>,
    pub cors_allowed_origins: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10000,
            public_url: None,
            openai_api_key: None,
            elevenlabs_api_key: None,
            elevenlabs_voice_id: None,
            completion_model: "gpt-4o-mini".to_string(),
            completion_max_tokens: 120,
            completion_timeout_secs: 10,
            completion_max_attempts: 3,
            completion_backoff_ms: 400,
            synthesis_timeout_secs: 25,
            realtime_url: crate::core::relay::OPENAI_REALTIME_URL.to_string(),
            realtime_model: "gpt-4o-realtime-preview".to_string(),
            realtime_voice: "alloy".to_string(),
            keepalive_interval_secs: 15,
            persona_instructions: DEFAULT_PERSONA.to_string(),
            greeting_line: DEFAULT_GREETING_LINE.to_string(),
            closing_line: DEFAULT_CLOSING_LINE.to_string(),
            fallback_line: DEFAULT_FALLBACK_LINE.to_string(),
            speech_language: "en-AU".to_string(),
            confidence_threshold: 0.45,
            turn_limit: 32,
            transcript_cap: 16,
            humanize_intensity: 0.0,
            artifact_ttl_secs: 600,
            session_idle_secs: 1800,
            sweep_interval_secs: 300,
            auth_token: None,
            cors_allowed_origins: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables over the defaults.
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }
        if let Some(port) = parse_env("PORT")? {
            config.port = port;
        }
        config.public_url = env_opt("PUBLIC_URL");
        config.openai_api_key = env_opt("OPENAI_API_KEY");
        config.elevenlabs_api_key = env_opt("ELEVENLABS_API_KEY");
        config.elevenlabs_voice_id = env_opt("ELEVENLABS_VOICE_ID");

        if let Ok(model) = env::var("COMPLETION_MODEL") {
            config.completion_model = model;
        }
        if let Some(v) = parse_env("COMPLETION_MAX_TOKENS")? {
            config.completion_max_tokens = v;
        }
        if let Some(v) = parse_env("COMPLETION_TIMEOUT_SECONDS")? {
            config.completion_timeout_secs = v;
        }
        if let Some(v) = parse_env("COMPLETION_MAX_ATTEMPTS")? {
            config.completion_max_attempts = v;
        }
        if let Some(v) = parse_env("COMPLETION_BACKOFF_MS")? {
            config.completion_backoff_ms = v;
        }
        if let Some(v) = parse_env("SYNTHESIS_TIMEOUT_SECONDS")? {
            config.synthesis_timeout_secs = v;
        }
        if let Some(v) = parse_env("KEEPALIVE_INTERVAL_SECONDS")? {
            config.keepalive_interval_secs = v;
        }
        if let Ok(url) = env::var("REALTIME_URL") {
            config.realtime_url = url;
        }
        if let Ok(model) = env::var("REALTIME_MODEL") {
            config.realtime_model = model;
        }
        if let Ok(voice) = env::var("REALTIME_VOICE") {
            config.realtime_voice = voice;
        }

        if let Ok(persona) = env::var("PERSONA_INSTRUCTIONS") {
            config.persona_instructions = persona;
        }
        if let Ok(line) = env::var("GREETING_LINE") {
            config.greeting_line = line;
        }
        if let Ok(line) = env::var("CLOSING_LINE") {
            config.closing_line = line;
        }
        if let Ok(line) = env::var("FALLBACK_LINE") {
            config.fallback_line = line;
        }
        if let Ok(lang) = env::var("SPEECH_LANGUAGE") {
            config.speech_language = lang;
        }
        if let Some(v) = parse_env("CONFIDENCE_THRESHOLD")? {
            config.confidence_threshold = v;
        }
        if let Some(v) = parse_env("TURN_LIMIT")? {
            config.turn_limit = v;
        }
        if let Some(v) = parse_env("TRANSCRIPT_CAP")? {
            config.transcript_cap = v;
        }
        if let Some(v) = parse_env("HUMANIZE_INTENSITY")? {
            config.humanize_intensity = v;
        }
        if let Some(v) = parse_env("ARTIFACT_TTL_SECONDS")? {
            config.artifact_ttl_secs = v;
        }
        if let Some(v) = parse_env("SESSION_IDLE_SECONDS")? {
            config.session_idle_secs = v;
        }
        if let Some(v) = parse_env("SWEEP_INTERVAL_SECONDS")? {
            config.sweep_interval_secs = v;
        }

        config.auth_token = env_opt("AUTH_TOKEN");
        config.cors_allowed_origins = env_opt("CORS_ALLOWED_ORIGINS");

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, with environment variables as
    /// fallback for anything the file does not set.
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let mut config = Self::from_env()?;
        let yaml = YamlConfig::load(path)?;
        yaml.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// `host:port` string suitable for a socket bind.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn artifact_ttl(&self) -> Duration {
        Duration::from_secs(self.artifact_ttl_secs)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }

    /// Validate cross-field constraints. Missing provider credentials are a
    /// warning, not an error: the adapters degrade to their fallback paths
    /// and tests inject mock backends.
    pub fn validate(&self) -> AppResult<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AppError::Config(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.humanize_intensity) {
            return Err(AppError::Config(format!(
                "humanize_intensity must be within [0, 1], got {}",
                self.humanize_intensity
            )));
        }
        if self.turn_limit == 0 {
            return Err(AppError::Config("turn_limit must be at least 1".into()));
        }
        if self.transcript_cap == 0 {
            return Err(AppError::Config("transcript_cap must be at least 1".into()));
        }
        if self.completion_max_attempts == 0 {
            return Err(AppError::Config(
                "completion_max_attempts must be at least 1".into(),
            ));
        }

        if self.openai_api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY not set; completion and realtime upstreams disabled");
        }
        if self.elevenlabs_api_key.is_none() || self.elevenlabs_voice_id.is_none() {
            tracing::warn!(
                "ELEVENLABS_API_KEY / ELEVENLABS_VOICE_ID not set; synthesis degrades to text replies"
            );
        }

        Ok(())
    }
}

/// Zeroize all secret fields when the config is dropped so credentials do
/// not linger in freed memory.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.elevenlabs_api_key {
            key.zeroize();
        }
        if let Some(ref mut token) = self.auth_token {
            token.zeroize();
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> AppResult<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AppError::Config(format!("invalid {key}: {e}"))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.confidence_threshold, 0.45);
        assert_eq!(config.turn_limit, 32);
        assert_eq!(config.transcript_cap, 16);
        assert_eq!(config.artifact_ttl_secs, 600);
        assert_eq!(config.address(), "0.0.0.0:10000");
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut config = ServerConfig::default();
        config.confidence_threshold = 1.5;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn rejects_zero_turn_limit() {
        let mut config = ServerConfig::default();
        config.turn_limit = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn yaml_overrides_defaults() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "server:\n  port: 8080\nconversation:\n  turn_limit: 12\n  greeting: \"G'day!\"\n"
        )
        .unwrap();

        let mut config = ServerConfig::default();
        let yaml = YamlConfig::load(file.path()).unwrap();
        yaml.apply(&mut config);

        assert_eq!(config.port, 8080);
        assert_eq!(config.turn_limit, 12);
        assert_eq!(config.greeting_line, "G'day!");
        // Untouched keys keep their defaults
        assert_eq!(config.transcript_cap, 16);
    }
}
