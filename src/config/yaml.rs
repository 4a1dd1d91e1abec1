//! YAML configuration file loading.
//!
//! All keys are optional; anything absent keeps the value already resolved
//! from the environment or the defaults.
//!
//! ```yaml
//! server:
//!   host: 0.0.0.0
//!   port: 10000
//!   public_url: https://gateway.example.com
//! providers:
//!   openai_api_key: sk-...
//!   elevenlabs_api_key: xi-...
//!   elevenlabs_voice_id: EXAVITQu4vr4xnSDxMaL
//!   completion_model: gpt-4o-mini
//!   realtime_model: gpt-4o-realtime-preview
//!   realtime_voice: alloy
//! conversation:
//!   persona: |
//!     You are a warm voice assistant...
//!   greeting: "Hi, how can I help?"
//!   language: en-AU
//!   confidence_threshold: 0.45
//!   turn_limit: 32
//!   transcript_cap: 16
//!   humanize_intensity: 0.15
//! lifecycle:
//!   artifact_ttl_seconds: 600
//!   session_idle_seconds: 1800
//!   sweep_interval_seconds: 300
//! security:
//!   auth_token: shared-secret
//!   cors_allowed_origins: "*"
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::ServerConfig;
use crate::errors::app_error::{AppError, AppResult};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlConfig {
    #[serde(default)]
    pub server: YamlServer,
    #[serde(default)]
    pub providers: YamlProviders,
    #[serde(default)]
    pub conversation: YamlConversation,
    #[serde(default)]
    pub lifecycle: YamlLifecycle,
    #[serde(default)]
    pub security: YamlSecurity,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlServer {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlProviders {
    pub openai_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_voice_id: Option<String>,
    pub completion_model: Option<String>,
    pub completion_max_tokens: Option<u32>,
    pub completion_timeout_seconds: Option<u64>,
    pub synthesis_timeout_seconds: Option<u64>,
    pub realtime_url: Option<String>,
    pub realtime_model: Option<String>,
    pub realtime_voice: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlConversation {
    pub persona: Option<String>,
    pub greeting: Option<String>,
    pub closing: Option<String>,
    pub fallback: Option<String>,
    pub language: Option<String>,
    pub confidence_threshold: Option<f32>,
    pub turn_limit: Option<u32>,
    pub transcript_cap: Option<usize>,
    pub humanize_intensity: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlLifecycle {
    pub artifact_ttl_seconds: Option<u64>,
    pub session_idle_seconds: Option<u64>,
    pub sweep_interval_seconds: Option<u64>,
    pub keepalive_interval_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlSecurity {
    pub auth_token: Option<String>,
    pub cors_allowed_origins: Option<String>,
}

impl YamlConfig {
    /// Parse the file at `path`.
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        serde_yaml::from_str(&raw).map_err(|e| {
            AppError::Config(format!("cannot parse config file {}: {e}", path.display()))
        })
    }

    /// Overlay every key the file sets onto `config`.
    pub fn apply(self, config: &mut ServerConfig) {
        macro_rules! set {
            ($src:expr, $dst:expr) => {
                if let Some(v) = $src {
                    $dst = v;
                }
            };
        }
        macro_rules! set_opt {
            ($src:expr, $dst:expr) => {
                if let Some(v) = $src {
                    $dst = Some(v);
                }
            };
        }

        set!(self.server.host, config.host);
        set!(self.server.port, config.port);
        set_opt!(self.server.public_url, config.public_url);

        set_opt!(self.providers.openai_api_key, config.openai_api_key);
        set_opt!(self.providers.elevenlabs_api_key, config.elevenlabs_api_key);
        set_opt!(
            self.providers.elevenlabs_voice_id,
            config.elevenlabs_voice_id
        );
        set!(self.providers.completion_model, config.completion_model);
        set!(
            self.providers.completion_max_tokens,
            config.completion_max_tokens
        );
        set!(
            self.providers.completion_timeout_seconds,
            config.completion_timeout_secs
        );
        set!(
            self.providers.synthesis_timeout_seconds,
            config.synthesis_timeout_secs
        );
        set!(self.providers.realtime_url, config.realtime_url);
        set!(self.providers.realtime_model, config.realtime_model);
        set!(self.providers.realtime_voice, config.realtime_voice);

        set!(self.conversation.persona, config.persona_instructions);
        set!(self.conversation.greeting, config.greeting_line);
        set!(self.conversation.closing, config.closing_line);
        set!(self.conversation.fallback, config.fallback_line);
        set!(self.conversation.language, config.speech_language);
        set!(
            self.conversation.confidence_threshold,
            config.confidence_threshold
        );
        set!(self.conversation.turn_limit, config.turn_limit);
        set!(self.conversation.transcript_cap, config.transcript_cap);
        set!(
            self.conversation.humanize_intensity,
            config.humanize_intensity
        );

        set!(
            self.lifecycle.artifact_ttl_seconds,
            config.artifact_ttl_secs
        );
        set!(
            self.lifecycle.session_idle_seconds,
            config.session_idle_secs
        );
        set!(
            self.lifecycle.sweep_interval_seconds,
            config.sweep_interval_secs
        );
        set!(
            self.lifecycle.keepalive_interval_seconds,
            config.keepalive_interval_secs
        );

        set_opt!(self.security.auth_token, config.auth_token);
        set_opt!(
            self.security.cors_allowed_origins,
            config.cors_allowed_origins
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_changes_nothing() {
        let yaml: YamlConfig = serde_yaml::from_str("{}").unwrap();
        let mut config = ServerConfig::default();
        let before = config.clone();
        yaml.apply(&mut config);
        assert_eq!(config.port, before.port);
        assert_eq!(config.persona_instructions, before.persona_instructions);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<YamlConfig, _> = serde_yaml::from_str("serverr:\n  port: 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn nested_sections_apply() {
        let yaml: YamlConfig = serde_yaml::from_str(
            "providers:\n  realtime_voice: verse\nsecurity:\n  auth_token: abc\n",
        )
        .unwrap();
        let mut config = ServerConfig::default();
        yaml.apply(&mut config);
        assert_eq!(config.realtime_voice, "verse");
        assert_eq!(config.auth_token.as_deref(), Some("abc"));
    }
}
