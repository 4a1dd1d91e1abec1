//! Turn-taking state machine.
//!
//! One engine instance serves every call; per-call state lives in the
//! session registry. A turn is strictly sequential for a given call id: the
//! engine holds the session lock for the whole listen→think→speak cycle, so
//! no two completions or syntheses are ever in flight for the same call.
//!
//! Phases: `NEW → GREETING → LISTENING → THINKING → SPEAKING → LISTENING
//! (loop) → ENDING → CLOSED`. The engine's output is transport-neutral; the
//! webhook handler renders it as telephony markup and the streaming relay
//! implements the same contract natively on the provider side.

mod phrases;

pub use phrases::{is_terminal_intent, reprompt_line};

use std::sync::Arc;

use uuid::Uuid;

use crate::config::ServerConfig;
use crate::core::artifact::AudioArtifactCache;
use crate::core::completion::CompletionAdapter;
use crate::core::registry::SessionRegistry;
use crate::core::session::{CallSession, Speaker, TurnPhase};
use crate::core::synthesis::SpeechSynthesizer;

/// Recognized caller speech for one webhook turn, as reported by the
/// telephony provider.
#[derive(Debug, Clone, Default)]
pub struct SpeechInput {
    pub text: Option<String>,
    pub confidence: Option<f32>,
}

impl SpeechInput {
    pub fn new(text: Option<String>, confidence: Option<f32>) -> Self {
        Self { text, confidence }
    }
}

/// What the transport should present for this turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The line the agent speaks. Always present, even when synthesis
    /// failed; the transport then speaks it with its own basic TTS.
    pub text: String,
    /// Cached synthesized audio for `text`, when synthesis succeeded.
    pub audio: Option<Uuid>,
    /// True when the call ends after this utterance: the transport must
    /// play the line and terminate instead of re-arming listening.
    pub terminal: bool,
}

/// Optional pure post-processing applied to completion replies before they
/// are spoken (filler injection and similar cosmetics). Lives outside the
/// state machine so the machine itself stays deterministic.
pub type ReplyShaper = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Policy knobs for the state machine, extracted from [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct TurnPolicy {
    pub persona: String,
    pub greeting_line: String,
    pub closing_line: String,
    pub confidence_threshold: f32,
    pub turn_limit: u32,
}

impl TurnPolicy {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            persona: config.persona_instructions.clone(),
            greeting_line: config.greeting_line.clone(),
            closing_line: config.closing_line.clone(),
            confidence_threshold: config.confidence_threshold,
            turn_limit: config.turn_limit,
        }
    }
}

/// Drives the listen→think→speak cycle for every call.
#[derive(Clone)]
pub struct TurnEngine {
    registry: SessionRegistry,
    artifacts: AudioArtifactCache,
    completion: CompletionAdapter,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    shaper: Option<ReplyShaper>,
    policy: TurnPolicy,
}

impl TurnEngine {
    pub fn new(
        registry: SessionRegistry,
        artifacts: AudioArtifactCache,
        completion: CompletionAdapter,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        shaper: Option<ReplyShaper>,
        policy: TurnPolicy,
    ) -> Self {
        Self {
            registry,
            artifacts,
            completion,
            synthesizer,
            shaper,
            policy,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Run one full turn for `call_id`. Infallible by design: every failure
    /// path resolves to a speakable outcome.
    pub async fn process(&self, call_id: &str, caller_id: &str, input: SpeechInput) -> TurnOutcome {
        let slot = self.registry.get_or_create(call_id, caller_id);
        slot.touch();

        // Single writer: the lock is held for the entire turn.
        let mut session = slot.session.lock().await;

        if !session.greeted {
            return self.greet(&mut *session).await;
        }

        session.phase = TurnPhase::Listening;

        let text = input.text.unwrap_or_default();
        let utterance = text.trim();
        let confident = input
            .confidence
            .map(|c| c >= self.policy.confidence_threshold)
            .unwrap_or(true);

        // End-of-call detection runs on every caller turn. Terminal intent
        // requires non-empty utterance text; the turn ceiling applies
        // unconditionally.
        let terminal = is_terminal_intent(utterance) || session.turn_count >= self.policy.turn_limit;
        if terminal {
            if !utterance.is_empty() {
                session.append(Speaker::Caller, utterance);
            }
            let outcome = self.close_call(&mut *session).await;
            let id = session.call_id.clone();
            drop(session);
            self.registry.remove(&id);
            return outcome;
        }

        if utterance.is_empty() || !confident {
            session.consecutive_empty_turns += 1;
            tracing::debug!(
                call_id = %session.call_id,
                misses = session.consecutive_empty_turns,
                confident,
                "no usable caller speech, re-prompting"
            );
            let line = reprompt_line(session.consecutive_empty_turns).to_string();
            let outcome = self.speak(&mut *session, line, false).await;
            session.phase = TurnPhase::Listening;
            return outcome;
        }

        session.consecutive_empty_turns = 0;
        session.phase = TurnPhase::Thinking;

        // Render before appending so the new input appears exactly once.
        let messages = session.render_for_completion(&self.policy.persona, utterance);
        session.append(Speaker::Caller, utterance);

        let raw_reply = self.completion.complete_or_fallback(&messages).await;
        let reply = match &self.shaper {
            Some(shape) => shape(&raw_reply),
            None => raw_reply,
        };

        let outcome = self.speak(&mut *session, reply, false).await;
        session.phase = TurnPhase::Listening;
        outcome
    }

    /// First contact for a call id: speak the greeting without consulting
    /// the completion upstream, but still append it to memory.
    async fn greet(&self, session: &mut CallSession) -> TurnOutcome {
        session.phase = TurnPhase::Greeting;
        tracing::info!(call_id = %session.call_id, "greeting new call");
        let line = self.policy.greeting_line.clone();
        let outcome = self.speak(session, line, false).await;
        session.phase = TurnPhase::Listening;
        outcome
    }

    /// Terminal transition: speak the closing line and mark the session
    /// closed. The caller removes it from the registry.
    async fn close_call(&self, session: &mut CallSession) -> TurnOutcome {
        session.phase = TurnPhase::Ending;
        tracing::info!(
            call_id = %session.call_id,
            turns = session.turn_count,
            "ending call"
        );
        let line = self.policy.closing_line.clone();
        let outcome = self.speak(session, line, true).await;
        session.ended = true;
        session.phase = TurnPhase::Closed;
        outcome
    }

    /// Synthesize and record one agent utterance. A synthesis failure
    /// degrades to a text-only outcome so the call never goes silent.
    async fn speak(&self, session: &mut CallSession, line: String, terminal: bool) -> TurnOutcome {
        session.phase = TurnPhase::Speaking;
        session.record_agent_line(&line);

        let audio = match self.synthesizer.synthesize(&line).await {
            Ok(artifact) => Some(self.artifacts.insert(artifact).await),
            Err(e) => {
                tracing::warn!(
                    call_id = %session.call_id,
                    error = %e,
                    "synthesis failed, degrading to text reply"
                );
                None
            }
        };

        TurnOutcome {
            text: line,
            audio,
            terminal,
        }
    }
}
