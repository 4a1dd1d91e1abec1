//! Per-call session state and conversation memory.
//!
//! A [`CallSession`] is exclusively owned by the [`SessionRegistry`](crate::core::registry::SessionRegistry)
//! for its lifetime and only ever mutated on the single turn-processing path
//! for its call id. The transcript is a bounded FIFO: once the cap is
//! reached, the oldest entries are dropped, never summarized.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::completion::ChatMessage;

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Caller,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
}

/// Phase of the turn-taking state machine for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    New,
    Greeting,
    Listening,
    Thinking,
    Speaking,
    Ending,
    Closed,
}

/// State for one active phone call.
#[derive(Debug)]
pub struct CallSession {
    /// Opaque identifier, stable for the call's lifetime. Primary key.
    pub call_id: String,
    /// Calling number or anonymized handle; lookup key only.
    pub caller_id: String,
    transcript: VecDeque<TranscriptEntry>,
    cap: usize,
    /// Incremented once per agent utterance. Never decreases.
    pub turn_count: u32,
    /// True once the first agent utterance has been produced.
    pub greeted: bool,
    /// Consecutive caller turns with absent or low-confidence speech.
    pub consecutive_empty_turns: u32,
    /// Terminal. Once true the session is removed from the registry and
    /// never mutated again.
    pub ended: bool,
    pub phase: TurnPhase,
}

impl CallSession {
    pub fn new(call_id: impl Into<String>, caller_id: impl Into<String>, cap: usize) -> Self {
        debug_assert!(cap > 0);
        Self {
            call_id: call_id.into(),
            caller_id: caller_id.into(),
            transcript: VecDeque::with_capacity(cap),
            cap,
            turn_count: 0,
            greeted: false,
            consecutive_empty_turns: 0,
            ended: false,
            phase: TurnPhase::New,
        }
    }

    /// Push an entry, then truncate to the cap from the front (FIFO).
    pub fn append(&mut self, speaker: Speaker, text: impl Into<String>) {
        debug_assert!(!self.ended, "ended sessions must not be mutated");
        self.transcript.push_back(TranscriptEntry {
            speaker,
            text: text.into(),
        });
        while self.transcript.len() > self.cap {
            self.transcript.pop_front();
        }
    }

    /// Append an agent utterance and advance the turn counter.
    pub fn record_agent_line(&mut self, text: &str) {
        self.append(Speaker::Agent, text);
        self.turn_count += 1;
        self.greeted = true;
    }

    pub fn transcript(&self) -> &VecDeque<TranscriptEntry> {
        &self.transcript
    }

    pub fn transcript_cap(&self) -> usize {
        self.cap
    }

    /// Render the ordered message list for a completion request:
    /// system persona, then the retained transcript, then the new caller
    /// input. Pure, no I/O.
    pub fn render_for_completion(&self, persona: &str, new_input: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.transcript.len() + 2);
        messages.push(ChatMessage::system(persona));
        for entry in &self.transcript {
            match entry.speaker {
                Speaker::Caller => messages.push(ChatMessage::user(&entry.text)),
                Speaker::Agent => messages.push(ChatMessage::assistant(&entry.text)),
            }
        }
        messages.push(ChatMessage::user(new_input));
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_is_fifo_truncated_at_cap() {
        let mut session = CallSession::new("CA1", "+611234", 4);
        for i in 0..10 {
            session.append(Speaker::Caller, format!("utterance {i}"));
        }
        assert_eq!(session.transcript().len(), 4);
        // Oldest entries dropped first
        assert_eq!(session.transcript()[0].text, "utterance 6");
        assert_eq!(session.transcript()[3].text, "utterance 9");
    }

    #[test]
    fn turn_count_increments_once_per_agent_line() {
        let mut session = CallSession::new("CA1", "", 16);
        assert_eq!(session.turn_count, 0);
        session.record_agent_line("hello");
        assert_eq!(session.turn_count, 1);
        session.append(Speaker::Caller, "hi");
        assert_eq!(session.turn_count, 1);
        session.record_agent_line("how can I help?");
        assert_eq!(session.turn_count, 2);
        assert!(session.greeted);
    }

    #[test]
    fn turn_count_survives_transcript_truncation() {
        let mut session = CallSession::new("CA1", "", 2);
        for _ in 0..5 {
            session.record_agent_line("line");
        }
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.turn_count, 5);
    }

    #[test]
    fn render_orders_system_transcript_new_input() {
        let mut session = CallSession::new("CA1", "", 16);
        session.record_agent_line("greeting");
        session.append(Speaker::Caller, "question");
        session.record_agent_line("answer");

        let messages = session.render_for_completion("persona", "follow-up");
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, "persona");
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[2].role, "user");
        assert_eq!(messages[3].role, "assistant");
        assert_eq!(messages[4].role, "user");
        assert_eq!(messages[4].content, "follow-up");
    }
}
