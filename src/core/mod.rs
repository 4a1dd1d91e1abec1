//! Core call-orchestration machinery: per-call memory, provider adapters,
//! the turn-taking engine, and the streaming relay.

pub mod artifact;
pub mod completion;
pub mod registry;
pub mod relay;
pub mod session;
pub mod synthesis;
pub mod turn;

pub use artifact::{AudioArtifact, AudioArtifactCache};
pub use completion::{ChatMessage, CompletionAdapter, CompletionBackend, OpenAiCompletion};
pub use registry::{SessionRegistry, SharedSession};
pub use session::{CallSession, Speaker, TranscriptEntry, TurnPhase};
pub use synthesis::{DisabledSynthesizer, ElevenLabsSynthesizer, SpeechSynthesizer};
pub use turn::{SpeechInput, TurnEngine, TurnOutcome, TurnPolicy};
