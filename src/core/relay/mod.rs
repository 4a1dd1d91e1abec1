//! Streaming relay: telephony media stream ↔ realtime speech provider.

pub mod bridge;
pub mod messages;
pub mod provider;

pub use bridge::{RelayConfig, StreamBridge};
pub use provider::{ProviderSocket, OPENAI_REALTIME_URL};
