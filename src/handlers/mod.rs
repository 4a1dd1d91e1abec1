//! HTTP and WebSocket request handlers.

pub mod api;
pub mod audio;
pub mod stream;
pub mod voice;
