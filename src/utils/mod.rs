//! Shared helpers: telephony markup rendering and reply shaping.

pub mod humanize;
pub mod twiml;
