//! HTTP middleware layers.

pub mod auth;
