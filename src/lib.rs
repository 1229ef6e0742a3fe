//! diagmon: diagnostics sidecar agent
//!
//! The bootstrap and exposition core of a diagnostics sidecar: layered
//! configuration with live reload, API key authentication, control and
//! metrics listeners with TLS fallback, and a text metrics endpoint.

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod listener;
pub mod metrics;
pub mod server;
