//! Network listeners for the control and metrics surfaces.
//!
//! This module provides:
//! - Deterministic planning from URL lists ([`plan`], [`BindingPlan`])
//! - Certificate loading ([`TlsSettings`])
//! - Socket binding with typed per-URL outcomes ([`bind`], [`BindReport`])
//!
//! An `https` URL without usable certificate material is bound as plaintext
//! and reported as [`BindOutcome::BoundWithFallback`]. Any other binding
//! failure is fatal for the process.

mod bind;
mod error;
mod plan;
mod tls;

#[cfg(test)]
mod plan_tests;

pub use bind::{BindOutcome, BindReport, BoundListener, BoundScheme, ListenerBindingResult, bind};
pub use error::{BindError, TlsMaterialError};
pub use plan::{
    BindingPlan, ListenAddress, ListenHost, ListenerSpec, ListenerUrls, METRICS_URLS_ENV, Surface,
    URLS_ENV, UrlOverrides, plan,
};
pub use tls::TlsSettings;
