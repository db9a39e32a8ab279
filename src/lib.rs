//! Decides whether a code-analysis run should break the build.
//!
//! A run has two phases. During the analysis phase the configured checks
//! execute one after another: the forbidden configuration check fails on the
//! spot, while the issue severity, measure alert and quality gate checks
//! record failures in a [`phase::PhaseGate`]. At phase end the first recorded
//! failure aborts the run.

pub mod alerts;
pub mod conditions;
pub mod config;
pub mod error;
pub mod forbidden;
pub mod issues;
pub mod phase;
pub mod pipeline;
pub mod poller;
pub mod quality_gate;
pub mod severity;
pub mod sonar;
pub mod telemetry;

pub use error::{BuildBreakerError, Result};
pub use pipeline::BuildBreaker;
