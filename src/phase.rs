//! Two-phase check protocol.
//!
//! During the analysis phase every check runs to completion. Checks whose
//! failure depends on analysis results only record it in their own
//! [`PendingFailure`] slot, so that other consumers of the results get to
//! finish. At phase end, [`PhaseGate::finish`] turns the first recorded
//! failure into the error that aborts the run.

use std::future::Future;

use tracing::{debug, error};

use crate::alerts::Measure;
use crate::config::{BreakerConfig, Settings};
use crate::error::{BuildBreakerError, LOG_STAMP, Result};
use crate::issues::Issue;

/// Outcome of a check that ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    /// Policy violation, with the reason shown to the user.
    Broken(String),
}

/// Read-only inputs shared by all checks of a run.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub settings: &'a Settings,
    pub config: &'a BreakerConfig,
    pub issues: &'a [Issue],
    pub measures: &'a [Measure],
}

impl<'a> AnalysisContext<'a> {
    pub fn new(
        settings: &'a Settings,
        config: &'a BreakerConfig,
        issues: &'a [Issue],
        measures: &'a [Measure],
    ) -> Self {
        Self {
            settings,
            config,
            issues,
            measures,
        }
    }
}

/// A single build-breaking rule.
pub trait Check {
    fn name(&self) -> &'static str;

    /// Whether the check applies to this run at all. A skipped check never
    /// records a failure.
    fn should_execute(&self, ctx: &AnalysisContext<'_>) -> bool;

    fn run(&self, ctx: &AnalysisContext<'_>) -> impl Future<Output = Result<Verdict>>;
}

/// Failure slot owned by one deferred check.
#[derive(Debug)]
pub struct PendingFailure {
    check: &'static str,
    failure: Option<BuildBreakerError>,
}

impl PendingFailure {
    pub fn new(check: &'static str) -> Self {
        Self {
            check,
            failure: None,
        }
    }

    pub fn check(&self) -> &'static str {
        self.check
    }

    pub fn is_set(&self) -> bool {
        self.failure.is_some()
    }

    pub fn message(&self) -> Option<String> {
        self.failure.as_ref().map(ToString::to_string)
    }

    /// Records the result of running the owning check. Only the first
    /// failure is kept.
    pub fn settle(&mut self, result: Result<Verdict>) {
        if self.failure.is_some() {
            return;
        }
        self.failure = match result {
            Ok(Verdict::Pass) => None,
            Ok(Verdict::Broken(message)) => Some(BuildBreakerError::Broken(message)),
            Err(err) => Some(err),
        };
    }

    fn take(self) -> Option<BuildBreakerError> {
        self.failure
    }
}

/// Collects deferred failures during the analysis phase and raises the
/// first one at phase end.
#[derive(Debug, Default)]
pub struct PhaseGate {
    slots: Vec<PendingFailure>,
}

impl PhaseGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs a check that may halt the phase on the spot.
    pub async fn run_immediate<C: Check>(&self, check: &C, ctx: &AnalysisContext<'_>) -> Result<()> {
        if !check.should_execute(ctx) {
            return Ok(());
        }
        match check.run(ctx).await? {
            Verdict::Pass => Ok(()),
            Verdict::Broken(message) => Err(BuildBreakerError::Broken(message)),
        }
    }

    /// Runs a check and records any failure in its own slot instead of
    /// returning it.
    pub async fn run_deferred<C: Check>(&mut self, check: &C, ctx: &AnalysisContext<'_>) {
        let mut slot = PendingFailure::new(check.name());
        if check.should_execute(ctx) {
            slot.settle(check.run(ctx).await);
        }
        if let Some(message) = slot.message() {
            debug!(check = slot.check(), "Recorded pending failure: {message}");
        }
        self.slots.push(slot);
    }

    /// Adds an externally settled slot.
    pub fn record(&mut self, slot: PendingFailure) {
        self.slots.push(slot);
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingFailure> {
        self.slots.iter().filter(|s| s.is_set())
    }

    /// Phase-end signal: fails with the first recorded failure, if any.
    /// Every pending failure is logged.
    pub fn finish(self) -> Result<()> {
        let mut first = None;
        for slot in self.slots {
            let check = slot.check();
            if let Some(err) = slot.take() {
                error!("{LOG_STAMP} {check}: {err}");
                first.get_or_insert(err);
            }
        }
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
