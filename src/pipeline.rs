//! Runs every check of a build in order, then signals phase end.

use tracing::info;

use crate::alerts::{Measure, MeasureAlertCheck};
use crate::config::{BreakerConfig, Settings};
use crate::error::Result;
use crate::forbidden::ForbiddenConfigurationCheck;
use crate::issues::{Issue, IssueSeverityCheck};
use crate::phase::{AnalysisContext, PhaseGate};
use crate::poller::{Interrupt, TaskPoller};
use crate::quality_gate::QualityGateCheck;
use crate::sonar::{Connector, HttpConnector};

/// One configured build breaker run.
#[derive(Debug, Clone)]
pub struct BuildBreaker<C> {
    settings: Settings,
    config: BreakerConfig,
    connector: C,
    interrupt: Interrupt,
}

impl BuildBreaker<HttpConnector> {
    /// Build breaker talking to the real server with the configured
    /// credentials.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let config = BreakerConfig::from_settings(&settings)?;
        let connector = HttpConnector::new(config.credentials.clone());
        Ok(Self::new(settings, config, connector))
    }
}

impl<C: Connector> BuildBreaker<C> {
    pub fn new(settings: Settings, config: BreakerConfig, connector: C) -> Self {
        Self {
            settings,
            config,
            connector,
            interrupt: Interrupt::never(),
        }
    }

    /// Lets the host abort a pending wait for report processing.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Runs the analysis phase, then the phase-end step.
    ///
    /// A forbidden configuration fails at once. Every other check runs to
    /// completion before the first recorded failure is returned.
    pub async fn run(self, issues: &[Issue], measures: &[Measure]) -> Result<()> {
        self.analyze(issues, measures).await?.finish()
    }

    /// Analysis phase only: runs every check and returns the gate holding
    /// their pending failures. Fails early only on a forbidden configuration.
    pub async fn analyze(self, issues: &[Issue], measures: &[Measure]) -> Result<PhaseGate> {
        let ctx = AnalysisContext::new(&self.settings, &self.config, issues, measures);
        let mut gate = PhaseGate::new();

        gate.run_immediate(&ForbiddenConfigurationCheck, &ctx).await?;

        gate.run_deferred(&IssueSeverityCheck::from_config(&self.config), &ctx)
            .await;
        gate.run_deferred(&MeasureAlertCheck, &ctx).await;

        let poller = TaskPoller::with_interrupt(self.config.poll_budget, self.interrupt.clone());
        let quality_gate = QualityGateCheck::new(self.connector, poller);
        gate.run_deferred(&quality_gate, &ctx).await;

        info!(
            pending = gate.pending().count(),
            "Analysis phase complete"
        );
        Ok(gate)
    }
}
