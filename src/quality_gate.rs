//! Breaks the build when the server's quality gate fails.
//!
//! The scanner leaves a task-reference artifact (`report-task.txt`) behind
//! after uploading its report. The check reads the task id from it, waits
//! for the server to process the report, then asks for the quality gate
//! verdict of the resulting analysis.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::conditions::{self, ConditionReport, GateStatus};
use crate::config::keys;
use crate::error::{BuildBreakerError, LOG_STAMP, Result};
use crate::phase::{AnalysisContext, Check, Verdict};
use crate::poller::TaskPoller;
use crate::sonar::{Connector, SonarApi};

pub const QUALITY_GATE_FAILED: &str = "Project does not pass the quality gate.";

/// Contents of the task-reference artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTask {
    pub path: PathBuf,
    pub task_id: String,
    pub server_url: Option<String>,
}

impl ReportTask {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| BuildBreakerError::ReportTask {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &contents)
    }

    /// Reads the `java.util.Properties` text the scanner writes.
    pub fn parse(path: &Path, contents: &str) -> Result<Self> {
        let mut properties = java_properties::read(contents.as_bytes()).map_err(|err| {
            BuildBreakerError::Config(format!("invalid properties in {}: {err}", path.display()))
        })?;
        let task_id = properties
            .remove("ceTaskId")
            .or_else(|| properties.remove("taskId"))
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                BuildBreakerError::Config(format!("no ceTaskId found in {}", path.display()))
            })?;
        let server_url = properties.remove("serverUrl").filter(|u| !u.is_empty());
        Ok(Self {
            path: path.to_path_buf(),
            task_id,
            server_url,
        })
    }

    /// Server to query: the configured alternative URL wins over the one
    /// recorded by the scanner.
    pub fn resolve_server_url(&self, alternative: Option<&str>) -> Result<String> {
        match alternative {
            Some(url) => {
                debug!("Using alternative server URL ({}): {url}", keys::ALTERNATIVE_SERVER_URL);
                Ok(url.to_string())
            }
            None => self.server_url.clone().ok_or_else(|| {
                BuildBreakerError::Config(format!(
                    "no serverUrl found in {} and {} is not set",
                    self.path.display(),
                    keys::ALTERNATIVE_SERVER_URL
                ))
            }),
        }
    }
}

/// Quality gate verdict together with the condition lines it logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateOutcome {
    pub status: GateStatus,
    pub verdict: Verdict,
    pub report: ConditionReport,
}

/// Waits for the server to process the report, then checks its quality gate.
#[derive(Debug, Clone)]
pub struct QualityGateCheck<C> {
    connector: C,
    poller: TaskPoller,
}

impl<C: Connector> QualityGateCheck<C> {
    pub fn new(connector: C, poller: TaskPoller) -> Self {
        Self { connector, poller }
    }

    /// Fetches the gate verdict for `analysis_id`. WARN and ERROR gates log
    /// their conditions; only ERROR breaks the build.
    pub async fn check_quality_gate(&self, api: &impl SonarApi, analysis_id: &str) -> Result<GateOutcome> {
        let project_status = api.project_status(analysis_id).await?;
        let status = project_status.status;
        info!("Quality gate status: {status}");

        let report = match status {
            GateStatus::Warn | GateStatus::Error => conditions::evaluate(&project_status.conditions),
            _ => ConditionReport::default(),
        };

        let verdict = if status == GateStatus::Error {
            error!("{LOG_STAMP} Project did not meet {} conditions", report.errors);
            Verdict::Broken(QUALITY_GATE_FAILED.to_string())
        } else {
            Verdict::Pass
        };
        Ok(GateOutcome {
            status,
            verdict,
            report,
        })
    }
}

impl<C: Connector> Check for QualityGateCheck<C> {
    fn name(&self) -> &'static str {
        "QualityGateCheck"
    }

    fn should_execute(&self, ctx: &AnalysisContext<'_>) -> bool {
        if !ctx.config.analysis_mode.is_publish() {
            debug!(
                "{} is disabled ({} != publish)",
                self.name(),
                keys::ANALYSIS_MODE
            );
            return false;
        }
        if ctx.config.skip {
            debug!("{} is disabled ({} = true)", self.name(), keys::SKIP);
            return false;
        }
        true
    }

    async fn run(&self, ctx: &AnalysisContext<'_>) -> Result<Verdict> {
        let report_task = ReportTask::load(&ctx.config.report_task_path)?;
        let server_url =
            report_task.resolve_server_url(ctx.config.alternative_server_url.as_deref())?;
        let api = self.connector.connect(&server_url)?;

        let analysis_id = self.poller.wait_for_analysis(&api, &report_task.task_id).await?;
        Ok(self.check_quality_gate(&api, &analysis_id).await?.verdict)
    }
}
