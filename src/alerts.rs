//! Breaks the build when measures carry ERROR alerts.
//!
//! Older analysis engines attach alert levels directly to measures instead of
//! computing a quality gate on the server. This check reads those alerts.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::conditions::GateStatus;
use crate::config::keys;
use crate::error::Result;
use crate::phase::{AnalysisContext, Check, Verdict};

/// Metric that carries the aggregated alert level; never counted itself.
const ALERT_STATUS_METRIC: &str = "alert_status";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    pub metric: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub alert_status: Option<GateStatus>,
    #[serde(default)]
    pub alert_text: Option<String>,
}

impl Measure {
    fn alert_level(&self) -> Option<&GateStatus> {
        if self.metric == ALERT_STATUS_METRIC {
            return None;
        }
        self.alert_status.as_ref()
    }

    fn alert_text(&self) -> &str {
        self.alert_text.as_deref().unwrap_or(&self.metric)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeasureAlertCheck;

impl MeasureAlertCheck {
    /// Logs WARN and ERROR alerts, returning how many were ERROR.
    pub fn count_errors(measures: &[Measure]) -> usize {
        let mut count = 0;
        for measure in measures {
            match measure.alert_level() {
                Some(GateStatus::Error) => {
                    error!("{}", measure.alert_text());
                    count += 1;
                }
                Some(GateStatus::Warn) => warn!("{}", measure.alert_text()),
                _ => {}
            }
        }
        count
    }

    pub fn evaluate(measures: &[Measure]) -> Verdict {
        match Self::count_errors(measures) {
            0 => Verdict::Pass,
            n => Verdict::Broken(format!("Alert thresholds have been hit ({n} times).")),
        }
    }
}

impl Check for MeasureAlertCheck {
    fn name(&self) -> &'static str {
        "MeasureAlertCheck"
    }

    fn should_execute(&self, ctx: &AnalysisContext<'_>) -> bool {
        if ctx.config.skip {
            debug!("{} is disabled ({} = true)", self.name(), keys::SKIP);
            return false;
        }
        if ctx.measures.is_empty() {
            debug!("{} has no measures to inspect", self.name());
            return false;
        }
        true
    }

    async fn run(&self, ctx: &AnalysisContext<'_>) -> Result<Verdict> {
        Ok(Self::evaluate(ctx.measures))
    }
}
