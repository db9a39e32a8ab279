//! Quality gate conditions and their evaluation.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Verdict of the quality gate as a whole, or of a single condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GateStatus {
    Ok,
    Warn,
    Error,
    /// No gate is associated with the project.
    None,
    Other(String),
}

impl From<String> for GateStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "OK" => GateStatus::Ok,
            "WARN" => GateStatus::Warn,
            "ERROR" => GateStatus::Error,
            "NONE" => GateStatus::None,
            _ => GateStatus::Other(value),
        }
    }
}

impl From<GateStatus> for String {
    fn from(value: GateStatus) -> Self {
        value.to_string()
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateStatus::Ok => write!(f, "OK"),
            GateStatus::Warn => write!(f, "WARN"),
            GateStatus::Error => write!(f, "ERROR"),
            GateStatus::None => write!(f, "NONE"),
            GateStatus::Other(s) => f.write_str(s),
        }
    }
}

/// How a condition compares the actual value with its thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Comparator {
    Gt,
    Lt,
    Eq,
    Ne,
    Other(String),
}

impl Comparator {
    /// Symbol used when rendering a condition. Unknown comparators render as
    /// their own name.
    pub fn symbol(&self) -> &str {
        match self {
            Comparator::Gt => ">",
            Comparator::Lt => "<",
            Comparator::Eq => "=",
            Comparator::Ne => "!=",
            Comparator::Other(name) => name,
        }
    }
}

impl From<String> for Comparator {
    fn from(value: String) -> Self {
        match value.as_str() {
            "GT" => Comparator::Gt,
            "LT" => Comparator::Lt,
            "EQ" => Comparator::Eq,
            "NE" => Comparator::Ne,
            _ => Comparator::Other(value),
        }
    }
}

impl From<Comparator> for String {
    fn from(value: Comparator) -> Self {
        match value {
            Comparator::Gt => "GT".into(),
            Comparator::Lt => "LT".into(),
            Comparator::Eq => "EQ".into(),
            Comparator::Ne => "NE".into(),
            Comparator::Other(name) => name,
        }
    }
}

/// One metric condition of a quality gate, as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub status: GateStatus,
    pub metric_key: String,
    pub comparator: Comparator,
    #[serde(default)]
    pub warning_threshold: Option<String>,
    #[serde(default)]
    pub error_threshold: Option<String>,
    #[serde(default)]
    pub actual_value: Option<String>,
}

/// Friendly names of the built-in metrics most often used in gates.
const METRIC_NAMES: &[(&str, &str)] = &[
    ("alert_status", "Quality Gate Status"),
    ("blocker_violations", "Blocker Issues"),
    ("bugs", "Bugs"),
    ("code_smells", "Code Smells"),
    ("comment_lines_density", "Comments (%)"),
    ("complexity", "Cyclomatic Complexity"),
    ("coverage", "Coverage"),
    ("critical_violations", "Critical Issues"),
    ("duplicated_lines_density", "Duplicated Lines (%)"),
    ("line_coverage", "Line Coverage"),
    ("major_violations", "Major Issues"),
    ("ncloc", "Lines of Code"),
    ("new_blocker_violations", "New Blocker Issues"),
    ("new_bugs", "New Bugs"),
    ("new_code_smells", "New Code Smells"),
    ("new_coverage", "Coverage on New Code"),
    ("new_critical_violations", "New Critical Issues"),
    ("new_duplicated_lines_density", "Duplicated Lines on New Code (%)"),
    ("new_line_coverage", "Line Coverage on New Code"),
    ("new_maintainability_rating", "Maintainability Rating on New Code"),
    ("new_reliability_rating", "Reliability Rating on New Code"),
    ("new_security_rating", "Security Rating on New Code"),
    ("new_technical_debt", "Added Technical Debt"),
    ("new_violations", "New Issues"),
    ("new_vulnerabilities", "New Vulnerabilities"),
    ("reliability_rating", "Reliability Rating"),
    ("security_rating", "Security Rating"),
    ("skipped_tests", "Skipped Unit Tests"),
    ("sqale_index", "Technical Debt"),
    ("sqale_rating", "Maintainability Rating"),
    ("test_errors", "Unit Test Errors"),
    ("test_failures", "Unit Test Failures"),
    ("test_success_density", "Unit Test Success (%)"),
    ("violations", "Issues"),
    ("vulnerabilities", "Vulnerabilities"),
];

pub fn metric_name(metric_key: &str) -> Option<&'static str> {
    METRIC_NAMES
        .iter()
        .find(|(key, _)| *key == metric_key)
        .map(|(_, name)| *name)
}

/// Friendly metric name, or the raw key for custom metrics.
pub fn metric_display_name(metric_key: &str) -> &str {
    metric_name(metric_key).unwrap_or(metric_key)
}

/// Rendered detail line for a WARN or ERROR condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionLine {
    pub status: GateStatus,
    pub text: String,
}

/// Outcome of evaluating a list of conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionReport {
    pub errors: usize,
    pub lines: Vec<ConditionLine>,
}

fn render(condition: &Condition, threshold: Option<&str>) -> String {
    format!(
        "{}: {} {} {}",
        metric_display_name(&condition.metric_key),
        condition.actual_value.as_deref().unwrap_or(""),
        condition.comparator.symbol(),
        threshold.unwrap_or("")
    )
}

/// Logs a line per WARN/ERROR condition and counts the ERROR ones.
///
/// WARN lines show the warning threshold, ERROR lines the error threshold.
/// OK conditions produce nothing. Pure apart from logging.
pub fn evaluate(conditions: &[Condition]) -> ConditionReport {
    let mut report = ConditionReport::default();

    for condition in conditions {
        match condition.status {
            GateStatus::Warn => {
                let text = render(condition, condition.warning_threshold.as_deref());
                warn!("{text}");
                report.lines.push(ConditionLine {
                    status: GateStatus::Warn,
                    text,
                });
            }
            GateStatus::Error => {
                let text = render(condition, condition.error_threshold.as_deref());
                error!("{text}");
                report.errors += 1;
                report.lines.push(ConditionLine {
                    status: GateStatus::Error,
                    text,
                });
            }
            _ => {}
        }
    }

    report
}
