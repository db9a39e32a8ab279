//! Breaks the build when issues at or above a configured severity exist.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{BreakerConfig, keys};
use crate::error::Result;
use crate::phase::{AnalysisContext, Check, Verdict};
use crate::severity::{Threshold, index_of};

/// An issue raised by the analysis engine. Only `severity` drives the
/// check; the other fields are there for the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub key: String,
    /// Severity name as reported by the engine; not necessarily on the scale.
    pub severity: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, alias = "component")]
    pub component_key: String,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default, alias = "rule")]
    pub rule_key: String,
    /// Introduced by the current analysis.
    #[serde(default)]
    pub is_new: bool,
}

impl Issue {
    pub fn new(key: impl Into<String>, severity: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            severity: severity.into(),
            message: String::new(),
            component_key: String::new(),
            line: None,
            rule_key: String::new(),
            is_new: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueSeverityCheck {
    threshold: Threshold,
    new_only: bool,
}

impl IssueSeverityCheck {
    pub fn new(threshold: Threshold, new_only: bool) -> Self {
        Self {
            threshold,
            new_only,
        }
    }

    pub fn from_config(config: &BreakerConfig) -> Self {
        Self::new(config.issues_threshold, config.issues_new_only)
    }

    /// Issues at or above the threshold. Walks the whole collection so the
    /// audit log lists every offender.
    pub fn matching<'a>(&self, issues: &'a [Issue]) -> Vec<&'a Issue> {
        let threshold = self.threshold.index();
        if threshold < 0 {
            return Vec::new();
        }

        let mut matching = Vec::new();
        for issue in issues {
            if self.new_only && !issue.is_new {
                continue;
            }
            if index_of(&issue.severity) >= threshold {
                info!(
                    "{}, Line {}, {} ({}) {}",
                    issue.component_key,
                    issue.line.map_or(-1, i64::from),
                    issue.message,
                    issue.rule_key,
                    if issue.is_new { "(New Issue)" } else { "" }
                );
                matching.push(issue);
            }
        }
        matching
    }

    /// Evaluates `issues` against the threshold.
    pub fn evaluate(&self, issues: &[Issue]) -> Verdict {
        if self.threshold == Threshold::Disabled {
            debug!("Issue severity check is disabled ({} == {})", keys::ISSUES_SEVERITY, self.threshold);
            return Verdict::Pass;
        }

        let count = self.matching(issues).len();
        if count > 0 {
            Verdict::Broken(format!(
                "Found {count} issues that are of severity equal or higher than {}",
                self.threshold
            ))
        } else {
            info!("No issues with severity equal or higher than {}", self.threshold);
            Verdict::Pass
        }
    }
}

impl Check for IssueSeverityCheck {
    fn name(&self) -> &'static str {
        "IssueSeverityCheck"
    }

    fn should_execute(&self, ctx: &AnalysisContext<'_>) -> bool {
        if ctx.config.analysis_mode.is_publish() {
            debug!(
                "{} is disabled ({} == {})",
                self.name(),
                keys::ANALYSIS_MODE,
                ctx.config.analysis_mode
            );
            return false;
        }
        if self.threshold == Threshold::Disabled {
            debug!("{} is disabled ({} == {})", self.name(), keys::ISSUES_SEVERITY, self.threshold);
            return false;
        }
        true
    }

    async fn run(&self, ctx: &AnalysisContext<'_>) -> Result<Verdict> {
        Ok(self.evaluate(ctx.issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisMode, Settings};
    use crate::severity::Severity;

    fn issues(severities: &[&str]) -> Vec<Issue> {
        severities
            .iter()
            .enumerate()
            .map(|(i, s)| Issue::new(format!("issue-{i}"), *s))
            .collect()
    }

    #[test]
    fn one_issue_at_threshold_breaks() {
        let check = IssueSeverityCheck::new(Threshold::At(Severity::Major), false);
        let issues = issues(&["MINOR", "MAJOR"]);
        assert_eq!(check.matching(&issues).len(), 1);
        match check.evaluate(&issues) {
            Verdict::Broken(msg) => {
                assert_eq!(
                    msg,
                    "Found 1 issues that are of severity equal or higher than MAJOR"
                );
                assert!(msg.contains("higher than MAJOR"));
            }
            other => panic!("expected Broken, got {other:?}"),
        }
    }

    #[test]
    fn nothing_above_threshold_passes() {
        let check = IssueSeverityCheck::new(Threshold::At(Severity::Critical), false);
        let issues = issues(&["MINOR", "MAJOR"]);
        assert!(check.matching(&issues).is_empty());
        assert_eq!(check.evaluate(&issues), Verdict::Pass);
    }

    #[test]
    fn counts_every_match() {
        let check = IssueSeverityCheck::new(Threshold::At(Severity::Minor), false);
        let issues = issues(&["BLOCKER", "INFO", "minor", "CRITICAL", "MAJOR"]);
        assert_eq!(check.matching(&issues).len(), 4);
        assert!(matches!(check.evaluate(&issues), Verdict::Broken(msg) if msg.starts_with("Found 4 issues")));
    }

    #[test]
    fn disabled_threshold_is_a_no_op() {
        let check = IssueSeverityCheck::new(Threshold::Disabled, false);
        let issues = issues(&["BLOCKER"]);
        assert!(check.matching(&issues).is_empty());
        assert_eq!(check.evaluate(&issues), Verdict::Pass);
    }

    #[test]
    fn unknown_issue_severity_never_matches() {
        let check = IssueSeverityCheck::new(Threshold::At(Severity::Info), false);
        let issues = issues(&["HOTSPOT"]);
        assert_eq!(check.evaluate(&issues), Verdict::Pass);
    }

    #[test]
    fn new_only_ignores_existing_issues() {
        let check = IssueSeverityCheck::new(Threshold::At(Severity::Major), true);
        let mut old = Issue::new("old", "BLOCKER");
        old.is_new = false;
        let mut fresh = Issue::new("fresh", "CRITICAL");
        fresh.is_new = true;
        let issues = vec![old, fresh];
        let matching = check.matching(&issues);
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].key, "fresh");
    }

    #[test]
    fn issue_deserializes_from_engine_format() {
        let json = r#"{
            "key": "AX1",
            "severity": "CRITICAL",
            "message": "Remove this hard-coded password.",
            "component": "proj:src/main.rs",
            "line": 12,
            "rule": "rust:S2068",
            "isNew": true
        }"#;
        let issue: Issue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.component_key, "proj:src/main.rs");
        assert_eq!(issue.rule_key, "rust:S2068");
        assert_eq!(issue.line, Some(12));
        assert!(issue.is_new);
    }

    #[test]
    fn should_execute_respects_mode_and_threshold() {
        let settings = Settings::new();
        let mut config = BreakerConfig {
            analysis_mode: AnalysisMode::Preview,
            ..BreakerConfig::default()
        };
        let ctx = AnalysisContext::new(&settings, &config, &[], &[]);
        let enabled = IssueSeverityCheck::new(Threshold::At(Severity::Major), false);
        assert!(enabled.should_execute(&ctx));
        let disabled = IssueSeverityCheck::new(Threshold::Disabled, false);
        assert!(!disabled.should_execute(&ctx));

        config.analysis_mode = AnalysisMode::Publish;
        let ctx = AnalysisContext::new(&settings, &config, &[], &[]);
        assert!(!enabled.should_execute(&ctx));
    }
}
