//! Build breaker configuration.
//!
//! [`Settings`] is the flat key/value space every check reads from; it is
//! filled from the `[settings]` table of `buildbreaker.toml`, then from
//! `-D key=value` overrides. [`BreakerConfig`] holds the typed values the
//! checks need, parsed once per run. Values missing from both sources use
//! the defaults below.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::BuildBreakerError;
use crate::poller::PollBudget;
use crate::severity::Threshold;

/// Configuration keys understood by the build breaker.
pub mod keys {
    pub const SKIP: &str = "sonar.buildbreaker.skip";
    pub const QUERY_MAX_ATTEMPTS: &str = "sonar.buildbreaker.queryMaxAttempts";
    pub const QUERY_INTERVAL: &str = "sonar.buildbreaker.queryInterval";
    pub const FORBIDDEN_CONF: &str = "sonar.buildbreaker.forbiddenConf";
    pub const ALTERNATIVE_SERVER_URL: &str = "sonar.buildbreaker.alternativeServerUrl";
    pub const ISSUES_SEVERITY: &str = "sonar.buildbreaker.preview.issuesSeverity";
    pub const ISSUES_NEW_ONLY: &str = "sonar.buildbreaker.preview.issuesNewOnly";
    pub const ANALYSIS_MODE: &str = "sonar.analysis.mode";
    pub const WORKING_DIRECTORY: &str = "sonar.working.directory";
    pub const METADATA_FILE_PATH: &str = "sonar.scanner.metadataFilePath";
    pub const LOGIN: &str = "sonar.login";
    pub const PASSWORD: &str = "sonar.password";

    /// Declared defaults of the build breaker's own keys, as raw strings.
    const DEFAULTS: &[(&str, &str)] = &[
        (SKIP, "false"),
        (QUERY_MAX_ATTEMPTS, "30"),
        (QUERY_INTERVAL, "10000"),
        (ISSUES_SEVERITY, "Disabled"),
        (ISSUES_NEW_ONLY, "false"),
    ];

    pub fn default_value(key: &str) -> Option<&'static str> {
        DEFAULTS.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }
}

const DEFAULT_QUERY_MAX_ATTEMPTS: u32 = 30;
const DEFAULT_QUERY_INTERVAL_MS: u64 = 10_000;
const DEFAULT_WORKING_DIRECTORY: &str = ".scannerwork";
const REPORT_TASK_FILE: &str = "report-task.txt";

/// Flat, ordered key/value configuration space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Explicit value, or the declared default of a build breaker key.
    pub fn get_or_default(&self, key: &str) -> Option<&str> {
        self.get(key).or_else(|| keys::default_value(key))
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Applies a `key=value` override, splitting at the first `=`.
    pub fn set_pair(&mut self, pair: &str) -> Result<(), BuildBreakerError> {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                self.set(key.trim(), value);
                Ok(())
            }
            _ => Err(BuildBreakerError::Config(format!(
                "expected key=value, got '{pair}'"
            ))),
        }
    }

    /// Comma-separated list value, trimmed, with empty entries dropped.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, BuildBreakerError> {
        match self.get(key).map(str::trim) {
            None | Some("") => Ok(default),
            Some(v) if v.eq_ignore_ascii_case("true") => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("false") => Ok(false),
            Some(v) => Err(BuildBreakerError::Config(format!(
                "{key} must be true or false, got '{v}'"
            ))),
        }
    }

    fn get_parsed<T: FromStr>(&self, key: &str, default: T) -> Result<T, BuildBreakerError> {
        match self.get(key).map(str::trim) {
            None | Some("") => Ok(default),
            Some(v) => v.parse().map_err(|_| {
                BuildBreakerError::Config(format!("{key} must be a non-negative integer, got '{v}'"))
            }),
        }
    }

    /// Non-blank string value.
    fn get_non_blank(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Flattens a TOML table into dotted keys. Scalars render as their
    /// string form and arrays join with commas.
    pub fn from_toml_table(table: &toml::Table) -> Self {
        let mut settings = Self::new();
        flatten_into(&mut settings, None, table);
        settings
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Settings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut settings = Self::new();
        for (k, v) in iter {
            settings.set(k, v);
        }
        settings
    }
}

fn flatten_into(settings: &mut Settings, prefix: Option<&str>, table: &toml::Table) {
    for (key, value) in table {
        let full_key = match prefix {
            Some(p) => format!("{p}.{key}"),
            None => key.clone(),
        };
        match value {
            toml::Value::Table(inner) => flatten_into(settings, Some(&full_key), inner),
            other => {
                settings.set(full_key, render_scalar(other));
            }
        }
    }
}

fn render_scalar(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Array(items) => items
            .iter()
            .map(render_scalar)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

/// Which kind of analysis produced the results being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisMode {
    /// Results are published to the server and processed there.
    #[default]
    Publish,
    /// Local analysis, nothing is sent to the server.
    Preview,
    /// Local issues-only analysis.
    Issues,
}

impl AnalysisMode {
    pub fn is_publish(&self) -> bool {
        matches!(self, AnalysisMode::Publish)
    }
}

impl FromStr for AnalysisMode {
    type Err = BuildBreakerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "publish" => Ok(AnalysisMode::Publish),
            "preview" => Ok(AnalysisMode::Preview),
            "issues" => Ok(AnalysisMode::Issues),
            other => Err(BuildBreakerError::Config(format!(
                "{} must be publish, preview or issues, got '{other}'",
                keys::ANALYSIS_MODE
            ))),
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisMode::Publish => write!(f, "publish"),
            AnalysisMode::Preview => write!(f, "preview"),
            AnalysisMode::Issues => write!(f, "issues"),
        }
    }
}

/// Login and password handed to the HTTP transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub login: Option<String>,
    pub password: Option<String>,
}

/// Typed view of the [`Settings`] used by the checks.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerConfig {
    /// Disables the quality gate and alert checks.
    pub skip: bool,
    pub poll_budget: PollBudget,
    pub alternative_server_url: Option<String>,
    pub issues_threshold: Threshold,
    /// Only count issues introduced by this analysis.
    pub issues_new_only: bool,
    pub analysis_mode: AnalysisMode,
    /// Location of the task-reference artifact written by the scanner.
    pub report_task_path: PathBuf,
    pub credentials: Credentials,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            skip: false,
            poll_budget: PollBudget::new(DEFAULT_QUERY_MAX_ATTEMPTS, DEFAULT_QUERY_INTERVAL_MS),
            alternative_server_url: None,
            issues_threshold: Threshold::Disabled,
            issues_new_only: false,
            analysis_mode: AnalysisMode::Publish,
            report_task_path: Path::new(DEFAULT_WORKING_DIRECTORY).join(REPORT_TASK_FILE),
            credentials: Credentials::default(),
        }
    }
}

impl BreakerConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, BuildBreakerError> {
        let max_attempts = settings.get_parsed(keys::QUERY_MAX_ATTEMPTS, DEFAULT_QUERY_MAX_ATTEMPTS)?;
        let interval_ms = settings.get_parsed(keys::QUERY_INTERVAL, DEFAULT_QUERY_INTERVAL_MS)?;

        let issues_threshold = match settings.get(keys::ISSUES_SEVERITY) {
            Some(value) => Threshold::parse(value)?,
            None => Threshold::Disabled,
        };

        let analysis_mode = match settings.get(keys::ANALYSIS_MODE) {
            Some(value) => value.parse()?,
            None => AnalysisMode::default(),
        };

        let report_task_path = match settings.get_non_blank(keys::METADATA_FILE_PATH) {
            Some(path) => PathBuf::from(path),
            None => {
                let work_dir = settings
                    .get_non_blank(keys::WORKING_DIRECTORY)
                    .unwrap_or(DEFAULT_WORKING_DIRECTORY);
                Path::new(work_dir).join(REPORT_TASK_FILE)
            }
        };

        Ok(Self {
            skip: settings.get_bool(keys::SKIP, false)?,
            poll_budget: PollBudget::new(max_attempts, interval_ms),
            alternative_server_url: settings
                .get_non_blank(keys::ALTERNATIVE_SERVER_URL)
                .map(str::to_string),
            issues_threshold,
            issues_new_only: settings.get_bool(keys::ISSUES_NEW_ONLY, false)?,
            analysis_mode,
            report_task_path,
            credentials: Credentials {
                login: settings.get_non_blank(keys::LOGIN).map(str::to_string),
                password: settings.get(keys::PASSWORD).map(str::to_string),
            },
        })
    }
}

/// On-disk layout of `buildbreaker.toml`.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    settings: toml::Table,
}

/// Loads settings from `path` (if it exists), applies `overrides`, then
/// fills `sonar.login` from `SONAR_TOKEN` when no login is configured.
pub fn load_settings(path: &Path, overrides: &[String]) -> Result<Settings> {
    let mut settings = if path.exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file: ConfigFile = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Settings::from_toml_table(&file.settings)
    } else {
        Settings::new()
    };

    for pair in overrides {
        settings.set_pair(pair)?;
    }

    if !settings.has_key(keys::LOGIN)
        && let Ok(token) = std::env::var("SONAR_TOKEN")
        && !token.is_empty()
    {
        settings.set(keys::LOGIN, token);
    }

    Ok(settings)
}
