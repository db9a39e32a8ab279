use std::path::PathBuf;

use thiserror::Error;

/// Prefix carried by every log line that reports a broken build.
pub const LOG_STAMP: &str = "[BUILD BREAKER]";

#[derive(Debug, Error)]
pub enum BuildBreakerError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Unable to load properties from file {}", .path.display())]
    ReportTask {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed server response: {0}")]
    MalformedResponse(String),

    #[error("Report processing did not complete successfully: {0}")]
    TaskFailed(String),

    #[error(
        "Report processing is taking longer than the configured wait limit. \
         Try increasing sonar.buildbreaker.queryMaxAttempts, sonar.buildbreaker.queryInterval, or both."
    )]
    WaitLimitExceeded,

    #[error("Interrupted while waiting for report processing")]
    Interrupted,

    #[error("A forbidden configuration has been found on the project: {0}")]
    ForbiddenConfiguration(String),

    /// A deferred policy violation raised at phase end.
    #[error("{0}")]
    Broken(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl BuildBreakerError {
    /// Policy violations are expected outcomes; everything else is an
    /// infrastructure or configuration problem.
    pub fn is_policy_violation(&self) -> bool {
        matches!(
            self,
            BuildBreakerError::ForbiddenConfiguration(_) | BuildBreakerError::Broken(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BuildBreakerError>;
