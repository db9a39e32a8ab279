//! Fails the run at once when a forbidden `key=value` pair is configured.

use tracing::{debug, error};

use crate::config::{Settings, keys};
use crate::error::{BuildBreakerError, LOG_STAMP, Result};
use crate::phase::{AnalysisContext, Check, Verdict};

/// Splits a configured pair at the first `=`. A pair without `=` is a key
/// whose expected value is empty.
fn split_pair(pair: &str) -> (&str, &str) {
    pair.split_once('=').unwrap_or((pair, ""))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForbiddenConfigurationCheck;

impl ForbiddenConfigurationCheck {
    /// Returns the first configured pair whose value matches the effective
    /// setting exactly. Unset build breaker keys compare against their
    /// declared default.
    pub fn find_violation(settings: &Settings) -> Option<String> {
        settings
            .get_list(keys::FORBIDDEN_CONF)
            .into_iter()
            .find(|pair| {
                let (key, value) = split_pair(pair);
                settings.get_or_default(key) == Some(value)
            })
    }

    /// Raises [`BuildBreakerError::ForbiddenConfiguration`] on the first match.
    pub fn enforce(settings: &Settings) -> Result<()> {
        match Self::find_violation(settings) {
            Some(pair) => {
                error!("{LOG_STAMP} Forbidden configuration: {pair}");
                Err(BuildBreakerError::ForbiddenConfiguration(pair))
            }
            None => Ok(()),
        }
    }
}

impl Check for ForbiddenConfigurationCheck {
    fn name(&self) -> &'static str {
        "ForbiddenConfigurationCheck"
    }

    fn should_execute(&self, ctx: &AnalysisContext<'_>) -> bool {
        let present = ctx.settings.has_key(keys::FORBIDDEN_CONF);
        if !present {
            debug!("{} is disabled ({} is not set)", self.name(), keys::FORBIDDEN_CONF);
        }
        present
    }

    async fn run(&self, ctx: &AnalysisContext<'_>) -> Result<Verdict> {
        Self::enforce(ctx.settings)?;
        Ok(Verdict::Pass)
    }
}
