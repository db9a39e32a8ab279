//! Terminal output for `buildbreaker check`: a spinner while checks run and
//! a coloured verdict at the end.
//!
//! `indicatif` hides the spinner when stderr is not a terminal, so CI logs
//! only get the verdict line.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use buildbreaker::error::{BuildBreakerError, LOG_STAMP};

pub struct RunProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
}

impl RunProgress {
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
        }
    }

    pub fn passed(self) {
        self.pb.finish_and_clear();
        eprintln!("{}", self.green.apply_to("Build breaker checks passed"));
    }

    pub fn broken(self, err: &BuildBreakerError) {
        self.pb.finish_and_clear();
        let label = if err.is_policy_violation() {
            "Build broken"
        } else {
            "Build breaker failed"
        };
        eprintln!("{} {}: {err}", self.red.apply_to(LOG_STAMP), self.red.apply_to(label));
    }
}
