pub mod client;
pub mod types;

use std::future::Future;

use crate::error::Result;

pub use client::{HttpConnector, SonarClient};
pub use types::{ProjectStatus, ProjectStatusResponse, Task, TaskResponse};

/// The two server endpoints the build breaker talks to.
pub trait SonarApi {
    /// Fetches the current state of a background task.
    fn task(&self, task_id: &str) -> impl Future<Output = Result<Task>> + Send;

    /// Fetches the quality gate verdict computed for an analysis.
    fn project_status(&self, analysis_id: &str)
    -> impl Future<Output = Result<ProjectStatus>> + Send;
}

/// Builds a [`SonarApi`] for a server URL discovered at run time.
pub trait Connector {
    type Api: SonarApi;

    fn connect(&self, server_url: &str) -> Result<Self::Api>;
}
