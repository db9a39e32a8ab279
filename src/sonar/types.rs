//! Wire types for the compute engine and quality gate web services.
//!
//! Field names follow the server's camelCase JSON. Unknown enum values
//! deserialize into `Other(..)` variants instead of failing.

use serde::{Deserialize, Serialize};

use crate::conditions::{Condition, GateStatus};
use crate::poller::TaskStatus;

/// Body of `GET api/ce/task?id=...`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task: Task,
}

/// A compute engine task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    /// Present once the task has succeeded.
    #[serde(default)]
    pub analysis_id: Option<String>,
}

/// Body of `GET api/qualitygates/project_status?analysisId=...`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatusResponse {
    pub project_status: ProjectStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectStatus {
    pub status: GateStatus,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
