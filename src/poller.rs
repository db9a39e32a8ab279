//! Waits for server-side report processing to finish.
//!
//! The scanner uploads its report and the server processes it as an
//! asynchronous task. [`TaskPoller`] queries that task until it reaches a
//! terminal status or the [`PollBudget`] runs out, sleeping between
//! attempts. The sleep is the only suspension point of a run and can be cut
//! short through an [`Interrupt`].

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::{BuildBreakerError, LOG_STAMP, Result};
use crate::sonar::SonarApi;

/// Status of a server-side task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    Canceled,
    /// Any status this client does not know about. Treated as terminal.
    Other(String),
}

impl TaskStatus {
    /// Pending and in-progress tasks are worth asking about again.
    pub fn is_transient(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::InProgress)
    }
}

impl From<String> for TaskStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PENDING" => TaskStatus::Pending,
            "IN_PROGRESS" => TaskStatus::InProgress,
            "SUCCESS" => TaskStatus::Success,
            "FAILED" => TaskStatus::Failed,
            "CANCELED" => TaskStatus::Canceled,
            _ => TaskStatus::Other(value),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(value: TaskStatus) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "PENDING"),
            TaskStatus::InProgress => write!(f, "IN_PROGRESS"),
            TaskStatus::Success => write!(f, "SUCCESS"),
            TaskStatus::Failed => write!(f, "FAILED"),
            TaskStatus::Canceled => write!(f, "CANCELED"),
            TaskStatus::Other(s) => f.write_str(s),
        }
    }
}

/// How many times to ask, and how long to wait between asks.
///
/// Total waiting never exceeds `max_attempts * interval_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollBudget {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

impl PollBudget {
    pub fn new(max_attempts: u32, interval_ms: u64) -> Self {
        Self {
            max_attempts,
            interval_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Upper bound on time spent sleeping.
    pub fn max_wait(&self) -> Duration {
        self.interval().saturating_mul(self.max_attempts)
    }
}

/// Sending half of an [`Interrupt`], held by whoever may abort the run.
#[derive(Debug)]
pub struct InterruptHandle {
    tx: watch::Sender<bool>,
}

impl InterruptHandle {
    pub fn raise(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving half of an interrupt signal.
#[derive(Debug, Clone)]
pub struct Interrupt {
    rx: watch::Receiver<bool>,
}

impl Interrupt {
    pub fn pair() -> (InterruptHandle, Interrupt) {
        let (tx, rx) = watch::channel(false);
        (InterruptHandle { tx }, Interrupt { rx })
    }

    /// An interrupt that is never raised.
    pub fn never() -> Self {
        Self::pair().1
    }

    pub fn is_raised(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the interrupt is raised. Pends forever if the handle
    /// was dropped without raising.
    async fn raised(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// States of a single poll run.
#[derive(Debug)]
enum PollState {
    Polling { attempt: u32 },
    Succeeded(String),
    FailedTerminal(BuildBreakerError),
    ExceededBudget,
}

/// Polls a server-side task until it completes.
#[derive(Debug, Clone)]
pub struct TaskPoller {
    budget: PollBudget,
    interrupt: Interrupt,
}

impl TaskPoller {
    pub fn new(budget: PollBudget) -> Self {
        Self::with_interrupt(budget, Interrupt::never())
    }

    pub fn with_interrupt(budget: PollBudget, interrupt: Interrupt) -> Self {
        Self { budget, interrupt }
    }

    /// Waits for `task_id` to finish and returns the analysis id it produced.
    ///
    /// - `PENDING`/`IN_PROGRESS`: sleep for the interval and ask again.
    /// - `SUCCESS`: done.
    /// - anything else, or a failed query: fail at once without retrying.
    ///
    /// With `max_attempts == 0` no query is issued and the budget is
    /// reported as exceeded.
    pub async fn wait_for_analysis(&self, api: &impl SonarApi, task_id: &str) -> Result<String> {
        let mut interrupt = self.interrupt.clone();
        let mut state = PollState::Polling { attempt: 0 };

        loop {
            state = match state {
                PollState::Polling { attempt } if attempt >= self.budget.max_attempts => {
                    PollState::ExceededBudget
                }
                PollState::Polling { attempt } => {
                    self.step(api, task_id, attempt, &mut interrupt).await
                }
                PollState::Succeeded(analysis_id) => {
                    debug!(task_id, %analysis_id, "Report processing completed");
                    return Ok(analysis_id);
                }
                PollState::FailedTerminal(err) => return Err(err),
                PollState::ExceededBudget => {
                    error!(
                        max_wait = ?self.budget.max_wait(),
                        "{LOG_STAMP} API query limit ({}) reached. Try increasing {}, {}, or both.",
                        self.budget.max_attempts,
                        crate::config::keys::QUERY_MAX_ATTEMPTS,
                        crate::config::keys::QUERY_INTERVAL
                    );
                    return Err(BuildBreakerError::WaitLimitExceeded);
                }
            };
        }
    }

    async fn step(
        &self,
        api: &impl SonarApi,
        task_id: &str,
        attempt: u32,
        interrupt: &mut Interrupt,
    ) -> PollState {
        let task = match api.task(task_id).await {
            Ok(task) => task,
            Err(err) => return PollState::FailedTerminal(err),
        };

        match task.status {
            status if status.is_transient() => {
                info!(attempt = attempt + 1, %status, "Waiting for report processing to complete...");
                if interrupt.is_raised() {
                    return PollState::FailedTerminal(BuildBreakerError::Interrupted);
                }
                tokio::select! {
                    _ = sleep(self.budget.interval()) => PollState::Polling { attempt: attempt + 1 },
                    _ = interrupt.raised() => PollState::FailedTerminal(BuildBreakerError::Interrupted),
                }
            }
            TaskStatus::Success => match task.analysis_id {
                Some(id) if !id.is_empty() => PollState::Succeeded(id),
                _ => PollState::FailedTerminal(BuildBreakerError::MalformedResponse(format!(
                    "task {task_id} succeeded without an analysis id"
                ))),
            },
            status => PollState::FailedTerminal(BuildBreakerError::TaskFailed(status.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::sonar::{ProjectStatus, Task};

    const TASK_ID: &str = "Abc123";
    const ANALYSIS_ID: &str = "Def456";

    /// Replays a fixed sequence of task statuses, then repeats the last one.
    struct ScriptedApi {
        statuses: Mutex<VecDeque<TaskStatus>>,
        error: Mutex<Option<BuildBreakerError>>,
        calls: AtomicU32,
    }

    impl ScriptedApi {
        fn statuses(statuses: &[TaskStatus]) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().cloned().collect()),
                error: Mutex::new(None),
                calls: AtomicU32::new(0),
            }
        }

        fn failing(err: BuildBreakerError) -> Self {
            let api = Self::statuses(&[]);
            *api.error.lock().unwrap() = Some(err);
            api
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SonarApi for ScriptedApi {
        async fn task(&self, task_id: &str) -> Result<Task> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.error.lock().unwrap().take() {
                return Err(err);
            }
            let mut statuses = self.statuses.lock().unwrap();
            let status = if statuses.len() > 1 {
                statuses.pop_front().unwrap()
            } else {
                statuses.front().cloned().unwrap()
            };
            Ok(Task {
                id: task_id.to_string(),
                analysis_id: (status == TaskStatus::Success).then(|| ANALYSIS_ID.to_string()),
                status,
            })
        }

        async fn project_status(&self, _analysis_id: &str) -> Result<ProjectStatus> {
            unreachable!("poller never asks for the quality gate")
        }
    }

    #[tokio::test]
    async fn single_in_progress_attempt_exceeds_budget() {
        let api = ScriptedApi::statuses(&[TaskStatus::InProgress]);
        let poller = TaskPoller::new(PollBudget::new(1, 0));
        let err = poller.wait_for_analysis(&api, TASK_ID).await.unwrap_err();
        assert!(matches!(err, BuildBreakerError::WaitLimitExceeded));
        assert!(
            err.to_string()
                .contains("Report processing is taking longer than the configured wait limit.")
        );
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn single_pending_attempt_exceeds_budget() {
        let api = ScriptedApi::statuses(&[TaskStatus::Pending]);
        let poller = TaskPoller::new(PollBudget::new(1, 0));
        let err = poller.wait_for_analysis(&api, TASK_ID).await.unwrap_err();
        assert!(matches!(err, BuildBreakerError::WaitLimitExceeded));
    }

    #[tokio::test]
    async fn success_returns_analysis_id_after_one_attempt() {
        let api = ScriptedApi::statuses(&[TaskStatus::Success]);
        let poller = TaskPoller::new(PollBudget::new(1, 0));
        let id = poller.wait_for_analysis(&api, TASK_ID).await.unwrap();
        assert_eq!(id, ANALYSIS_ID);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn failed_status_is_terminal() {
        let api = ScriptedApi::statuses(&[TaskStatus::Failed]);
        let poller = TaskPoller::new(PollBudget::new(5, 0));
        let err = poller.wait_for_analysis(&api, TASK_ID).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Report processing did not complete successfully: FAILED"
        );
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn canceled_status_is_terminal() {
        let api = ScriptedApi::statuses(&[TaskStatus::Canceled]);
        let poller = TaskPoller::new(PollBudget::new(5, 0));
        let err = poller.wait_for_analysis(&api, TASK_ID).await.unwrap_err();
        assert!(err.to_string().contains("CANCELED"));
    }

    #[tokio::test]
    async fn unknown_status_is_terminal() {
        let api = ScriptedApi::statuses(&[TaskStatus::Other("ARCHIVED".into())]);
        let poller = TaskPoller::new(PollBudget::new(5, 0));
        let err = poller.wait_for_analysis(&api, TASK_ID).await.unwrap_err();
        assert!(matches!(err, BuildBreakerError::TaskFailed(ref s) if s == "ARCHIVED"));
    }

    #[tokio::test]
    async fn zero_attempts_issues_no_query() {
        let api = ScriptedApi::statuses(&[TaskStatus::Success]);
        let poller = TaskPoller::new(PollBudget::new(0, 0));
        let err = poller.wait_for_analysis(&api, TASK_ID).await.unwrap_err();
        assert!(matches!(err, BuildBreakerError::WaitLimitExceeded));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn transient_statuses_are_retried_until_success() {
        let api = ScriptedApi::statuses(&[
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Success,
        ]);
        let poller = TaskPoller::new(PollBudget::new(3, 1));
        let id = poller.wait_for_analysis(&api, TASK_ID).await.unwrap();
        assert_eq!(id, ANALYSIS_ID);
        assert_eq!(api.calls(), 3);
    }

    #[tokio::test]
    async fn query_errors_are_not_retried() {
        let api = ScriptedApi::failing(BuildBreakerError::Api {
            status: 503,
            message: "unavailable".into(),
        });
        let poller = TaskPoller::new(PollBudget::new(10, 0));
        let err = poller.wait_for_analysis(&api, TASK_ID).await.unwrap_err();
        assert!(matches!(err, BuildBreakerError::Api { status: 503, .. }));
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn success_without_analysis_id_is_malformed() {
        struct NoAnalysisId;
        impl SonarApi for NoAnalysisId {
            async fn task(&self, task_id: &str) -> Result<Task> {
                Ok(Task {
                    id: task_id.to_string(),
                    status: TaskStatus::Success,
                    analysis_id: None,
                })
            }
            async fn project_status(&self, _analysis_id: &str) -> Result<ProjectStatus> {
                unreachable!()
            }
        }
        let poller = TaskPoller::new(PollBudget::new(1, 0));
        let err = poller.wait_for_analysis(&NoAnalysisId, TASK_ID).await.unwrap_err();
        assert!(matches!(err, BuildBreakerError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn raised_interrupt_aborts_the_wait() {
        let api = ScriptedApi::statuses(&[TaskStatus::InProgress]);
        let (handle, interrupt) = Interrupt::pair();
        handle.raise();
        let poller = TaskPoller::with_interrupt(PollBudget::new(10, 60_000), interrupt);
        let err = poller.wait_for_analysis(&api, TASK_ID).await.unwrap_err();
        assert!(matches!(err, BuildBreakerError::Interrupted));
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn interrupt_during_sleep_aborts_the_wait() {
        let api = ScriptedApi::statuses(&[TaskStatus::Pending]);
        let (handle, interrupt) = Interrupt::pair();
        let poller = TaskPoller::with_interrupt(PollBudget::new(10, 60_000), interrupt);

        let raiser = tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            handle.raise();
        });

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            poller.wait_for_analysis(&api, TASK_ID),
        )
        .await
        .expect("poll should stop well before the interval elapses")
        .unwrap_err();
        assert!(matches!(err, BuildBreakerError::Interrupted));
        raiser.await.unwrap();
    }

    #[test]
    fn task_status_deserializes_unknown_values() {
        let status: TaskStatus = serde_json::from_str(r#""IN_PROGRESS""#).unwrap();
        assert_eq!(status, TaskStatus::InProgress);
        let status: TaskStatus = serde_json::from_str(r#""MYSTERY""#).unwrap();
        assert_eq!(status, TaskStatus::Other("MYSTERY".into()));
        assert!(!status.is_transient());
    }

    #[test]
    fn budget_bounds_total_wait() {
        let budget = PollBudget::new(30, 10_000);
        assert_eq!(budget.max_wait(), Duration::from_secs(300));
    }
}
