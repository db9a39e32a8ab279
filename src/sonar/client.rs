use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{ProjectStatus, ProjectStatusResponse, Task, TaskResponse};
use super::{Connector, SonarApi};
use crate::config::Credentials;
use crate::error::{BuildBreakerError, Result};

const TASK_PATH: &str = "api/ce/task";
const PROJECT_STATUS_PATH: &str = "api/qualitygates/project_status";

/// HTTP client for a single server.
#[derive(Debug, Clone)]
pub struct SonarClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl SonarClient {
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let request = self.client.get(format!("{}/{path}", self.base_url));
        match &self.credentials.login {
            Some(login) => request.basic_auth(login, self.credentials.password.as_deref()),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.header("accept", "application/json").send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(BuildBreakerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| BuildBreakerError::MalformedResponse(e.to_string()))
    }
}

impl SonarApi for SonarClient {
    async fn task(&self, task_id: &str) -> Result<Task> {
        debug!(task_id, "Querying report processing task");
        let body: TaskResponse = self
            .send(self.get(TASK_PATH).query(&[("id", task_id)]))
            .await?;
        Ok(body.task)
    }

    async fn project_status(&self, analysis_id: &str) -> Result<ProjectStatus> {
        debug!(analysis_id, "Requesting quality gate status");
        let body: ProjectStatusResponse = self
            .send(
                self.get(PROJECT_STATUS_PATH)
                    .query(&[("analysisId", analysis_id)]),
            )
            .await?;
        Ok(body.project_status)
    }
}

/// Connects [`SonarClient`]s with a fixed set of credentials.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    credentials: Credentials,
}

impl HttpConnector {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl Connector for HttpConnector {
    type Api = SonarClient;

    fn connect(&self, server_url: &str) -> Result<SonarClient> {
        SonarClient::new(server_url, self.credentials.clone())
    }
}
