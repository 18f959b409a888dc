use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::error::SettlementError;
use crate::traits::IWorkflowEngine;
use crate::types::{DispatchOutcome, EngineStatus, WorkflowId, WorkflowSpec};

/// Engine status codes: 0 queued, 1 running, 2 completed, 3 failed.
const CODE_COMPLETED: i64 = 2;
const CODE_FAILED: i64 = 3;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DispatchResponse {
    accepted: bool,
    #[serde(default)]
    workflow_id: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResult {
    transaction: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    code: i64,
    #[serde(default)]
    result: Option<StatusResult>,
    #[serde(default)]
    error: Option<String>,
}

/// Workflow engine reached over HTTP.
///
/// - `POST {base}/workflows` with a [`WorkflowSpec`] body starts a job
/// - `GET {base}/workflows/{id}` reports `{code, result?, error?}`
pub struct HttpWorkflowEngine {
    client: reqwest::Client,
    base_url: String,
}

impl HttpWorkflowEngine {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SettlementError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn map_dispatch(response: DispatchResponse) -> Result<DispatchOutcome, SettlementError> {
    if !response.accepted {
        let reason = response
            .reason
            .unwrap_or_else(|| "dispatch not accepted".to_string());
        return Ok(DispatchOutcome::Rejected(reason));
    }
    match response.workflow_id {
        Some(id) if !id.is_empty() => Ok(DispatchOutcome::Accepted(WorkflowId(id))),
        _ => Err(SettlementError::Engine(
            "accepted dispatch carried no workflow id".into(),
        )),
    }
}

fn map_status(response: StatusResponse) -> EngineStatus {
    match response.code {
        CODE_COMPLETED => EngineStatus::Completed {
            transaction: response.result.and_then(|r| r.transaction),
        },
        code if code == CODE_FAILED || code < 0 => EngineStatus::Failed {
            detail: response
                .error
                .unwrap_or_else(|| format!("workflow failed with code {code}")),
        },
        _ => EngineStatus::InProgress,
    }
}

#[async_trait]
impl IWorkflowEngine for HttpWorkflowEngine {
    async fn dispatch(&self, spec: &WorkflowSpec) -> Result<DispatchOutcome, SettlementError> {
        let response: DispatchResponse = self
            .client
            .post(format!("{}/workflows", self.base_url))
            .json(spec)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        map_dispatch(response)
    }

    async fn status(&self, id: &WorkflowId) -> Result<EngineStatus, SettlementError> {
        let response: StatusResponse = self
            .client
            .get(format!("{}/workflows/{}", self.base_url, id))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(map_status(response))
    }

    fn engine_id(&self) -> &str {
        "http"
    }
}
