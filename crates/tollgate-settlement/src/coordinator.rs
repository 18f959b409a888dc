use alloy_primitives::{Address, B256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tollgate_core::{SettleErrorReason, SettleResponse, WorkflowStatus};

use crate::error::SettlementError;
use crate::poller::record_status;
use crate::traits::{IWorkflowEngine, IWorkflowStore};
use crate::types::WorkflowTracking;

/// How long a settle request may wait for an in-flight workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub wait_budget: Duration,
    pub poll_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            wait_budget: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Answers settle requests from tracked workflow state.
#[derive(Clone)]
pub struct SettlementCoordinator {
    store: Arc<dyn IWorkflowStore>,
    engine: Arc<dyn IWorkflowEngine>,
    config: CoordinatorConfig,
}

impl SettlementCoordinator {
    pub fn new(
        store: Arc<dyn IWorkflowStore>,
        engine: Arc<dyn IWorkflowEngine>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            engine,
            config,
        }
    }

    /// Settlement outcome for `nonce`, as paid by `payer`.
    ///
    /// Terminal entries answer immediately. In-flight entries are polled
    /// against the engine until terminal or the wait budget runs out. An
    /// entry tracked for a different payer is reported as untracked.
    pub async fn settle(&self, nonce: B256, payer: Address) -> SettleResponse {
        match self.await_terminal(nonce, payer).await {
            Ok(Some(entry)) => respond(&entry),
            Ok(None) => {
                tracing::info!(%nonce, "settle for untracked nonce");
                SettleResponse::failed(SettleErrorReason::NoWorkflowTracked, None)
            }
            Err(Wait::Timeout(status)) => {
                tracing::warn!(%nonce, %status, "settle wait budget exhausted");
                SettleResponse::failed(
                    SettleErrorReason::WorkflowTimeout,
                    Some(format!(
                        "workflow still {} after {}s",
                        status,
                        self.config.wait_budget.as_secs()
                    )),
                )
            }
            Err(Wait::Store(e)) => {
                tracing::error!(%nonce, error = %e, "settle failed");
                SettleResponse::failed(SettleErrorReason::UnexpectedSettleError, Some(e.to_string()))
            }
        }
    }

    async fn await_terminal(
        &self,
        nonce: B256,
        payer: Address,
    ) -> Result<Option<WorkflowTracking>, Wait> {
        let deadline = Instant::now() + self.config.wait_budget;
        let Some(mut entry) = self.store.get(nonce).await? else {
            return Ok(None);
        };
        if entry.payer != payer {
            tracing::warn!(%nonce, tracked_payer = %entry.payer, %payer, "settle for nonce tracked under another payer");
            return Ok(None);
        }

        loop {
            if entry.is_terminal() {
                return Ok(Some(entry));
            }

            // Without a workflow id the dispatch is still in flight; only the
            // tracker can tell us more.
            if let Some(workflow_id) = entry.workflow_id.clone() {
                match self.engine.status(&workflow_id).await {
                    Ok(status) => {
                        match record_status(self.store.as_ref(), nonce, entry.status, &status).await {
                            Ok(updated) => {
                                entry = updated;
                                if entry.is_terminal() {
                                    return Ok(Some(entry));
                                }
                            }
                            Err(SettlementError::NotTracked(_)) => return Ok(None),
                            Err(e) => return Err(Wait::Store(e)),
                        }
                    }
                    Err(e) => {
                        tracing::warn!(%nonce, %workflow_id, error = %e, "status poll failed during settle");
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Wait::Timeout(entry.status));
            }
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;

            match self.store.get(nonce).await? {
                Some(latest) => entry = latest,
                None => return Ok(None),
            }
        }
    }
}

enum Wait {
    Timeout(WorkflowStatus),
    Store(SettlementError),
}

impl From<SettlementError> for Wait {
    fn from(err: SettlementError) -> Self {
        Wait::Store(err)
    }
}

fn respond(entry: &WorkflowTracking) -> SettleResponse {
    match (entry.status, &entry.result) {
        (WorkflowStatus::Completed, Some(result)) => SettleResponse::settled(
            result.transaction.clone(),
            entry.network.clone(),
            entry.payer,
        ),
        (WorkflowStatus::Completed, None) => SettleResponse::failed(
            SettleErrorReason::UnexpectedSettleError,
            Some("completed workflow has no recorded transaction".into()),
        ),
        _ => SettleResponse::failed(SettleErrorReason::WorkflowFailed, entry.error.clone()),
    }
}
