use alloy_primitives::B256;
use async_trait::async_trait;
use std::time::Duration;

use crate::error::SettlementError;
use crate::types::{
    DispatchOutcome, EngineStatus, SettlementResult, TrackOutcome, WorkflowId, WorkflowSpec,
    WorkflowTracking,
};

/// External workflow-execution service.
///
/// Implementations start settlement jobs and report their progress; they
/// never block until the job finishes.
#[async_trait]
pub trait IWorkflowEngine: Send + Sync {
    /// Submit a job. A refusal is `Ok(DispatchOutcome::Rejected)`, not an error.
    async fn dispatch(&self, spec: &WorkflowSpec) -> Result<DispatchOutcome, SettlementError>;

    /// Current status of a previously accepted job.
    async fn status(&self, id: &WorkflowId) -> Result<EngineStatus, SettlementError>;

    /// Short identifier used in logs (e.g. "http").
    fn engine_id(&self) -> &str;
}

/// Store of tracked workflows, keyed by authorization nonce.
///
/// Every mutation goes through the workflow state machine; an illegal
/// transition returns [`SettlementError::State`] and leaves the entry as it
/// was.
#[async_trait]
pub trait IWorkflowStore: Send + Sync {
    /// Insert `entry` unless its nonce is already tracked. Atomic.
    async fn track_if_absent(&self, entry: WorkflowTracking) -> Result<TrackOutcome, SettlementError>;

    async fn attach_workflow_id(
        &self,
        nonce: B256,
        id: WorkflowId,
    ) -> Result<WorkflowTracking, SettlementError>;

    async fn mark_running(&self, nonce: B256) -> Result<WorkflowTracking, SettlementError>;

    async fn mark_completed(
        &self,
        nonce: B256,
        result: SettlementResult,
    ) -> Result<WorkflowTracking, SettlementError>;

    async fn mark_failed(
        &self,
        nonce: B256,
        reason: String,
    ) -> Result<WorkflowTracking, SettlementError>;

    async fn get(&self, nonce: B256) -> Result<Option<WorkflowTracking>, SettlementError>;

    /// Drop entries started more than `max_age` ago. Returns how many went.
    async fn sweep(&self, max_age: Duration) -> Result<usize, SettlementError>;
}
