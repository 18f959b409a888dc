use std::sync::Arc;
use tollgate_core::WorkflowStatus;

use crate::error::SettlementError;
use crate::poller::PollerSupervisor;
use crate::traits::{IWorkflowEngine, IWorkflowStore};
use crate::types::{DispatchOutcome, TrackOutcome, WorkflowSpec, WorkflowTracking};

/// Starts settlement for verified payments, at most once per nonce.
#[derive(Clone)]
pub struct SettlementDispatcher {
    store: Arc<dyn IWorkflowStore>,
    engine: Arc<dyn IWorkflowEngine>,
    supervisor: PollerSupervisor,
}

impl SettlementDispatcher {
    pub fn new(
        store: Arc<dyn IWorkflowStore>,
        engine: Arc<dyn IWorkflowEngine>,
        supervisor: PollerSupervisor,
    ) -> Self {
        Self {
            store,
            engine,
            supervisor,
        }
    }

    pub fn supervisor(&self) -> &PollerSupervisor {
        &self.supervisor
    }

    /// Track `spec.nonce` and, if this call created the entry, hand the job
    /// to the engine and start polling it.
    ///
    /// An already-tracked nonce returns [`TrackOutcome::Existing`] without
    /// touching the engine, unless the entry belongs to another payer or
    /// network, or its settlement already failed. A refused or failed
    /// dispatch marks the entry FAILED and is returned as an error.
    pub async fn dispatch(&self, spec: WorkflowSpec) -> Result<TrackOutcome, SettlementError> {
        let nonce = spec.nonce;
        let entry = WorkflowTracking::pending(nonce, spec.network.clone(), spec.from);
        let outcome = self.store.track_if_absent(entry).await?;
        if let TrackOutcome::Existing(existing) = &outcome {
            check_existing(existing, &spec)?;
            tracing::debug!(%nonce, status = %existing.status, "nonce already tracked, not dispatching");
            return Ok(outcome);
        }

        match self.engine.dispatch(&spec).await {
            Ok(DispatchOutcome::Accepted(workflow_id)) => {
                let tracked = self
                    .store
                    .attach_workflow_id(nonce, workflow_id.clone())
                    .await?;
                self.supervisor.spawn(nonce, workflow_id.clone());
                tracing::info!(
                    %nonce,
                    %workflow_id,
                    network = %spec.network,
                    engine = self.engine.engine_id(),
                    "settlement workflow dispatched"
                );
                Ok(TrackOutcome::Created(tracked))
            }
            Ok(DispatchOutcome::Rejected(reason)) => {
                tracing::warn!(%nonce, %reason, "workflow engine rejected dispatch");
                self.fail(nonce, format!("dispatch rejected: {reason}")).await;
                Err(SettlementError::DispatchRejected(reason))
            }
            Err(e) => {
                tracing::error!(%nonce, error = %e, "workflow dispatch failed");
                self.fail(nonce, format!("dispatch failed: {e}")).await;
                Err(e)
            }
        }
    }

    async fn fail(&self, nonce: alloy_primitives::B256, reason: String) {
        if let Err(e) = self.store.mark_failed(nonce, reason).await {
            tracing::error!(%nonce, error = %e, "could not record dispatch failure");
        }
    }
}

/// An existing entry only vouches for the same payment. Nonces are chosen by
/// the client and are unique per `(from, nonce)` on-chain, not globally.
fn check_existing(existing: &WorkflowTracking, spec: &WorkflowSpec) -> Result<(), SettlementError> {
    if existing.payer != spec.from || existing.network != spec.network {
        tracing::warn!(
            nonce = %spec.nonce,
            tracked_payer = %existing.payer,
            payer = %spec.from,
            "nonce reused by a different payment"
        );
        return Err(SettlementError::NonceConflict(spec.nonce));
    }
    if existing.status == WorkflowStatus::Failed {
        let detail = existing.error.clone().unwrap_or_default();
        return Err(SettlementError::AlreadyFailed(spec.nonce, detail));
    }
    Ok(())
}
