use alloy_primitives::B256;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;
use tollgate_core::{WorkflowEvent, WorkflowStateMachine};

use crate::error::SettlementError;
use crate::traits::IWorkflowStore;
use crate::types::{SettlementResult, TrackOutcome, WorkflowId, WorkflowTracking};

/// Single-instance workflow store on a sharded concurrent map.
///
/// Insert-if-absent and every mutation run under the shard lock of the
/// nonce, with no await inside, so concurrent callers observe one winner.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    entries: DashMap<B256, WorkflowTracking>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply `f` to a copy of the entry and write it back only if `f` succeeds.
    fn update<F>(&self, nonce: B256, f: F) -> Result<WorkflowTracking, SettlementError>
    where
        F: FnOnce(&mut WorkflowTracking) -> Result<(), SettlementError>,
    {
        let mut slot = self
            .entries
            .get_mut(&nonce)
            .ok_or(SettlementError::NotTracked(nonce))?;
        let mut next = slot.clone();
        f(&mut next)?;
        next.updated_at = Utc::now();
        *slot = next.clone();
        Ok(next)
    }

    fn transition(
        &self,
        nonce: B256,
        event: WorkflowEvent,
        finish: impl FnOnce(&mut WorkflowTracking),
    ) -> Result<WorkflowTracking, SettlementError> {
        self.update(nonce, |entry| {
            entry.status = WorkflowStateMachine::transition(entry.status, event)?;
            finish(entry);
            Ok(())
        })
    }
}

#[async_trait]
impl IWorkflowStore for InMemoryWorkflowStore {
    async fn track_if_absent(&self, entry: WorkflowTracking) -> Result<TrackOutcome, SettlementError> {
        match self.entries.entry(entry.nonce) {
            Entry::Occupied(existing) => Ok(TrackOutcome::Existing(existing.get().clone())),
            Entry::Vacant(slot) => {
                tracing::debug!(nonce = %entry.nonce, network = %entry.network, "tracking workflow");
                slot.insert(entry.clone());
                Ok(TrackOutcome::Created(entry))
            }
        }
    }

    async fn attach_workflow_id(
        &self,
        nonce: B256,
        id: WorkflowId,
    ) -> Result<WorkflowTracking, SettlementError> {
        self.update(nonce, |entry| {
            if let Some(current) = &entry.workflow_id {
                if *current != id {
                    return Err(SettlementError::Store(format!(
                        "nonce {nonce} already bound to workflow {current}"
                    )));
                }
            }
            entry.workflow_id = Some(id);
            Ok(())
        })
    }

    async fn mark_running(&self, nonce: B256) -> Result<WorkflowTracking, SettlementError> {
        self.transition(nonce, WorkflowEvent::Started, |_| {})
    }

    async fn mark_completed(
        &self,
        nonce: B256,
        result: SettlementResult,
    ) -> Result<WorkflowTracking, SettlementError> {
        self.transition(nonce, WorkflowEvent::Succeeded, |entry| {
            entry.result = Some(result);
        })
    }

    async fn mark_failed(
        &self,
        nonce: B256,
        reason: String,
    ) -> Result<WorkflowTracking, SettlementError> {
        self.transition(nonce, WorkflowEvent::Failed, |entry| {
            entry.error = Some(reason);
        })
    }

    async fn get(&self, nonce: B256) -> Result<Option<WorkflowTracking>, SettlementError> {
        Ok(self.entries.get(&nonce).map(|e| e.clone()))
    }

    async fn sweep(&self, max_age: Duration) -> Result<usize, SettlementError> {
        let max_age =
            chrono::Duration::from_std(max_age).map_err(|e| SettlementError::Store(e.to_string()))?;
        let cutoff = Utc::now() - max_age;
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.started_at >= cutoff);
        Ok(before.saturating_sub(self.entries.len()))
    }
}
