//! Background polling of dispatched workflows.
//!
//! One [`BackgroundPoller`] task runs per dispatched job. It asks the engine
//! for the job status every interval and records what it learns until the
//! entry is terminal or the local ceiling elapses. [`PollerSupervisor`] owns
//! the abort handles so pollers can be cancelled locally (the external job
//! keeps running) and stopped on shutdown.

use alloy_primitives::B256;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tollgate_core::WorkflowStatus;

use crate::error::SettlementError;
use crate::traits::{IWorkflowEngine, IWorkflowStore};
use crate::types::{EngineStatus, SettlementResult, WorkflowId, WorkflowTracking};

/// Poll cadence and local ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub ceiling: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            ceiling: Duration::from_secs(60),
        }
    }
}

pub(crate) const COMPLETED_WITHOUT_TX: &str = "workflow completed without a transaction reference";

/// Record an engine-reported status on the tracked entry.
///
/// Terminal statuses observed while PENDING_EXECUTION go through RUNNING
/// first. If another writer already drove the entry to a terminal state, that
/// entry is returned instead of an error.
pub(crate) async fn record_status(
    store: &dyn IWorkflowStore,
    nonce: B256,
    current: WorkflowStatus,
    status: &EngineStatus,
) -> Result<WorkflowTracking, SettlementError> {
    let applied = apply(store, nonce, current, status).await;
    match applied {
        Err(SettlementError::State(err)) => match store.get(nonce).await? {
            Some(entry) if entry.is_terminal() => Ok(entry),
            _ => Err(SettlementError::State(err)),
        },
        other => other,
    }
}

async fn apply(
    store: &dyn IWorkflowStore,
    nonce: B256,
    current: WorkflowStatus,
    status: &EngineStatus,
) -> Result<WorkflowTracking, SettlementError> {
    if status.is_terminal() && current == WorkflowStatus::PendingExecution {
        store.mark_running(nonce).await?;
    }
    match status {
        EngineStatus::InProgress => store.mark_running(nonce).await,
        EngineStatus::Completed {
            transaction: Some(tx),
        } => {
            store
                .mark_completed(nonce, SettlementResult { transaction: tx.clone() })
                .await
        }
        EngineStatus::Completed { transaction: None } => {
            store.mark_failed(nonce, COMPLETED_WITHOUT_TX.to_string()).await
        }
        EngineStatus::Failed { detail } => store.mark_failed(nonce, detail.clone()).await,
    }
}

/// Polls one workflow until it settles, fails, or the ceiling elapses.
#[derive(Clone)]
pub struct BackgroundPoller {
    store: Arc<dyn IWorkflowStore>,
    engine: Arc<dyn IWorkflowEngine>,
    config: PollerConfig,
}

impl BackgroundPoller {
    pub fn new(
        store: Arc<dyn IWorkflowStore>,
        engine: Arc<dyn IWorkflowEngine>,
        config: PollerConfig,
    ) -> Self {
        Self {
            store,
            engine,
            config,
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Poll until terminal. Never returns an error; faults are logged and
    /// stay with this nonce.
    pub async fn run(&self, nonce: B256, workflow_id: WorkflowId) {
        let deadline = Instant::now() + self.config.ceiling;
        tracing::debug!(%nonce, %workflow_id, "poller started");

        loop {
            tokio::time::sleep(self.config.interval).await;

            if self.tick(nonce, &workflow_id).await {
                return;
            }

            if Instant::now() >= deadline {
                let reason = format!(
                    "workflow {} did not finish within {}s",
                    workflow_id,
                    self.config.ceiling.as_secs()
                );
                match self.store.mark_failed(nonce, reason).await {
                    Ok(_) => tracing::warn!(%nonce, %workflow_id, "polling ceiling reached, marked failed"),
                    Err(e) => tracing::debug!(%nonce, error = %e, "ceiling reached on settled entry"),
                }
                return;
            }
        }
    }

    /// One poll. Returns `true` when polling should stop.
    async fn tick(&self, nonce: B256, workflow_id: &WorkflowId) -> bool {
        let entry = match self.store.get(nonce).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                tracing::debug!(%nonce, "entry swept, poller exiting");
                return true;
            }
            Err(e) => {
                tracing::warn!(%nonce, error = %e, "store read failed, retrying");
                return false;
            }
        };
        if entry.is_terminal() {
            return true;
        }

        let status = match self.engine.status(workflow_id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(%nonce, %workflow_id, error = %e, "status poll failed, retrying");
                return false;
            }
        };

        match record_status(self.store.as_ref(), nonce, entry.status, &status).await {
            Ok(updated) if updated.is_terminal() => {
                tracing::info!(
                    %nonce,
                    %workflow_id,
                    status = %updated.status,
                    transaction = ?updated.result.as_ref().map(|r| &r.transaction),
                    "workflow finished"
                );
                true
            }
            Ok(_) => false,
            Err(SettlementError::NotTracked(_)) => true,
            Err(e) => {
                tracing::warn!(%nonce, error = %e, "could not record workflow status");
                false
            }
        }
    }
}

/// Removes the supervisor's handle when the poller task ends, however it ends.
struct Deregister {
    handles: Arc<DashMap<B256, AbortHandle>>,
    nonce: B256,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        self.handles.remove(&self.nonce);
    }
}

/// Owns the running pollers, one per nonce.
#[derive(Clone)]
pub struct PollerSupervisor {
    poller: BackgroundPoller,
    handles: Arc<DashMap<B256, AbortHandle>>,
}

impl PollerSupervisor {
    pub fn new(poller: BackgroundPoller) -> Self {
        Self {
            poller,
            handles: Arc::new(DashMap::new()),
        }
    }

    /// Start polling `workflow_id` for `nonce`. Returns `false` if a poller is
    /// already running for the nonce.
    pub fn spawn(&self, nonce: B256, workflow_id: WorkflowId) -> bool {
        let (start_tx, start_rx) = oneshot::channel::<()>();
        match self.handles.entry(nonce) {
            Entry::Occupied(_) => {
                tracing::debug!(%nonce, "poller already running");
                return false;
            }
            Entry::Vacant(slot) => {
                let poller = self.poller.clone();
                let handles = self.handles.clone();
                // `spawn` may drop the future while this shard is locked; the
                // deregister guard only exists once the task has started.
                let task = tokio::spawn(async move {
                    if start_rx.await.is_err() {
                        return;
                    }
                    let _guard = Deregister { handles, nonce };
                    poller.run(nonce, workflow_id).await;
                });
                slot.insert(task.abort_handle());
            }
        }
        // The handle is registered before the task may deregister it.
        let _ = start_tx.send(());
        true
    }

    /// Stop local polling for `nonce`. The external job is not touched.
    pub fn cancel(&self, nonce: B256) -> bool {
        match self.handles.remove(&nonce) {
            Some((_, handle)) => {
                handle.abort();
                tracing::info!(%nonce, "poller cancelled");
                true
            }
            None => false,
        }
    }

    /// Abort every running poller. Returns how many were stopped.
    pub fn shutdown(&self) -> usize {
        let nonces: Vec<B256> = self.handles.iter().map(|e| *e.key()).collect();
        let stopped = nonces.into_iter().filter(|n| self.cancel(*n)).count();
        tracing::info!(stopped, "pollers shut down");
        stopped
    }

    pub fn is_polling(&self, nonce: B256) -> bool {
        self.handles.contains_key(&nonce)
    }

    pub fn active(&self) -> usize {
        self.handles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ScriptedWorkflowEngine;
    use crate::store::InMemoryWorkflowStore;
    use crate::types::{DispatchOutcome, WorkflowSpec};
    use alloy_primitives::Address;

    fn fast() -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(10),
            ceiling: Duration::from_millis(300),
        }
    }

    async fn tracked(store: &InMemoryWorkflowStore, byte: u8, id: &str) -> B256 {
        let nonce = B256::repeat_byte(byte);
        store
            .track_if_absent(WorkflowTracking::pending(nonce, "base-sepolia", Address::ZERO))
            .await
            .unwrap();
        store.attach_workflow_id(nonce, id.into()).await.unwrap();
        nonce
    }

    async fn wait_terminal(store: &InMemoryWorkflowStore, nonce: B256) -> WorkflowTracking {
        for _ in 0..200 {
            let entry = store.get(nonce).await.unwrap().unwrap();
            if entry.is_terminal() {
                return entry;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("workflow {nonce} never reached a terminal state");
    }

    async fn dispatched(engine: &ScriptedWorkflowEngine) -> WorkflowId {
        let spec = WorkflowSpec {
            kind: "test".into(),
            network: "base-sepolia".into(),
            chain_id: 84532,
            token: Address::ZERO,
            from: Address::ZERO,
            to: Address::ZERO,
            value: Default::default(),
            valid_after: Default::default(),
            valid_before: Default::default(),
            nonce: B256::ZERO,
            signature: Default::default(),
        };
        match engine.dispatch(&spec).await.unwrap() {
            DispatchOutcome::Accepted(id) => id,
            DispatchOutcome::Rejected(reason) => panic!("rejected: {reason}"),
        }
    }

    #[test]
    fn test_spawn_on_stopped_runtime_returns() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let handle = runtime.handle().clone();
        drop(runtime);

        let store = Arc::new(InMemoryWorkflowStore::new());
        let engine = Arc::new(ScriptedWorkflowEngine::new());
        let supervisor = PollerSupervisor::new(BackgroundPoller::new(store, engine, fast()));

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _enter = handle.enter();
            supervisor.spawn(B256::repeat_byte(9), WorkflowId::from("wf-9"));
            let _ = done_tx.send(());
        });
        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[tokio::test]
    async fn test_poller_drives_to_completed() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let engine = Arc::new(ScriptedWorkflowEngine::new());
        let id = dispatched(&engine).await;
        engine.script(
            &id,
            vec![
                EngineStatus::InProgress,
                EngineStatus::InProgress,
                EngineStatus::Completed {
                    transaction: Some("0xfeed".into()),
                },
            ],
        );
        let nonce = tracked(&store, 1, id.as_str()).await;

        let supervisor =
            PollerSupervisor::new(BackgroundPoller::new(store.clone(), engine.clone(), fast()));
        assert!(supervisor.spawn(nonce, id.clone()));
        assert!(!supervisor.spawn(nonce, id));

        let entry = wait_terminal(&store, nonce).await;
        assert_eq!(entry.status, WorkflowStatus::Completed);
        assert_eq!(entry.result.unwrap().transaction, "0xfeed");

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(supervisor.active(), 0);
    }

    #[tokio::test]
    async fn test_poller_records_failure() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let engine = Arc::new(ScriptedWorkflowEngine::new());
        let id = dispatched(&engine).await;
        engine.script(
            &id,
            vec![EngineStatus::Failed {
                detail: "authorization already used".into(),
            }],
        );
        let nonce = tracked(&store, 2, id.as_str()).await;

        BackgroundPoller::new(store.clone(), engine.clone(), fast())
            .run(nonce, id)
            .await;
        let entry = store.get(nonce).await.unwrap().unwrap();
        assert_eq!(entry.status, WorkflowStatus::Failed);
        assert_eq!(entry.error.as_deref(), Some("authorization already used"));
    }

    #[tokio::test]
    async fn test_completed_without_transaction_is_failure() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let engine = Arc::new(ScriptedWorkflowEngine::new());
        let id = dispatched(&engine).await;
        engine.script(&id, vec![EngineStatus::Completed { transaction: None }]);
        let nonce = tracked(&store, 3, id.as_str()).await;

        BackgroundPoller::new(store.clone(), engine.clone(), fast())
            .run(nonce, id)
            .await;
        let entry = store.get(nonce).await.unwrap().unwrap();
        assert_eq!(entry.status, WorkflowStatus::Failed);
        assert_eq!(entry.error.as_deref(), Some(COMPLETED_WITHOUT_TX));
    }

    #[tokio::test]
    async fn test_ceiling_marks_failed() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let engine = Arc::new(ScriptedWorkflowEngine::new());
        let id = dispatched(&engine).await;
        let nonce = tracked(&store, 4, id.as_str()).await;

        let config = PollerConfig {
            interval: Duration::from_millis(10),
            ceiling: Duration::from_millis(50),
        };
        BackgroundPoller::new(store.clone(), engine.clone(), config)
            .run(nonce, id)
            .await;
        let entry = store.get(nonce).await.unwrap().unwrap();
        assert_eq!(entry.status, WorkflowStatus::Failed);
        assert!(entry.error.unwrap().contains("did not finish"));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let engine = Arc::new(ScriptedWorkflowEngine::new());
        let id = dispatched(&engine).await;
        engine.fail_status_polls(2);
        engine.script(
            &id,
            vec![EngineStatus::Completed {
                transaction: Some("0xbeef".into()),
            }],
        );
        let nonce = tracked(&store, 5, id.as_str()).await;

        BackgroundPoller::new(store.clone(), engine.clone(), fast())
            .run(nonce, id)
            .await;
        let entry = store.get(nonce).await.unwrap().unwrap();
        assert_eq!(entry.status, WorkflowStatus::Completed);
        assert!(engine.status_calls() >= 3);
    }

    #[tokio::test]
    async fn test_swept_entry_stops_poller() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let engine = Arc::new(ScriptedWorkflowEngine::new());
        let id = dispatched(&engine).await;
        let nonce = tracked(&store, 6, id.as_str()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.sweep(Duration::ZERO).await.unwrap();

        BackgroundPoller::new(store.clone(), engine.clone(), fast())
            .run(nonce, id)
            .await;
        assert_eq!(engine.status_calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_and_shutdown() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let engine = Arc::new(ScriptedWorkflowEngine::new());
        let supervisor = PollerSupervisor::new(BackgroundPoller::new(
            store.clone(),
            engine.clone(),
            PollerConfig {
                interval: Duration::from_millis(10),
                ceiling: Duration::from_secs(60),
            },
        ));

        let a = dispatched(&engine).await;
        let b = dispatched(&engine).await;
        let na = tracked(&store, 7, a.as_str()).await;
        let nb = tracked(&store, 8, b.as_str()).await;
        supervisor.spawn(na, a);
        supervisor.spawn(nb, b);
        assert_eq!(supervisor.active(), 2);

        assert!(supervisor.cancel(na));
        assert!(!supervisor.cancel(na));
        assert!(!supervisor.is_polling(na));

        assert_eq!(supervisor.shutdown(), 1);
        assert_eq!(supervisor.active(), 0);

        // Cancelling polling leaves the tracked entry alone.
        let entry = store.get(na).await.unwrap().unwrap();
        assert!(!entry.is_terminal());
    }
}
