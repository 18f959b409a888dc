use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::error::SettlementError;
use crate::traits::IWorkflowEngine;
use crate::types::{DispatchOutcome, EngineStatus, WorkflowId, WorkflowSpec};

/// In-process workflow engine that replays scripted statuses.
///
/// Each accepted job gets a UUID v7 id and a queue of statuses. Every status
/// poll pops the front of the queue; the last status repeats forever, and a
/// job with an empty queue reports in-progress. Useful for tests and local
/// runs without a real engine.
#[derive(Default)]
pub struct ScriptedWorkflowEngine {
    scripts: DashMap<WorkflowId, VecDeque<EngineStatus>>,
    specs: DashMap<WorkflowId, WorkflowSpec>,
    default_script: Mutex<Vec<EngineStatus>>,
    rejection: Mutex<Option<String>>,
    unreachable: AtomicBool,
    dispatch_delay_ms: AtomicU64,
    failing_polls: AtomicUsize,
    dispatches: AtomicUsize,
    status_calls: AtomicUsize,
}

impl ScriptedWorkflowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine whose every new job follows `script`.
    pub fn with_default_script(script: Vec<EngineStatus>) -> Self {
        let engine = Self::new();
        engine.set_default_script(script);
        engine
    }

    pub fn set_default_script(&self, script: Vec<EngineStatus>) {
        *self.default_script.lock().unwrap_or_else(|e| e.into_inner()) = script;
    }

    /// Replace the remaining statuses of one job.
    pub fn script(&self, id: &WorkflowId, statuses: Vec<EngineStatus>) {
        self.scripts.insert(id.clone(), statuses.into());
    }

    /// Refuse future dispatches with `reason` (`None` accepts again).
    pub fn reject_dispatches(&self, reason: Option<String>) {
        *self.rejection.lock().unwrap_or_else(|e| e.into_inner()) = reason;
    }

    /// Make every call fail as if the engine were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn set_dispatch_delay(&self, delay: Duration) {
        self.dispatch_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Fail the next `n` status polls with a transient error.
    pub fn fail_status_polls(&self, n: usize) {
        self.failing_polls.store(n, Ordering::SeqCst);
    }

    /// Number of accepted or rejected dispatch calls.
    pub fn dispatch_count(&self) -> usize {
        self.dispatches.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Specs of accepted jobs.
    pub fn dispatched_specs(&self) -> Vec<WorkflowSpec> {
        self.specs.iter().map(|e| e.value().clone()).collect()
    }

    fn check_reachable(&self) -> Result<(), SettlementError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(SettlementError::Engine("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl IWorkflowEngine for ScriptedWorkflowEngine {
    async fn dispatch(&self, spec: &WorkflowSpec) -> Result<DispatchOutcome, SettlementError> {
        self.dispatches.fetch_add(1, Ordering::SeqCst);
        let delay = self.dispatch_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.check_reachable()?;

        let rejection = self
            .rejection
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(reason) = rejection {
            return Ok(DispatchOutcome::Rejected(reason));
        }

        let id = WorkflowId(format!("wf-{}", Uuid::now_v7()));
        let script = self
            .default_script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        self.scripts.insert(id.clone(), script.into());
        self.specs.insert(id.clone(), spec.clone());
        tracing::debug!(workflow_id = %id, nonce = %spec.nonce, "scripted workflow accepted");
        Ok(DispatchOutcome::Accepted(id))
    }

    async fn status(&self, id: &WorkflowId) -> Result<EngineStatus, SettlementError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        let failing = self
            .failing_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(SettlementError::Engine("status temporarily unavailable".into()));
        }

        let mut queue = self
            .scripts
            .get_mut(id)
            .ok_or_else(|| SettlementError::Engine(format!("unknown workflow {id}")))?;
        let status = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(status.unwrap_or(EngineStatus::InProgress))
    }

    fn engine_id(&self) -> &str {
        "scripted"
    }
}
