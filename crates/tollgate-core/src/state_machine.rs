use std::fmt;

use crate::error::CoreError;

/// Lifecycle of a tracked settlement workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    /// Tracked locally; the external job has not reported progress yet.
    PendingExecution,
    /// The external engine reports the job as executing.
    Running,
    /// Settled on-chain. Final state.
    Completed,
    /// Settlement failed, was rejected, or timed out locally. Final state.
    Failed,
}

impl WorkflowStatus {
    /// Whether this is a final (terminal) state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PendingExecution => write!(f, "PENDING_EXECUTION"),
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Signals that drive workflow transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// The engine reports the job in progress.
    Started,
    /// The engine reports the job settled.
    Succeeded,
    /// The job failed, was rejected, or the local ceiling elapsed.
    Failed,
}

/// Workflow transition table.
///
/// Valid transitions:
/// - PendingExecution → Running (Started)
/// - PendingExecution → Failed (Failed): the job never started
/// - Running → Running (Started): repeated progress reports
/// - Running → Completed (Succeeded)
/// - Running → Failed (Failed)
///
/// Completed and Failed accept nothing.
pub struct WorkflowStateMachine;

impl WorkflowStateMachine {
    /// Attempt a state transition based on an event.
    /// Returns the new state on success, or an error for invalid transitions.
    pub fn transition(
        current: WorkflowStatus,
        event: WorkflowEvent,
    ) -> Result<WorkflowStatus, CoreError> {
        let new_state = match (current, event) {
            (WorkflowStatus::PendingExecution, WorkflowEvent::Started) => WorkflowStatus::Running,
            (WorkflowStatus::PendingExecution, WorkflowEvent::Failed) => WorkflowStatus::Failed,

            (WorkflowStatus::Running, WorkflowEvent::Started) => WorkflowStatus::Running,
            (WorkflowStatus::Running, WorkflowEvent::Succeeded) => WorkflowStatus::Completed,
            (WorkflowStatus::Running, WorkflowEvent::Failed) => WorkflowStatus::Failed,

            _ => {
                let target = match event {
                    WorkflowEvent::Started => WorkflowStatus::Running,
                    WorkflowEvent::Succeeded => WorkflowStatus::Completed,
                    WorkflowEvent::Failed => WorkflowStatus::Failed,
                };
                return Err(CoreError::InvalidStateTransition {
                    from: current,
                    to: target,
                });
            }
        };

        if new_state != current {
            tracing::debug!(
                from = %current,
                to = %new_state,
                event = ?event,
                "workflow state transition"
            );
        }

        Ok(new_state)
    }

    /// Check if a transition is valid without performing it.
    pub fn can_transition(current: WorkflowStatus, event: WorkflowEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}
