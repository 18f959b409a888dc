use crate::state_machine::WorkflowStatus;

/// Core protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid workflow transition from {from} to {to}")]
    InvalidStateTransition {
        from: WorkflowStatus,
        to: WorkflowStatus,
    },

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("invalid network config: {0}")]
    InvalidNetworkConfig(String),
}
