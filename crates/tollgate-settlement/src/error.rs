use alloy_primitives::B256;
use tollgate_core::CoreError;

/// Settlement-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("no workflow tracked for nonce {0}")]
    NotTracked(B256),

    #[error("nonce {0} is already tracked for a different payment")]
    NonceConflict(B256),

    #[error("settlement for nonce {0} already failed: {1}")]
    AlreadyFailed(B256, String),

    #[error(transparent)]
    State(#[from] CoreError),

    #[error("workflow engine rejected dispatch: {0}")]
    DispatchRejected(String),

    #[error("workflow engine error: {0}")]
    Engine(String),

    #[error("workflow store error: {0}")]
    Store(String),
}

impl From<reqwest::Error> for SettlementError {
    fn from(err: reqwest::Error) -> Self {
        SettlementError::Engine(err.to_string())
    }
}
