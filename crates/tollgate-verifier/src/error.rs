/// Failures talking to a chain node.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    #[error("chain transport error: {0}")]
    Transport(String),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error("could not decode contract response: {0}")]
    Decode(String),
}

impl ChainError {
    /// Whether the call reached the chain and the contract itself refused or
    /// returned garbage, as opposed to the node being unreachable.
    pub fn is_contract_failure(&self) -> bool {
        matches!(self, Self::Reverted(_) | Self::Decode(_))
    }
}

/// Verification infrastructure errors.
#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("no chain reader configured for network {0}")]
    NoChainReader(String),
}
