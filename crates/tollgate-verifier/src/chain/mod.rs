//! Read-only chain access.
//!
//! The verifier needs exactly two view operations: fetch an account's
//! bytecode and run an `eth_call`. Everything else (domain separator,
//! EIP-1271, balances) is ABI encoding on top of [`IChainReader::call`].

mod memory;
mod rpc;

pub use memory::InMemoryChain;
pub use rpc::JsonRpcChainReader;

use alloy_primitives::{Address, Bytes};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ChainError;

/// Side-effect-free chain access for one network.
#[async_trait]
pub trait IChainReader: Send + Sync {
    /// Deployed bytecode at `address` (empty for private-key accounts).
    async fn get_code(&self, address: Address) -> Result<Bytes, ChainError>;

    /// Execute a view call against `to` with ABI-encoded `data`.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError>;
}

/// Encode `call`, run it against `to`, and decode the return value.
pub async fn read_contract<C: SolCall + Send + Sync>(
    reader: &dyn IChainReader,
    to: Address,
    call: &C,
) -> Result<C::Return, ChainError> {
    let output = reader.call(to, Bytes::from(call.abi_encode())).await?;
    C::abi_decode_returns(&output).map_err(|e| ChainError::Decode(e.to_string()))
}

/// Chain readers keyed by network identifier.
#[derive(Clone, Default)]
pub struct ChainReaders {
    readers: BTreeMap<String, Arc<dyn IChainReader>>,
}

impl ChainReaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the reader for a network, replacing any previous one.
    pub fn insert(&mut self, network: impl Into<String>, reader: Arc<dyn IChainReader>) {
        self.readers.insert(network.into(), reader);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, network: impl Into<String>, reader: Arc<dyn IChainReader>) -> Self {
        self.insert(network, reader);
        self
    }

    pub fn get(&self, network: &str) -> Option<Arc<dyn IChainReader>> {
        self.readers.get(network).cloned()
    }

    pub fn contains(&self, network: &str) -> bool {
        self.readers.contains_key(network)
    }

    /// Networks with a reader, ordered by identifier.
    pub fn networks(&self) -> impl Iterator<Item = &str> {
        self.readers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

impl std::fmt::Debug for ChainReaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainReaders")
            .field("networks", &self.readers.keys().collect::<Vec<_>>())
            .finish()
    }
}
