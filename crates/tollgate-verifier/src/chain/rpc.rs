use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::IChainReader;
use crate::error::ChainError;

/// Ethereum JSON-RPC error code used by geth-style nodes for reverts.
const EXECUTION_REVERTED_CODE: i64 = 3;

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// [`IChainReader`] over HTTP JSON-RPC (`eth_getCode`, `eth_call` at `latest`).
pub struct JsonRpcChainReader {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcChainReader {
    /// Create a reader for the given RPC endpoint.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        let parsed: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ChainError::Transport(format!("malformed JSON-RPC response: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(classify_rpc_error(err));
        }
        parsed
            .result
            .ok_or_else(|| ChainError::Transport(format!("{method}: response has no result")))
    }
}

fn classify_rpc_error(err: RpcErrorObject) -> ChainError {
    if err.code == EXECUTION_REVERTED_CODE || err.message.to_lowercase().contains("revert") {
        ChainError::Reverted(err.message)
    } else {
        ChainError::Rpc {
            code: err.code,
            message: err.message,
        }
    }
}

#[async_trait]
impl IChainReader for JsonRpcChainReader {
    async fn get_code(&self, address: Address) -> Result<Bytes, ChainError> {
        self.request("eth_getCode", serde_json::json!([address, "latest"]))
            .await
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        tracing::trace!(%to, "eth_call");
        self.request(
            "eth_call",
            serde_json::json!([{ "to": to, "data": data }, "latest"]),
        )
        .await
    }
}
