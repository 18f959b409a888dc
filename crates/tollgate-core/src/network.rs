use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::CoreError;

/// Chain parameters for one supported network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network identifier used on the wire (e.g. `base-sepolia`).
    pub network: String,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Default settlement token (EIP-3009 capable).
    pub token: Address,
    /// Token EIP-712 domain name.
    pub token_name: String,
    /// Token EIP-712 domain version.
    pub token_version: String,
}

impl NetworkConfig {
    pub fn new(
        network: impl Into<String>,
        chain_id: u64,
        token: Address,
        token_name: impl Into<String>,
        token_version: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            chain_id,
            token,
            token_name: token_name.into(),
            token_version: token_version.into(),
        }
    }
}

/// Static lookup from network identifier to chain parameters.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    networks: BTreeMap<String, NetworkConfig>,
}

impl NetworkRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the Circle USDC deployments.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for config in default_networks() {
            registry.networks.insert(config.network.clone(), config);
        }
        registry
    }

    /// Add or replace a network. Returns the entry it replaced.
    pub fn register(&mut self, config: NetworkConfig) -> Result<Option<NetworkConfig>, CoreError> {
        if config.network.trim().is_empty() {
            return Err(CoreError::InvalidNetworkConfig(
                "network identifier must not be empty".into(),
            ));
        }
        if config.chain_id == 0 {
            return Err(CoreError::InvalidNetworkConfig(format!(
                "chain id for {} must be non-zero",
                config.network
            )));
        }
        tracing::debug!(network = %config.network, chain_id = config.chain_id, "registering network");
        Ok(self.networks.insert(config.network.clone(), config))
    }

    /// Look up a network by identifier.
    pub fn lookup(&self, network: &str) -> Option<&NetworkConfig> {
        self.networks.get(network)
    }

    /// Like [`lookup`](Self::lookup) but as a `Result`.
    pub fn require(&self, network: &str) -> Result<&NetworkConfig, CoreError> {
        self.lookup(network)
            .ok_or_else(|| CoreError::UnknownNetwork(network.to_string()))
    }

    /// All registered networks, ordered by identifier.
    pub fn networks(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.networks.values()
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

fn default_networks() -> Vec<NetworkConfig> {
    vec![
        NetworkConfig::new(
            "base",
            8453,
            address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
            "USD Coin",
            "2",
        ),
        NetworkConfig::new(
            "base-sepolia",
            84532,
            address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
            "USDC",
            "2",
        ),
        NetworkConfig::new(
            "avalanche",
            43114,
            address!("0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E"),
            "USD Coin",
            "2",
        ),
        NetworkConfig::new(
            "avalanche-fuji",
            43113,
            address!("0x5425890298aed601595a70AB815c96711a31Bc65"),
            "USD Coin",
            "2",
        ),
    ]
}
