//! Node configuration loading and management.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tollgate_core::{NetworkConfig, NetworkRegistry};
use tollgate_settlement::{CoordinatorConfig, PollerConfig, SweeperConfig};
use tollgate_verifier::{DomainSource, ValidatorConfig};

/// Full configuration for the Tollgate node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TollgateConfig {
    /// HTTP API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Workflow engine endpoint.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Background and settle-time polling.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Tracker retention.
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Verification policy.
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Served networks. Entries named after a built-in network override only
    /// the fields they set.
    #[serde(default = "default_networks")]
    pub networks: Vec<NetworkEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API listen address.
    #[serde(default = "default_api_addr")]
    pub listen_addr: String,
    /// API port.
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the workflow engine HTTP API.
    #[serde(default = "default_engine_url")]
    pub url: String,
    /// Per-request timeout, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Background poll interval.
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    /// Background polling gives up (and marks FAILED) after this long.
    #[serde(default = "default_poll_ceiling_secs")]
    pub ceiling_secs: u64,
    /// How long `/settle` waits for an in-flight workflow.
    #[serde(default = "default_settle_wait_secs")]
    pub settle_wait_secs: u64,
    /// Poll interval while `/settle` waits.
    #[serde(default = "default_settle_poll_interval_ms")]
    pub settle_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Entries older than this are swept.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// `contract` reads DOMAIN_SEPARATOR() from the token, `local` recomputes it.
    #[serde(default)]
    pub domain_source: DomainSource,
    /// Minimum remaining authorization lifetime, in seconds.
    #[serde(default = "default_min_validity_window_secs")]
    pub min_validity_window_secs: u64,
    /// JSON-RPC request timeout, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub rpc_timeout_secs: u64,
}

/// One served network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEntry {
    pub name: String,
    /// JSON-RPC endpoint. Networks without one are not served.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_version: Option<String>,
}

// Default value functions
fn default_api_addr() -> String {
    "127.0.0.1".into()
}
fn default_api_port() -> u16 {
    4021
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_engine_url() -> String {
    "http://127.0.0.1:8080".into()
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_poll_interval_ms() -> u64 {
    2_000
}
fn default_poll_ceiling_secs() -> u64 {
    60
}
fn default_settle_wait_secs() -> u64 {
    30
}
fn default_settle_poll_interval_ms() -> u64 {
    1_000
}
fn default_max_age_secs() -> u64 {
    3_600
}
fn default_sweep_interval_secs() -> u64 {
    300
}
fn default_min_validity_window_secs() -> u64 {
    6
}
fn default_networks() -> Vec<NetworkEntry> {
    vec![NetworkEntry {
        name: "base-sepolia".into(),
        rpc_url: Some("https://sepolia.base.org".into()),
        ..NetworkEntry::default()
    }]
}

impl Default for TollgateConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
            engine: EngineConfig::default(),
            polling: PollingConfig::default(),
            tracker: TrackerConfig::default(),
            verification: VerificationConfig::default(),
            networks: default_networks(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_api_addr(),
            port: default_api_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: default_engine_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            ceiling_secs: default_poll_ceiling_secs(),
            settle_wait_secs: default_settle_wait_secs(),
            settle_poll_interval_ms: default_settle_poll_interval_ms(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            domain_source: DomainSource::default(),
            min_validity_window_secs: default_min_validity_window_secs(),
            rpc_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl TollgateConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: TollgateConfig = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject settings the services cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let non_zero = [
            ("engine.request_timeout_secs", self.engine.request_timeout_secs),
            ("polling.interval_ms", self.polling.interval_ms),
            ("polling.ceiling_secs", self.polling.ceiling_secs),
            ("polling.settle_poll_interval_ms", self.polling.settle_poll_interval_ms),
            ("tracker.max_age_secs", self.tracker.max_age_secs),
            ("tracker.sweep_interval_secs", self.tracker.sweep_interval_secs),
            ("verification.rpc_timeout_secs", self.verification.rpc_timeout_secs),
        ];
        if let Some((name, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            anyhow::bail!("{name} must be greater than zero");
        }
        Ok(())
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn api_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.api.listen_addr, self.api.port).parse()?)
    }

    /// Built-in networks merged with the configured entries.
    pub fn registry(&self) -> anyhow::Result<NetworkRegistry> {
        let mut registry = NetworkRegistry::with_defaults();
        for entry in &self.networks {
            let merged = match registry.lookup(&entry.name) {
                Some(base) => NetworkConfig {
                    network: base.network.clone(),
                    chain_id: entry.chain_id.unwrap_or(base.chain_id),
                    token: entry.token.unwrap_or(base.token),
                    token_name: entry.token_name.clone().unwrap_or_else(|| base.token_name.clone()),
                    token_version: entry
                        .token_version
                        .clone()
                        .unwrap_or_else(|| base.token_version.clone()),
                },
                None => NetworkConfig {
                    network: entry.name.clone(),
                    chain_id: entry.chain_id.ok_or_else(|| {
                        anyhow::anyhow!("network {} needs a chain_id", entry.name)
                    })?,
                    token: entry
                        .token
                        .ok_or_else(|| anyhow::anyhow!("network {} needs a token", entry.name))?,
                    token_name: entry.token_name.clone().ok_or_else(|| {
                        anyhow::anyhow!("network {} needs a token_name", entry.name)
                    })?,
                    token_version: entry.token_version.clone().ok_or_else(|| {
                        anyhow::anyhow!("network {} needs a token_version", entry.name)
                    })?,
                },
            };
            registry.register(merged)?;
        }
        Ok(registry)
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            min_validity_window_secs: self.verification.min_validity_window_secs,
            domain_source: self.verification.domain_source,
        }
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(self.polling.interval_ms),
            ceiling: Duration::from_secs(self.polling.ceiling_secs),
        }
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            wait_budget: Duration::from_secs(self.polling.settle_wait_secs),
            poll_interval: Duration::from_millis(self.polling.settle_poll_interval_ms),
        }
    }

    pub fn sweeper_config(&self) -> SweeperConfig {
        SweeperConfig {
            interval: Duration::from_secs(self.tracker.sweep_interval_secs),
            max_age: Duration::from_secs(self.tracker.max_age_secs),
        }
    }
}
