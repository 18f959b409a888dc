//! Service wiring and node lifecycle.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use tollgate_core::NetworkRegistry;
use tollgate_settlement::{
    spawn_sweeper, BackgroundPoller, HttpWorkflowEngine, IWorkflowEngine, IWorkflowStore,
    InMemoryWorkflowStore, PollerSupervisor, SettlementCoordinator, SettlementDispatcher,
};
use tollgate_verifier::{ChainReaders, JsonRpcChainReader, PaymentValidator};

use crate::api;
use crate::config::TollgateConfig;
use crate::facilitator::Facilitator;
use crate::state::NodeState;

/// Assemble the facilitator from its collaborators.
///
/// Returns the facilitator and the workflow store it tracks into.
pub fn build_facilitator(
    config: &TollgateConfig,
    registry: Arc<NetworkRegistry>,
    readers: ChainReaders,
    engine: Arc<dyn IWorkflowEngine>,
) -> (Facilitator, Arc<dyn IWorkflowStore>) {
    let store: Arc<dyn IWorkflowStore> = Arc::new(InMemoryWorkflowStore::new());
    let validator = PaymentValidator::new(registry, readers, config.validator_config());
    let poller = BackgroundPoller::new(store.clone(), engine.clone(), config.poller_config());
    let dispatcher =
        SettlementDispatcher::new(store.clone(), engine.clone(), PollerSupervisor::new(poller));
    let coordinator =
        SettlementCoordinator::new(store.clone(), engine, config.coordinator_config());
    let facilitator = Facilitator::new(validator, dispatcher, coordinator, store.clone());
    (facilitator, store)
}

/// A running Tollgate facilitator.
pub struct TollgateNode {
    config: TollgateConfig,
    state: Arc<NodeState>,
    store: Arc<dyn IWorkflowStore>,
    tasks: Vec<JoinHandle<()>>,
}

impl TollgateNode {
    /// Build the node from configuration: JSON-RPC readers for every network
    /// with an `rpc_url`, the HTTP workflow engine, and an in-memory tracker.
    pub fn new(config: TollgateConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let registry = config.registry()?;
        let rpc_timeout = Duration::from_secs(config.verification.rpc_timeout_secs);

        let mut readers = ChainReaders::new();
        for entry in &config.networks {
            let Some(url) = &entry.rpc_url else {
                tracing::warn!(network = %entry.name, "no rpc_url configured, network not served");
                continue;
            };
            let reader = JsonRpcChainReader::new(url.clone(), rpc_timeout)?;
            readers.insert(entry.name.clone(), Arc::new(reader));
            tracing::info!(network = %entry.name, rpc = %url, "chain reader configured");
        }
        if readers.is_empty() {
            anyhow::bail!("no network has an rpc_url; nothing to serve");
        }

        let engine = HttpWorkflowEngine::new(
            config.engine.url.clone(),
            Duration::from_secs(config.engine.request_timeout_secs),
        )?;
        tracing::info!(url = %engine.base_url(), "workflow engine configured");

        let (facilitator, store) =
            build_facilitator(&config, Arc::new(registry), readers, Arc::new(engine));
        Ok(Self {
            config,
            state: Arc::new(NodeState::new(facilitator)),
            store,
            tasks: Vec::new(),
        })
    }

    pub fn state(&self) -> Arc<NodeState> {
        self.state.clone()
    }

    /// Start the tracker sweeper.
    pub fn start(&mut self) {
        let sweeper = spawn_sweeper(self.store.clone(), self.config.sweeper_config());
        self.tasks.push(sweeper);
    }

    /// Serve the HTTP API until it fails.
    pub async fn run(&self) -> anyhow::Result<()> {
        let addr = self.config.api_addr()?;
        api::start_api_server(addr, self.state.clone()).await
    }

    /// Stop background work. In-flight external workflows are left running.
    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        let stopped = self.state.facilitator.shutdown();
        tracing::info!(pollers = stopped, "node stopped");
        Ok(())
    }
}
