//! Tollgate settlement layer
//!
//! Tracks one settlement workflow per authorization nonce, hands the job to
//! an external workflow engine, polls it in the background, and answers
//! settle requests from the tracked state.

pub mod adapters;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod poller;
pub mod store;
pub mod sweeper;
pub mod traits;
pub mod types;

pub use adapters::{HttpWorkflowEngine, ScriptedWorkflowEngine};
pub use coordinator::{CoordinatorConfig, SettlementCoordinator};
pub use dispatcher::SettlementDispatcher;
pub use error::SettlementError;
pub use poller::{BackgroundPoller, PollerConfig, PollerSupervisor};
pub use store::InMemoryWorkflowStore;
pub use sweeper::{spawn_sweeper, SweeperConfig};
pub use traits::{IWorkflowEngine, IWorkflowStore};
pub use types::{
    DispatchOutcome, EngineStatus, SettlementResult, TrackOutcome, WorkflowId, WorkflowSpec,
    WorkflowTracking, WORKFLOW_KIND_EIP3009,
};
