use alloy_primitives::{Address, Bytes, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tollgate_core::types::u256_decimal;
use tollgate_core::{PaymentPayload, WorkflowStatus};

/// Workflow kind understood by the engine for EIP-3009 settlement.
pub const WORKFLOW_KIND_EIP3009: &str = "eip3009-transfer-with-authorization";

/// Identifier the external engine assigns to a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for WorkflowId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for WorkflowId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// On-chain outcome of a completed workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementResult {
    /// Transaction hash (or engine-specific settlement reference).
    pub transaction: String,
}

/// Tracked state of one settlement job, keyed by authorization nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTracking {
    pub nonce: B256,
    pub workflow_id: Option<WorkflowId>,
    pub status: WorkflowStatus,
    pub network: String,
    pub payer: Address,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result: Option<SettlementResult>,
    /// Failure detail once FAILED.
    pub error: Option<String>,
}

impl WorkflowTracking {
    /// A fresh entry in PENDING_EXECUTION.
    pub fn pending(nonce: B256, network: impl Into<String>, payer: Address) -> Self {
        let now = Utc::now();
        Self {
            nonce,
            workflow_id: None,
            status: WorkflowStatus::PendingExecution,
            network: network.into(),
            payer,
            started_at: now,
            updated_at: now,
            result: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Result of an atomic insert-if-absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    /// The entry was inserted.
    Created(WorkflowTracking),
    /// An entry for the nonce already existed and was left untouched.
    Existing(WorkflowTracking),
}

impl TrackOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, TrackOutcome::Created(_))
    }

    pub fn entry(&self) -> &WorkflowTracking {
        match self {
            TrackOutcome::Created(entry) | TrackOutcome::Existing(entry) => entry,
        }
    }
}

/// Job description handed to the workflow engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
    pub kind: String,
    pub network: String,
    pub chain_id: u64,
    pub token: Address,
    pub from: Address,
    pub to: Address,
    #[serde(with = "u256_decimal")]
    pub value: U256,
    #[serde(with = "u256_decimal")]
    pub valid_after: U256,
    #[serde(with = "u256_decimal")]
    pub valid_before: U256,
    pub nonce: B256,
    pub signature: Bytes,
}

impl WorkflowSpec {
    /// `transferWithAuthorization` job for a verified payload.
    pub fn transfer_with_authorization(payload: &PaymentPayload, chain_id: u64, token: Address) -> Self {
        let auth = payload.authorization();
        Self {
            kind: WORKFLOW_KIND_EIP3009.to_string(),
            network: payload.network.clone(),
            chain_id,
            token,
            from: auth.from,
            to: auth.to,
            value: auth.value,
            valid_after: auth.valid_after,
            valid_before: auth.valid_before,
            nonce: auth.nonce,
            signature: payload.payload.signature.clone(),
        }
    }
}

/// Engine answer to a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Accepted(WorkflowId),
    Rejected(String),
}

/// Engine-reported job status, normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    InProgress,
    Completed { transaction: Option<String> },
    Failed { detail: String },
}

impl EngineStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EngineStatus::InProgress)
    }
}
