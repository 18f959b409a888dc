pub mod error;
pub mod network;
pub mod state_machine;
pub mod types;

pub use error::CoreError;
pub use network::{NetworkConfig, NetworkRegistry};
pub use state_machine::{WorkflowEvent, WorkflowStateMachine, WorkflowStatus};
pub use types::{
    DomainExtra, ExactPayload, InvalidReason, PaymentAuthorization, PaymentPayload,
    PaymentRequest, PaymentRequirements, SettleErrorReason, SettleRequest, SettleResponse,
    SupportedKind, SupportedResponse, VerifyRequest, VerifyResponse, EXACT_SCHEME, X402_VERSION,
};
