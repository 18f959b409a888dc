//! The facilitator service: verify, settle, and capability discovery.
//!
//! Verification runs the policy checklist and, for a valid payment, starts
//! settlement before replying. Settlement replies come from the tracked
//! workflow state.

use alloy_primitives::B256;
use std::sync::Arc;

use tollgate_core::{
    DomainExtra, InvalidReason, PaymentRequest, SettleResponse, SupportedKind, SupportedResponse,
    VerifyResponse, EXACT_SCHEME, X402_VERSION,
};
use tollgate_settlement::{
    IWorkflowStore, SettlementCoordinator, SettlementDispatcher, SettlementError, WorkflowSpec,
    WorkflowTracking,
};
use tollgate_verifier::PaymentValidator;

#[derive(Clone)]
pub struct Facilitator {
    validator: PaymentValidator,
    dispatcher: SettlementDispatcher,
    coordinator: SettlementCoordinator,
    store: Arc<dyn IWorkflowStore>,
}

impl Facilitator {
    pub fn new(
        validator: PaymentValidator,
        dispatcher: SettlementDispatcher,
        coordinator: SettlementCoordinator,
        store: Arc<dyn IWorkflowStore>,
    ) -> Self {
        Self {
            validator,
            dispatcher,
            coordinator,
            store,
        }
    }

    pub fn dispatcher(&self) -> &SettlementDispatcher {
        &self.dispatcher
    }

    /// Verify a payment and, when valid, make sure its settlement is tracked.
    ///
    /// Replies as soon as the workflow is tracked and dispatched; never waits
    /// for settlement.
    pub async fn verify(&self, request: &PaymentRequest) -> VerifyResponse {
        let payload = &request.payment_payload;
        let requirements = &request.payment_requirements;
        let response = self.validator.validate(payload, requirements).await;
        if !response.is_valid {
            return response;
        }

        let payer = payload.authorization().from;
        let Some(network) = self.validator.registry().lookup(&requirements.network) else {
            return VerifyResponse::invalid(InvalidReason::InvalidNetwork, Some(payer));
        };
        let spec = WorkflowSpec::transfer_with_authorization(payload, network.chain_id, requirements.asset);

        match self.dispatcher.dispatch(spec).await {
            Ok(_) => response,
            Err(e @ (SettlementError::NonceConflict(_) | SettlementError::AlreadyFailed(..))) => {
                tracing::warn!(nonce = %payload.nonce(), error = %e, "verified payment refused by tracker");
                VerifyResponse::invalid(InvalidReason::UnexpectedVerifyError, Some(payer))
            }
            Err(e) => {
                tracing::error!(nonce = %payload.nonce(), error = %e, "settlement could not be started");
                VerifyResponse::invalid(InvalidReason::UnexpectedVerifyError, Some(payer))
            }
        }
    }

    /// Settlement outcome for the request's authorization nonce and payer.
    pub async fn settle(&self, request: &PaymentRequest) -> SettleResponse {
        let payload = &request.payment_payload;
        self.coordinator
            .settle(payload.nonce(), payload.authorization().from)
            .await
    }

    /// Scheme/network pairs served, one per network with a chain reader.
    pub fn supported(&self) -> SupportedResponse {
        let registry = self.validator.registry();
        let kinds = self
            .validator
            .readers()
            .networks()
            .filter_map(|name| registry.lookup(name))
            .map(|network| SupportedKind {
                x402_version: X402_VERSION,
                scheme: EXACT_SCHEME.to_string(),
                network: network.network.clone(),
                extra: Some(DomainExtra {
                    name: Some(network.token_name.clone()),
                    version: Some(network.token_version.clone()),
                }),
            })
            .collect();
        SupportedResponse { kinds }
    }

    /// Tracked workflow for `nonce`, if any.
    pub async fn workflow(&self, nonce: B256) -> Result<Option<WorkflowTracking>, SettlementError> {
        self.store.get(nonce).await
    }

    /// Stop background polling. Tracked state is kept.
    pub fn shutdown(&self) -> usize {
        self.dispatcher.supervisor().shutdown()
    }
}
