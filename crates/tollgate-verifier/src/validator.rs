//! Ordered, short-circuiting policy checklist for `exact` payments.
//!
//! 1. scheme is `exact` on both sides
//! 2. network matches and resolves to a configured chain
//! 3. signature is valid for `from`
//! 4. `to == payTo`
//! 5. `validBefore >= now + margin`
//! 6. `validAfter <= now`
//! 7. payer balance covers `maxAmountRequired` (best effort)
//! 8. `value >= maxAmountRequired`

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::chain::{read_contract, ChainReaders};
use crate::contracts::IEIP3009;
use crate::eip712::{DomainSource, TokenDomain};
use crate::error::{ChainError, VerifierError};
use crate::signature::SignatureVerifier;
use tollgate_core::{
    InvalidReason, NetworkRegistry, PaymentPayload, PaymentRequirements, VerifyResponse,
    EXACT_SCHEME,
};

/// Validator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Minimum remaining lifetime of an authorization, in seconds.
    pub min_validity_window_secs: u64,
    pub domain_source: DomainSource,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_validity_window_secs: 6,
            domain_source: DomainSource::Contract,
        }
    }
}

enum Rejection {
    Invalid(InvalidReason),
    Fault(VerifierError),
}

impl From<InvalidReason> for Rejection {
    fn from(reason: InvalidReason) -> Self {
        Rejection::Invalid(reason)
    }
}

impl From<ChainError> for Rejection {
    fn from(err: ChainError) -> Self {
        Rejection::Fault(err.into())
    }
}

/// Runs the policy checklist against a payment payload.
#[derive(Debug, Clone)]
pub struct PaymentValidator {
    registry: Arc<NetworkRegistry>,
    readers: ChainReaders,
    signatures: SignatureVerifier,
    config: ValidatorConfig,
}

impl PaymentValidator {
    pub fn new(registry: Arc<NetworkRegistry>, readers: ChainReaders, config: ValidatorConfig) -> Self {
        Self {
            registry,
            readers,
            signatures: SignatureVerifier::new(config.domain_source),
            config,
        }
    }

    pub fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    pub fn readers(&self) -> &ChainReaders {
        &self.readers
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate against the current wall clock.
    pub async fn validate(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> VerifyResponse {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        self.validate_at(payload, requirements, now).await
    }

    /// Validate with an explicit `now` (unix seconds).
    pub async fn validate_at(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
        now: u64,
    ) -> VerifyResponse {
        let payer = payload.authorization().from;
        match self.check(payload, requirements, now).await {
            Ok(()) => {
                tracing::info!(%payer, network = %requirements.network, "payment authorization valid");
                VerifyResponse::valid(payer)
            }
            Err(Rejection::Invalid(reason)) => {
                tracing::info!(%payer, %reason, "payment authorization rejected");
                VerifyResponse::invalid(reason, Some(payer))
            }
            Err(Rejection::Fault(err)) => {
                tracing::error!(%payer, error = %err, "verification failed");
                VerifyResponse::invalid(InvalidReason::UnexpectedVerifyError, Some(payer))
            }
        }
    }

    async fn check(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
        now: u64,
    ) -> Result<(), Rejection> {
        let auth = payload.authorization();

        if payload.scheme != EXACT_SCHEME || requirements.scheme != EXACT_SCHEME {
            return Err(InvalidReason::UnsupportedScheme.into());
        }
        if payload.network != requirements.network {
            return Err(InvalidReason::InvalidNetwork.into());
        }
        let network = self
            .registry
            .lookup(&requirements.network)
            .ok_or(InvalidReason::InvalidNetwork)?;
        let reader = self
            .readers
            .get(&requirements.network)
            .ok_or(InvalidReason::InvalidNetwork)?;

        let extra = requirements.extra.clone().unwrap_or_default();
        let domain = TokenDomain {
            name: extra.name.unwrap_or_else(|| network.token_name.clone()),
            version: extra.version.unwrap_or_else(|| network.token_version.clone()),
            chain_id: network.chain_id,
            verifying_contract: requirements.asset,
        };
        let signature = &payload.payload.signature;
        if !self.signatures.verify(reader.as_ref(), auth, &domain, signature).await? {
            return Err(InvalidReason::InvalidSignature.into());
        }

        if auth.to != requirements.pay_to {
            return Err(InvalidReason::RecipientMismatch.into());
        }

        let deadline = U256::from(now.saturating_add(self.config.min_validity_window_secs));
        if auth.valid_before < deadline {
            return Err(InvalidReason::AuthorizationExpiringTooSoon.into());
        }
        if auth.valid_after > U256::from(now) {
            return Err(InvalidReason::AuthorizationNotYetValid.into());
        }

        let balance_call = IEIP3009::balanceOfCall { account: auth.from };
        match read_contract(reader.as_ref(), requirements.asset, &balance_call).await {
            Ok(balance) if balance < requirements.max_amount_required => {
                return Err(InvalidReason::InsufficientFunds.into());
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    payer = %auth.from,
                    asset = %requirements.asset,
                    error = %e,
                    "balance check skipped"
                );
            }
        }

        if auth.value < requirements.max_amount_required {
            return Err(InvalidReason::AuthorizationValueTooLow.into());
        }
        Ok(())
    }
}
