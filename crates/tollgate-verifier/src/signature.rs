use alloy_primitives::{Bytes, B256};

use crate::chain::{read_contract, IChainReader};
use crate::contracts::IEIP3009;
use crate::eip712::{signing_hash, struct_hash, DomainSource, TokenDomain};
use crate::error::ChainError;
use crate::signer::Signer;
use tollgate_core::PaymentAuthorization;

/// Validates EIP-3009 authorization signatures for both signer kinds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier {
    source: DomainSource,
}

impl SignatureVerifier {
    pub fn new(source: DomainSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> DomainSource {
        self.source
    }

    /// Domain separator for `domain`, honouring the configured source.
    pub async fn domain_separator(
        &self,
        reader: &dyn IChainReader,
        domain: &TokenDomain,
    ) -> Result<B256, ChainError> {
        if self.source == DomainSource::Local {
            return Ok(domain.separator());
        }
        match read_contract(reader, domain.verifying_contract, &IEIP3009::DOMAIN_SEPARATORCall {}).await {
            Ok(separator) => Ok(separator),
            Err(e) if e.is_contract_failure() => {
                tracing::debug!(
                    token = %domain.verifying_contract,
                    error = %e,
                    "DOMAIN_SEPARATOR() unavailable, recomputing locally"
                );
                Ok(domain.separator())
            }
            Err(e) => Err(e),
        }
    }

    /// Digest the payer must have signed.
    pub async fn signing_hash(
        &self,
        reader: &dyn IChainReader,
        auth: &PaymentAuthorization,
        domain: &TokenDomain,
    ) -> Result<B256, ChainError> {
        let separator = self.domain_separator(reader, domain).await?;
        Ok(signing_hash(separator, struct_hash(auth)))
    }

    /// Whether `signature` authorizes `auth` under `domain`.
    pub async fn verify(
        &self,
        reader: &dyn IChainReader,
        auth: &PaymentAuthorization,
        domain: &TokenDomain,
        signature: &Bytes,
    ) -> Result<bool, ChainError> {
        let hash = self.signing_hash(reader, auth, domain).await?;
        let signer = Signer::classify(reader, auth.from).await?;
        let valid = signer.verify(hash, signature, auth.from).await?;
        tracing::debug!(from = %auth.from, signer = signer.kind(), valid, "signature checked");
        Ok(valid)
    }
}
