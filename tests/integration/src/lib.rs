//! Fixtures for end-to-end facilitator scenarios: an in-memory chain with a
//! deployed token, a scripted workflow engine, and signed payment requests.

use alloy_primitives::{address, Address, Bytes, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use std::sync::Arc;

use tollgate_core::{
    ExactPayload, NetworkRegistry, PaymentAuthorization, PaymentPayload, PaymentRequest,
    PaymentRequirements,
};
use tollgate_node::{build_facilitator, Facilitator, TollgateConfig};
use tollgate_settlement::{EngineStatus, IWorkflowStore, ScriptedWorkflowEngine};
use tollgate_verifier::eip712::local_signing_hash;
use tollgate_verifier::{ChainReaders, InMemoryChain, TokenDomain};

/// USDC on Base Sepolia, as registered by default.
pub const TOKEN: Address = address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e");
pub const PAY_TO: Address = address!("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
pub const NETWORK: &str = "base-sepolia";
pub const PRICE: u64 = 10_000;

pub fn now() -> u64 {
    chrono::Utc::now().timestamp() as u64
}

pub fn token_domain() -> TokenDomain {
    TokenDomain {
        name: "USDC".into(),
        version: "2".into(),
        chain_id: 84532,
        verifying_contract: TOKEN,
    }
}

/// A facilitator wired to in-memory collaborators, with a funded payer.
pub struct Harness {
    pub chain: Arc<InMemoryChain>,
    pub engine: Arc<ScriptedWorkflowEngine>,
    pub store: Arc<dyn IWorkflowStore>,
    pub facilitator: Facilitator,
    pub payer: PrivateKeySigner,
}

impl Harness {
    /// Workflows report one in-progress poll, then complete with `transaction`.
    pub fn completing_with(transaction: &str) -> Self {
        Self::with_script(vec![
            EngineStatus::InProgress,
            EngineStatus::Completed {
                transaction: Some(transaction.to_string()),
            },
        ])
    }

    pub fn with_script(script: Vec<EngineStatus>) -> Self {
        let payer = PrivateKeySigner::random();
        let chain = Arc::new(InMemoryChain::new());
        chain.deploy_token(TOKEN, token_domain().separator());
        chain.set_balance(TOKEN, payer.address(), U256::from(1_000_000u64));

        let engine = Arc::new(ScriptedWorkflowEngine::with_default_script(script));

        let mut config = TollgateConfig::default();
        config.polling.interval_ms = 10;
        config.polling.ceiling_secs = 5;
        config.polling.settle_poll_interval_ms = 10;
        config.polling.settle_wait_secs = 2;

        let (facilitator, store) = build_facilitator(
            &config,
            Arc::new(NetworkRegistry::with_defaults()),
            ChainReaders::new().with(NETWORK, chain.clone()),
            engine.clone(),
        );
        Self {
            chain,
            engine,
            store,
            facilitator,
            payer,
        }
    }

    /// Authorization from the funded payer to [`PAY_TO`] for [`PRICE`],
    /// valid from a minute ago for an hour.
    pub fn authorization(&self, nonce: B256) -> PaymentAuthorization {
        let now = now();
        PaymentAuthorization {
            from: self.payer.address(),
            to: PAY_TO,
            value: U256::from(PRICE),
            valid_after: U256::from(now - 60),
            valid_before: U256::from(now + 3_600),
            nonce,
        }
    }

    /// Request carrying `authorization`, signed by the payer key.
    pub fn request(&self, authorization: PaymentAuthorization) -> PaymentRequest {
        let signature = sign(&self.payer, &authorization);
        request_with(authorization, signature)
    }
}

pub fn sign(key: &PrivateKeySigner, authorization: &PaymentAuthorization) -> Bytes {
    let hash = local_signing_hash(authorization, &token_domain());
    let signature = key
        .sign_hash_sync(&hash)
        .expect("signing with a local key");
    Bytes::from(signature.as_bytes().to_vec())
}

pub fn requirements() -> PaymentRequirements {
    PaymentRequirements {
        scheme: "exact".into(),
        network: NETWORK.into(),
        max_amount_required: U256::from(PRICE),
        pay_to: PAY_TO,
        asset: TOKEN,
        resource: Some("https://api.example.com/premium".into()),
        description: Some("Premium endpoint".into()),
        mime_type: Some("application/json".into()),
        max_timeout_seconds: Some(60),
        extra: None,
    }
}

pub fn request_with(authorization: PaymentAuthorization, signature: Bytes) -> PaymentRequest {
    PaymentRequest {
        x402_version: Some(1),
        payment_payload: PaymentPayload {
            x402_version: 1,
            scheme: "exact".into(),
            network: NETWORK.into(),
            payload: ExactPayload {
                signature,
                authorization,
            },
        },
        payment_requirements: requirements(),
    }
}

/// Wait until the tracked workflow for `nonce` reaches a terminal state.
pub async fn wait_terminal(store: &Arc<dyn IWorkflowStore>, nonce: B256) {
    for _ in 0..200 {
        if let Ok(Some(entry)) = store.get(nonce).await {
            if entry.is_terminal() {
                return;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("workflow for {nonce} never finished");
}
