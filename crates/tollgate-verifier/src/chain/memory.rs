use alloy_primitives::{Address, Bytes, FixedBytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::IChainReader;
use crate::contracts::{IEIP3009, IERC1271};
use crate::error::ChainError;
use crate::signer::{recover_signer, EIP1271_MAGIC_VALUE};

/// Placeholder runtime code; only its non-emptiness matters.
const STUB_CODE: [u8; 4] = [0x60, 0x80, 0x60, 0x40];

/// Value a contract wallet returns for a signature it rejects.
const EIP1271_INVALID: [u8; 4] = [0xff, 0xff, 0xff, 0xff];

/// In-process chain with just enough contract behaviour for verification:
/// EIP-3009 tokens (domain separator + balances) and single-owner EIP-1271
/// wallets that accept signatures recovered to their owner.
///
/// Calls to an address without code return empty output, as a real node
/// does, so the caller sees a decode failure rather than a revert.
#[derive(Default)]
pub struct InMemoryChain {
    code: DashMap<Address, Bytes>,
    domain_separators: DashMap<Address, B256>,
    balances: DashMap<(Address, Address), U256>,
    wallet_owners: DashMap<Address, Address>,
    unreachable: AtomicBool,
    calls: AtomicUsize,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy a token answering `DOMAIN_SEPARATOR()` with `domain_separator`.
    pub fn deploy_token(&self, token: Address, domain_separator: B256) {
        self.code.insert(token, Bytes::from_static(&STUB_CODE));
        self.domain_separators.insert(token, domain_separator);
    }

    pub fn set_balance(&self, token: Address, owner: Address, balance: U256) {
        self.balances.insert((token, owner), balance);
    }

    /// Deploy an EIP-1271 wallet controlled by `owner`.
    pub fn deploy_wallet(&self, wallet: Address, owner: Address) {
        self.code.insert(wallet, Bytes::from_static(&STUB_CODE));
        self.wallet_owners.insert(wallet, owner);
    }

    /// Simulate a dead RPC endpoint: every call fails with a transport error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Total calls served (both `get_code` and `call`).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ChainError::Transport("connection refused".into()));
        }
        Ok(())
    }

    fn execute(&self, to: Address, data: &[u8]) -> Result<Bytes, ChainError> {
        if !self.code.contains_key(&to) {
            return Ok(Bytes::new());
        }
        if data.len() < 4 {
            return Err(ChainError::Reverted("missing selector".into()));
        }
        let selector: [u8; 4] = [data[0], data[1], data[2], data[3]];

        if selector == IEIP3009::DOMAIN_SEPARATORCall::SELECTOR {
            let separator = self
                .domain_separators
                .get(&to)
                .map(|s| *s)
                .ok_or_else(|| ChainError::Reverted("not a token".into()))?;
            return Ok(separator.abi_encode().into());
        }

        if selector == IEIP3009::balanceOfCall::SELECTOR {
            if !self.domain_separators.contains_key(&to) {
                return Err(ChainError::Reverted("not a token".into()));
            }
            let call = IEIP3009::balanceOfCall::abi_decode(data)
                .map_err(|e| ChainError::Reverted(e.to_string()))?;
            let balance = self
                .balances
                .get(&(to, call.account))
                .map(|b| *b)
                .unwrap_or(U256::ZERO);
            return Ok(balance.abi_encode().into());
        }

        if selector == IERC1271::isValidSignatureCall::SELECTOR {
            let owner = self
                .wallet_owners
                .get(&to)
                .map(|o| *o)
                .ok_or_else(|| ChainError::Reverted("not a wallet".into()))?;
            let call = IERC1271::isValidSignatureCall::abi_decode(data)
                .map_err(|e| ChainError::Reverted(e.to_string()))?;
            let magic = if recover_signer(call.hash, &call.signature) == Some(owner) {
                EIP1271_MAGIC_VALUE
            } else {
                EIP1271_INVALID
            };
            return Ok(FixedBytes::<4>::from(magic).abi_encode().into());
        }

        Err(ChainError::Reverted(format!(
            "unknown selector 0x{:02x}{:02x}{:02x}{:02x}",
            selector[0], selector[1], selector[2], selector[3]
        )))
    }
}

#[async_trait]
impl IChainReader for InMemoryChain {
    async fn get_code(&self, address: Address) -> Result<Bytes, ChainError> {
        self.enter()?;
        Ok(self
            .code
            .get(&address)
            .map(|c| c.clone())
            .unwrap_or_default())
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        self.enter()?;
        self.execute(to, &data)
    }
}
