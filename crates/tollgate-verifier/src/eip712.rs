//! EIP-712 hashing for EIP-3009 transfer authorizations.
//!
//! `signingHash = keccak256(0x19 ‖ 0x01 ‖ domainSeparator ‖ structHash)`, where
//! `structHash` encodes every field as a 32-byte left-padded word.

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::{Eip712Domain, SolStruct};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::contracts::TransferWithAuthorization;
use tollgate_core::PaymentAuthorization;

/// `keccak256("TransferWithAuthorization(address from,address to,uint256 value,uint256 validAfter,uint256 validBefore,bytes32 nonce)")`
pub const TRANSFER_WITH_AUTHORIZATION_TYPEHASH: B256 = B256::new([
    0x7c, 0x7c, 0x6c, 0xdb, 0x67, 0xa1, 0x87, 0x43, 0xf4, 0x9e, 0xc6, 0xfa, 0x9b, 0x35, 0xf5, 0x0d,
    0x52, 0xed, 0x05, 0xcb, 0xed, 0x4c, 0xc5, 0x92, 0xe1, 0x3b, 0x44, 0x50, 0x1c, 0x1a, 0x22, 0x67,
]);

/// Where the domain separator comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainSource {
    /// Read `DOMAIN_SEPARATOR()` from the token; recompute locally only when
    /// the token reverts or answers with garbage.
    #[default]
    Contract,
    /// Always recompute from name, version, chain id and token address.
    Local,
}

/// Token EIP-712 domain descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDomain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl TokenDomain {
    pub fn to_eip712(&self) -> Eip712Domain {
        Eip712Domain {
            name: Some(Cow::Owned(self.name.clone())),
            version: Some(Cow::Owned(self.version.clone())),
            chain_id: Some(U256::from(self.chain_id)),
            verifying_contract: Some(self.verifying_contract),
            salt: None,
        }
    }

    /// Locally computed domain separator.
    pub fn separator(&self) -> B256 {
        self.to_eip712().hash_struct()
    }
}

fn to_sol(auth: &PaymentAuthorization) -> TransferWithAuthorization {
    TransferWithAuthorization {
        from: auth.from,
        to: auth.to,
        value: auth.value,
        validAfter: auth.valid_after,
        validBefore: auth.valid_before,
        nonce: auth.nonce,
    }
}

/// EIP-712 `hashStruct` of the authorization.
pub fn struct_hash(auth: &PaymentAuthorization) -> B256 {
    to_sol(auth).eip712_hash_struct()
}

/// Final digest the payer signs.
pub fn signing_hash(domain_separator: B256, struct_hash: B256) -> B256 {
    let mut buf = [0u8; 66];
    buf[0] = 0x19;
    buf[1] = 0x01;
    buf[2..34].copy_from_slice(domain_separator.as_slice());
    buf[34..66].copy_from_slice(struct_hash.as_slice());
    keccak256(buf)
}

/// Signing hash using a locally computed domain separator.
pub fn local_signing_hash(auth: &PaymentAuthorization, domain: &TokenDomain) -> B256 {
    signing_hash(domain.separator(), struct_hash(auth))
}
