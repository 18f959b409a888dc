//! Signer kinds.
//!
//! A payer is either a private-key account (no code; the signature must
//! recover to `from`) or a contract account (has code; the contract decides
//! through EIP-1271 `isValidSignature`). The kind is resolved once per
//! verification by probing the payer's bytecode.

use alloy_primitives::{Address, Bytes, Signature, B256};

use crate::chain::{read_contract, IChainReader};
use crate::contracts::IERC1271;
use crate::error::ChainError;

/// `bytes4(keccak256("isValidSignature(bytes32,bytes)"))`
pub const EIP1271_MAGIC_VALUE: [u8; 4] = [0x16, 0x26, 0xba, 0x7e];

/// Resolved signer of an authorization.
#[derive(Clone, Copy)]
pub enum Signer<'a> {
    /// Private-key account: ECDSA recovery.
    Simple,
    /// Contract account: EIP-1271 call through the chain reader.
    Contract(&'a dyn IChainReader),
}

impl<'a> Signer<'a> {
    /// Classify `address` by its deployed bytecode.
    pub async fn classify(reader: &'a dyn IChainReader, address: Address) -> Result<Self, ChainError> {
        let code = reader.get_code(address).await?;
        if code.is_empty() {
            Ok(Signer::Simple)
        } else {
            Ok(Signer::Contract(reader))
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Signer::Simple => "simple",
            Signer::Contract(_) => "contract",
        }
    }

    /// Whether `signature` over `hash` is valid for `from`.
    ///
    /// Malformed signatures and contract reverts are `Ok(false)`; only an
    /// unreachable chain is an error.
    pub async fn verify(&self, hash: B256, signature: &Bytes, from: Address) -> Result<bool, ChainError> {
        match self {
            Signer::Simple => Ok(recover_signer(hash, signature) == Some(from)),
            Signer::Contract(reader) => {
                let call = IERC1271::isValidSignatureCall {
                    hash,
                    signature: signature.clone(),
                };
                match read_contract(*reader, from, &call).await {
                    Ok(magic) => Ok(magic.0 == EIP1271_MAGIC_VALUE),
                    Err(e) if e.is_contract_failure() => {
                        tracing::debug!(%from, error = %e, "isValidSignature rejected");
                        Ok(false)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }
}

impl std::fmt::Debug for Signer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// Recover the address that produced `signature` over `hash`.
///
/// Accepts 65-byte `r‖s‖v` (v in 0, 1, 27, 28) and 64-byte EIP-2098 compact
/// signatures. Anything else yields `None`.
pub fn recover_signer(hash: B256, signature: &[u8]) -> Option<Address> {
    let sig = match signature.len() {
        65 => Signature::try_from(signature).ok()?,
        64 => Signature::from_erc2098(signature),
        _ => return None,
    };
    sig.recover_address_from_prehash(&hash).ok()
}
