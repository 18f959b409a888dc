//! Solidity definitions for the on-chain reads the verifier performs.
//!
//! - [`TransferWithAuthorization`]: EIP-3009 typed-data struct (EIP-712 hashing)
//! - [`IEIP3009`]: token subset (domain separator and balance reads)
//! - [`IERC1271`]: contract-account signature validation

use alloy_sol_types::sol;

sol! {
    /// EIP-3009 authorization as signed by the payer.
    ///
    /// Field names are part of the EIP-712 type string and must not change.
    #[allow(missing_docs)]
    #[derive(Debug)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

sol! {
    /// Minimal ERC-3009 + ERC-20 view surface of a USDC-style token.
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IEIP3009 {
        function DOMAIN_SEPARATOR() external view returns (bytes32);
        function balanceOf(address account) external view returns (uint256);
    }
}

sol! {
    /// EIP-1271 contract signature validation.
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IERC1271 {
        function isValidSignature(bytes32 hash, bytes signature) external view returns (bytes4 magicValue);
    }
}
