//! Payment-authorization verification for the `exact` scheme.
//!
//! [`PaymentValidator`] runs the ordered policy checklist; the signature step
//! is delegated to [`SignatureVerifier`], which hashes the EIP-3009
//! authorization per EIP-712 and dispatches on the signer kind
//! (private-key account vs EIP-1271 contract account).

pub mod chain;
pub mod contracts;
pub mod eip712;
pub mod error;
pub mod signature;
pub mod signer;
pub mod validator;

pub use chain::{ChainReaders, IChainReader, InMemoryChain, JsonRpcChainReader};
pub use eip712::{DomainSource, TokenDomain};
pub use error::{ChainError, VerifierError};
pub use signature::SignatureVerifier;
pub use signer::{Signer, EIP1271_MAGIC_VALUE};
pub use validator::{PaymentValidator, ValidatorConfig};
