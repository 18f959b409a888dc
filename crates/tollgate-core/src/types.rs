//! Wire types for the `exact` EVM payment scheme.
//!
//! Amounts and timestamps are uint256 on-chain and travel as decimal strings.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The only payment scheme this facilitator accepts.
pub const EXACT_SCHEME: &str = "exact";

/// Protocol version advertised by `/supported`.
pub const X402_VERSION: u8 = 1;

/// Serde adapter for uint256 values encoded as decimal strings.
///
/// Accepts decimal or `0x`-prefixed strings and plain JSON integers on input.
pub mod u256_decimal {
    use alloy_primitives::U256;
    use serde::{de, Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        struct U256Visitor;

        impl<'de> de::Visitor<'de> for U256Visitor {
            type Value = U256;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a uint256 as a decimal string or integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<U256, E> {
                v.trim().parse::<U256>().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<U256, E> {
                Ok(U256::from(v))
            }
        }

        deserializer.deserialize_any(U256Visitor)
    }
}

/// EIP-3009 `TransferWithAuthorization` fields signed by the payer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAuthorization {
    pub from: Address,
    pub to: Address,
    #[serde(with = "u256_decimal")]
    pub value: U256,
    #[serde(with = "u256_decimal")]
    pub valid_after: U256,
    #[serde(with = "u256_decimal")]
    pub valid_before: U256,
    /// One-time token; also the settlement tracking key.
    pub nonce: B256,
}

/// Scheme-specific payload: the authorization and its signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactPayload {
    pub signature: Bytes,
    pub authorization: PaymentAuthorization,
}

/// Payment envelope sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    #[serde(default = "default_version")]
    pub x402_version: u8,
    pub scheme: String,
    pub network: String,
    pub payload: ExactPayload,
}

impl PaymentPayload {
    pub fn authorization(&self) -> &PaymentAuthorization {
        &self.payload.authorization
    }

    pub fn nonce(&self) -> B256 {
        self.payload.authorization.nonce
    }
}

/// Token EIP-712 domain override carried in `PaymentRequirements.extra`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainExtra {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// What the resource server demands for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: String,
    #[serde(with = "u256_decimal")]
    pub max_amount_required: U256,
    pub pay_to: Address,
    pub asset: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<DomainExtra>,
}

/// Body of both `POST /verify` and `POST /settle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x402_version: Option<u8>,
    pub payment_payload: PaymentPayload,
    pub payment_requirements: PaymentRequirements,
}

pub type VerifyRequest = PaymentRequest;
pub type SettleRequest = PaymentRequest;

fn default_version() -> u8 {
    X402_VERSION
}

/// Why a payment failed verification. The first failing check wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    UnsupportedScheme,
    InvalidNetwork,
    InvalidSignature,
    RecipientMismatch,
    AuthorizationExpiringTooSoon,
    AuthorizationNotYetValid,
    InsufficientFunds,
    AuthorizationValueTooLow,
    UnexpectedVerifyError,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedScheme => "unsupported_scheme",
            Self::InvalidNetwork => "invalid_network",
            Self::InvalidSignature => "invalid_signature",
            Self::RecipientMismatch => "recipient_mismatch",
            Self::AuthorizationExpiringTooSoon => "authorization_expiring_too_soon",
            Self::AuthorizationNotYetValid => "authorization_not_yet_valid",
            Self::InsufficientFunds => "insufficient_funds",
            Self::AuthorizationValueTooLow => "authorization_value_too_low",
            Self::UnexpectedVerifyError => "unexpected_verify_error",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response of `POST /verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<InvalidReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<Address>,
}

impl VerifyResponse {
    pub fn valid(payer: Address) -> Self {
        Self {
            is_valid: true,
            invalid_reason: None,
            payer: Some(payer),
        }
    }

    pub fn invalid(reason: InvalidReason, payer: Option<Address>) -> Self {
        Self {
            is_valid: false,
            invalid_reason: Some(reason),
            payer,
        }
    }
}

/// Why a settle request did not produce a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleErrorReason {
    NoWorkflowTracked,
    WorkflowFailed,
    WorkflowTimeout,
    UnexpectedSettleError,
}

impl fmt::Display for SettleErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoWorkflowTracked => write!(f, "no_workflow_tracked"),
            Self::WorkflowFailed => write!(f, "workflow_failed"),
            Self::WorkflowTimeout => write!(f, "workflow_timeout"),
            Self::UnexpectedSettleError => write!(f, "unexpected_settle_error"),
        }
    }
}

/// Response of `POST /settle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub success: bool,
    /// Transaction hash, if settlement succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<SettleErrorReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SettleResponse {
    pub fn settled(transaction: String, network: String, payer: Address) -> Self {
        Self {
            success: true,
            transaction: Some(transaction),
            network: Some(network),
            payer: Some(payer),
            error_reason: None,
            error_message: None,
        }
    }

    pub fn failed(reason: SettleErrorReason, message: Option<String>) -> Self {
        Self {
            success: false,
            transaction: None,
            network: None,
            payer: None,
            error_reason: Some(reason),
            error_message: message,
        }
    }
}

/// One accepted `(scheme, network)` combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedKind {
    pub x402_version: u8,
    pub scheme: String,
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<DomainExtra>,
}

/// Response of `GET /supported`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedResponse {
    pub kinds: Vec<SupportedKind>,
}
