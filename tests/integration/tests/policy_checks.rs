//! Single-field mutations and signer kinds against the policy checklist.

use alloy_primitives::{address, Address, B256, U256};
use alloy_signer_local::PrivateKeySigner;
use tollgate_core::{InvalidReason, PaymentAuthorization, PaymentRequest};
use tollgate_integration_tests::{now, request_with, sign, Harness, TOKEN};

fn harness() -> Harness {
    Harness::completing_with("0xTX")
}

async fn reason(h: &Harness, req: &PaymentRequest) -> Option<InvalidReason> {
    let response = h.facilitator.verify(req).await;
    assert_eq!(response.is_valid, response.invalid_reason.is_none());
    response.invalid_reason
}

/// Re-sign after `mutate` so only the mutated policy check can fail.
fn mutated(h: &Harness, nonce: u8, mutate: impl FnOnce(&mut PaymentAuthorization)) -> PaymentRequest {
    let mut auth = h.authorization(B256::repeat_byte(nonce));
    mutate(&mut auth);
    h.request(auth)
}

#[tokio::test]
async fn test_each_mutation_maps_to_its_reason() {
    let h = harness();
    let other: Address = address!("0xcccccccccccccccccccccccccccccccccccccccc");
    let cases: Vec<(PaymentRequest, InvalidReason)> = vec![
        (
            mutated(&h, 0x01, |a| a.to = other),
            InvalidReason::RecipientMismatch,
        ),
        (
            mutated(&h, 0x02, |a| a.valid_before = U256::from(now() + 3)),
            InvalidReason::AuthorizationExpiringTooSoon,
        ),
        (
            mutated(&h, 0x03, |a| a.valid_after = U256::from(now() + 600)),
            InvalidReason::AuthorizationNotYetValid,
        ),
        (
            mutated(&h, 0x04, |a| a.value = U256::from(9_999u64)),
            InvalidReason::AuthorizationValueTooLow,
        ),
    ];
    for (req, expected) in cases {
        assert_eq!(reason(&h, &req).await, Some(expected));
    }
    assert_eq!(h.engine.dispatch_count(), 0);
}

#[tokio::test]
async fn test_flipped_signature_byte_is_invalid_signature() {
    let h = harness();
    let valid = h.request(h.authorization(B256::repeat_byte(0x05)));
    for index in [0usize, 17, 40, 63] {
        let mut req = valid.clone();
        let mut bytes = req.payment_payload.payload.signature.to_vec();
        bytes[index] ^= 0x01;
        req.payment_payload.payload.signature = bytes.into();
        assert_eq!(reason(&h, &req).await, Some(InvalidReason::InvalidSignature), "byte {index}");
    }
    assert_eq!(h.engine.dispatch_count(), 0);
}

#[tokio::test]
async fn test_tampered_field_without_resigning_is_invalid_signature() {
    let h = harness();
    let mut req = h.request(h.authorization(B256::repeat_byte(0x06)));
    req.payment_payload.payload.authorization.value = U256::from(1_000_000u64);
    assert_eq!(reason(&h, &req).await, Some(InvalidReason::InvalidSignature));
}

#[tokio::test]
async fn test_unrelated_key_is_rejected() {
    let h = harness();
    let auth = h.authorization(B256::repeat_byte(0x07));
    let stranger = PrivateKeySigner::random();
    let req = request_with(auth.clone(), sign(&stranger, &auth));
    assert_eq!(reason(&h, &req).await, Some(InvalidReason::InvalidSignature));
}

#[tokio::test]
async fn test_insufficient_balance_is_rejected() {
    let h = harness();
    h.chain.set_balance(TOKEN, h.payer.address(), U256::from(9_999u64));
    let req = h.request(h.authorization(B256::repeat_byte(0x08)));
    assert_eq!(reason(&h, &req).await, Some(InvalidReason::InsufficientFunds));
}

#[tokio::test]
async fn test_wrong_scheme_and_network() {
    let h = harness();
    let valid = h.request(h.authorization(B256::repeat_byte(0x09)));

    let mut req = valid.clone();
    req.payment_requirements.scheme = "upto".into();
    assert_eq!(reason(&h, &req).await, Some(InvalidReason::UnsupportedScheme));

    let mut req = valid.clone();
    req.payment_payload.network = "base".into();
    assert_eq!(reason(&h, &req).await, Some(InvalidReason::InvalidNetwork));

    let mut req = valid;
    req.payment_payload.network = "base".into();
    req.payment_requirements.network = "base".into();
    // Registered, but no chain reader is configured for it.
    assert_eq!(reason(&h, &req).await, Some(InvalidReason::InvalidNetwork));
}

#[tokio::test]
async fn test_contract_wallet_signed_by_owner() {
    let h = harness();
    let wallet: Address = address!("0x5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a");
    h.chain.deploy_wallet(wallet, h.payer.address());
    h.chain.set_balance(TOKEN, wallet, U256::from(50_000u64));

    let mut auth = h.authorization(B256::repeat_byte(0x0a));
    auth.from = wallet;
    let req = request_with(auth.clone(), sign(&h.payer, &auth));

    let response = h.facilitator.verify(&req).await;
    assert!(response.is_valid);
    assert_eq!(response.payer, Some(wallet));
    assert_eq!(h.engine.dispatch_count(), 1);
}

#[tokio::test]
async fn test_contract_wallet_signed_by_stranger() {
    let h = harness();
    let wallet: Address = address!("0x6b6b6b6b6b6b6b6b6b6b6b6b6b6b6b6b6b6b6b6b");
    h.chain.deploy_wallet(wallet, h.payer.address());
    h.chain.set_balance(TOKEN, wallet, U256::from(50_000u64));

    let mut auth = h.authorization(B256::repeat_byte(0x0b));
    auth.from = wallet;
    let stranger = PrivateKeySigner::random();
    let req = request_with(auth.clone(), sign(&stranger, &auth));

    let response = h.facilitator.verify(&req).await;
    assert_eq!(response.invalid_reason, Some(InvalidReason::InvalidSignature));
    assert_eq!(response.payer, Some(wallet));
    assert_eq!(h.engine.dispatch_count(), 0);
}
