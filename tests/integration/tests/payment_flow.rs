//! End-to-end verify/settle flows through the facilitator.

use alloy_primitives::{B256, U256};
use alloy_signer_local::PrivateKeySigner;
use tollgate_core::{InvalidReason, SettleErrorReason, WorkflowStatus};
use tollgate_integration_tests::{now, request_with, sign, wait_terminal, Harness, NETWORK, TOKEN};
use tollgate_settlement::EngineStatus;

#[tokio::test]
async fn test_verify_then_settle_returns_transaction() {
    let h = Harness::completing_with("0xTX");
    let nonce = B256::repeat_byte(0xa1);
    let req = h.request(h.authorization(nonce));

    let verified = h.facilitator.verify(&req).await;
    assert!(verified.is_valid);
    assert_eq!(verified.payer, Some(h.payer.address()));
    assert_eq!(verified.invalid_reason, None);

    wait_terminal(&h.store, nonce).await;
    let settled = h.facilitator.settle(&req).await;
    assert!(settled.success);
    assert_eq!(settled.transaction.as_deref(), Some("0xTX"));
    assert_eq!(settled.network.as_deref(), Some(NETWORK));
    assert_eq!(settled.payer, Some(h.payer.address()));
}

#[tokio::test]
async fn test_settle_waits_for_in_flight_workflow() {
    let h = Harness::completing_with("0xlate");
    let nonce = B256::repeat_byte(0xa2);
    let req = h.request(h.authorization(nonce));

    assert!(h.facilitator.verify(&req).await.is_valid);
    // No waiting here: settle blocks on the workflow itself.
    let settled = h.facilitator.settle(&req).await;
    assert!(settled.success);
    assert_eq!(settled.transaction.as_deref(), Some("0xlate"));
}

#[tokio::test]
async fn test_expiring_authorization_is_rejected() {
    let h = Harness::completing_with("0xTX");
    let mut auth = h.authorization(B256::repeat_byte(0xa3));
    auth.valid_before = U256::from(now() + 2);
    let verified = h.facilitator.verify(&h.request(auth)).await;

    assert!(!verified.is_valid);
    assert_eq!(verified.invalid_reason, Some(InvalidReason::AuthorizationExpiringTooSoon));
    assert_eq!(h.engine.dispatch_count(), 0);
}

#[tokio::test]
async fn test_underpaying_authorization_is_rejected() {
    let h = Harness::completing_with("0xTX");
    let mut auth = h.authorization(B256::repeat_byte(0xa4));
    auth.value = U256::from(5_000u64);
    let verified = h.facilitator.verify(&h.request(auth)).await;

    assert!(!verified.is_valid);
    assert_eq!(verified.invalid_reason, Some(InvalidReason::AuthorizationValueTooLow));
    assert_eq!(h.engine.dispatch_count(), 0);
}

#[tokio::test]
async fn test_settle_for_unseen_nonce() {
    let h = Harness::completing_with("0xTX");
    let req = h.request(h.authorization(B256::repeat_byte(0xa5)));

    let settled = h.facilitator.settle(&req).await;
    assert!(!settled.success);
    assert_eq!(settled.error_reason, Some(SettleErrorReason::NoWorkflowTracked));
    assert_eq!(h.engine.dispatch_count(), 0);
}

#[tokio::test]
async fn test_repeated_settle_returns_cached_transaction() {
    let h = Harness::completing_with("0xcached");
    let nonce = B256::repeat_byte(0xa6);
    let req = h.request(h.authorization(nonce));
    assert!(h.facilitator.verify(&req).await.is_valid);
    wait_terminal(&h.store, nonce).await;

    let first = h.facilitator.settle(&req).await;
    for _ in 0..5 {
        let again = h.facilitator.settle(&req).await;
        assert_eq!(again, first);
    }
    assert_eq!(first.transaction.as_deref(), Some("0xcached"));
    assert_eq!(h.engine.dispatch_count(), 1);
}

#[tokio::test]
async fn test_reverify_after_completion_does_not_redispatch() {
    let h = Harness::completing_with("0xonce");
    let nonce = B256::repeat_byte(0xa7);
    let req = h.request(h.authorization(nonce));
    assert!(h.facilitator.verify(&req).await.is_valid);
    wait_terminal(&h.store, nonce).await;

    assert!(h.facilitator.verify(&req).await.is_valid);
    assert_eq!(h.engine.dispatch_count(), 1);
    let entry = h.facilitator.workflow(nonce).await.unwrap().unwrap();
    assert_eq!(entry.status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn test_failed_workflow_is_reported() {
    let h = Harness::with_script(vec![EngineStatus::Failed {
        detail: "transfer reverted".into(),
    }]);
    let nonce = B256::repeat_byte(0xa8);
    let req = h.request(h.authorization(nonce));
    assert!(h.facilitator.verify(&req).await.is_valid);
    wait_terminal(&h.store, nonce).await;

    let settled = h.facilitator.settle(&req).await;
    assert!(!settled.success);
    assert_eq!(settled.error_reason, Some(SettleErrorReason::WorkflowFailed));
    assert!(settled.error_message.unwrap().contains("transfer reverted"));
}

#[tokio::test]
async fn test_rejected_dispatch_fails_verification() {
    let h = Harness::completing_with("0xTX");
    h.engine.reject_dispatches(Some("engine paused".into()));
    let nonce = B256::repeat_byte(0xa9);
    let req = h.request(h.authorization(nonce));

    let verified = h.facilitator.verify(&req).await;
    assert!(!verified.is_valid);
    assert_eq!(verified.invalid_reason, Some(InvalidReason::UnexpectedVerifyError));

    let entry = h.facilitator.workflow(nonce).await.unwrap().unwrap();
    assert_eq!(entry.status, WorkflowStatus::Failed);
    let settled = h.facilitator.settle(&req).await;
    assert_eq!(settled.error_reason, Some(SettleErrorReason::WorkflowFailed));

    // Once failed, the nonce stays refused even with the engine accepting again.
    h.engine.reject_dispatches(None);
    let again = h.facilitator.verify(&req).await;
    assert!(!again.is_valid);
    assert_eq!(again.invalid_reason, Some(InvalidReason::UnexpectedVerifyError));
    assert_eq!(h.engine.dispatch_count(), 1);
}

#[tokio::test]
async fn test_nonce_reused_by_another_payer() {
    let h = Harness::completing_with("0xfirst");
    let nonce = B256::repeat_byte(0xaa);
    let first = h.request(h.authorization(nonce));
    assert!(h.facilitator.verify(&first).await.is_valid);
    wait_terminal(&h.store, nonce).await;

    // A second funded payer signs their own authorization with the same nonce.
    let other = PrivateKeySigner::random();
    h.chain.set_balance(TOKEN, other.address(), U256::from(1_000_000u64));
    let mut auth = h.authorization(nonce);
    auth.from = other.address();
    let second = request_with(auth.clone(), sign(&other, &auth));

    let verified = h.facilitator.verify(&second).await;
    assert!(!verified.is_valid);
    assert_eq!(verified.invalid_reason, Some(InvalidReason::UnexpectedVerifyError));
    assert_eq!(verified.payer, Some(other.address()));
    assert_eq!(h.engine.dispatch_count(), 1);

    let settled = h.facilitator.settle(&second).await;
    assert!(!settled.success);
    assert_eq!(settled.error_reason, Some(SettleErrorReason::NoWorkflowTracked));
    assert_eq!(settled.transaction, None);

    // The first payer's settlement is unaffected.
    let settled = h.facilitator.settle(&first).await;
    assert_eq!(settled.transaction.as_deref(), Some("0xfirst"));
    assert_eq!(settled.payer, Some(h.payer.address()));
}
