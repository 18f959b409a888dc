//! Concurrent verification of one authorization.

use alloy_primitives::B256;
use futures::future::join_all;
use tollgate_core::WorkflowStatus;
use tollgate_integration_tests::{wait_terminal, Harness};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_verifies_dispatch_once() {
    let h = Harness::completing_with("0xTX");
    h.engine.set_dispatch_delay(std::time::Duration::from_millis(20));
    let nonce = B256::repeat_byte(0xc1);
    let req = h.request(h.authorization(nonce));

    let responses = join_all((0..24).map(|_| {
        let facilitator = h.facilitator.clone();
        let req = req.clone();
        tokio::spawn(async move { facilitator.verify(&req).await })
    }))
    .await;

    for response in responses {
        assert!(response.unwrap().is_valid);
    }
    assert_eq!(h.engine.dispatch_count(), 1);

    wait_terminal(&h.store, nonce).await;
    let entry = h.facilitator.workflow(nonce).await.unwrap().unwrap();
    assert_eq!(entry.status, WorkflowStatus::Completed);
    assert_eq!(h.engine.dispatch_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_nonces_dispatch_independently() {
    let h = Harness::completing_with("0xTX");
    let requests: Vec<_> = (0..8u8)
        .map(|i| h.request(h.authorization(B256::repeat_byte(0xd0 + i))))
        .collect();

    let responses = join_all(requests.iter().map(|req| h.facilitator.verify(req))).await;
    assert!(responses.iter().all(|r| r.is_valid));
    assert_eq!(h.engine.dispatch_count(), 8);

    for req in &requests {
        let settled = h.facilitator.settle(req).await;
        assert!(settled.success);
    }
}
