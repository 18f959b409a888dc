//! The facilitator behind its axum router, as a resource server sees it.

use alloy_primitives::{B256, U256};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tollgate_integration_tests::{now, wait_terminal, Harness};
use tollgate_node::api::build_router;
use tollgate_node::NodeState;
use tower::ServiceExt;

fn router(h: &Harness) -> Router {
    build_router(Arc::new(NodeState::new(h.facilitator.clone())))
}

async fn post(app: &Router, uri: &str, body: &Value) -> Value {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_wire_format_of_a_full_payment() {
    let h = Harness::completing_with("0xTX");
    let app = router(&h);
    let nonce = B256::repeat_byte(0xe1);
    let body = serde_json::to_value(h.request(h.authorization(nonce))).unwrap();

    // Amounts travel as decimal strings.
    assert_eq!(body["paymentPayload"]["payload"]["authorization"]["value"], "10000");
    assert_eq!(body["paymentRequirements"]["maxAmountRequired"], "10000");

    let verified = post(&app, "/verify", &body).await;
    let payer = serde_json::to_value(h.payer.address()).unwrap();
    assert_eq!(verified, json!({ "isValid": true, "payer": payer }));

    wait_terminal(&h.store, nonce).await;
    let settled = post(&app, "/settle", &body).await;
    assert_eq!(
        settled,
        json!({
            "success": true,
            "transaction": "0xTX",
            "network": "base-sepolia",
            "payer": payer,
        })
    );
}

#[tokio::test]
async fn test_wire_format_of_rejections() {
    let h = Harness::completing_with("0xTX");
    let app = router(&h);
    let mut auth = h.authorization(B256::repeat_byte(0xe2));
    auth.valid_before = U256::from(now() + 2);
    let body = serde_json::to_value(h.request(auth)).unwrap();

    let verified = post(&app, "/verify", &body).await;
    assert_eq!(verified["isValid"], false);
    assert_eq!(verified["invalidReason"], "authorization_expiring_too_soon");

    let settled = post(&app, "/settle", &body).await;
    assert_eq!(settled["success"], false);
    assert_eq!(settled["errorReason"], "no_workflow_tracked");
    assert!(settled.get("transaction").is_none());
}
