use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use fulfillment::{
    build_router,
    infrastructure::db::entities::order::OrderStatus,
    middleware::logging::{INTERNAL_KEY_HEADER, SIGNATURE_HEADER},
    services::scheduler::{self, AI_POLL},
    utils::security::sign_hex,
};

mod support;

use support::{CALLBACK_SECRET, INTERNAL_KEY, TestApp, draft};

fn rpc(method: &str, params: Value, key: Option<&str>) -> Request<Body> {
    let mut request = Request::builder()
        .method("POST")
        .uri("/api/rpc")
        .header("content-type", "application/json");
    if let Some(key) = key {
        request = request.header(INTERNAL_KEY_HEADER, key);
    }

    request
        .body(Body::from(
            json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": 1 }).to_string(),
        ))
        .unwrap()
}

async fn call(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = build_router(app.state.clone())
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn health_answers_ok() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = call(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn rpc_requires_the_internal_key() {
    let app = TestApp::new().await;

    let (status, body) = call(&app, rpc("order.get", json!({ "orderId": 1 }), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], json!(-32020));

    let (status, _) = call(&app, rpc("order.get", json!({ "orderId": 1 }), Some("wrong"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rpc_creates_and_reads_orders() {
    let app = TestApp::new().await;

    let (status, body) = call(
        &app,
        rpc(
            "order.create",
            json!({
                "productCategory": "portrait",
                "customerName": "Ada",
                "customerPhone": "13800000000",
                "priceCents": 19900,
            }),
            Some(INTERNAL_KEY),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["status"], json!("unpaid"));
    let order_id = body["result"]["id"].as_i64().unwrap();

    let (_, body) = call(
        &app,
        rpc("order.get", json!({ "orderId": order_id }), Some(INTERNAL_KEY)),
    )
    .await;
    assert_eq!(body["result"]["status"], json!("unpaid"));
    assert_eq!(body["id"], json!(1));
}

#[tokio::test]
async fn rpc_errors_carry_codes_and_reasons() {
    let app = TestApp::new().await;
    let order = app.create_order(draft()).await;

    let (_, body) = call(&app, rpc("order.explode", json!({}), Some(INTERNAL_KEY))).await;
    assert_eq!(body["error"]["code"], json!(-32601));

    let (_, body) = call(
        &app,
        rpc(
            "order.transition",
            json!({ "orderId": order.id, "target": "shipped" }),
            Some(INTERNAL_KEY),
        ),
    )
    .await;
    assert_eq!(body["error"]["code"], json!(-32040));
    assert_eq!(body["error"]["data"]["reason"], json!("illegal_transition"));
    assert_eq!(app.status(order.id).await, OrderStatus::Unpaid);

    let (_, body) = call(&app, rpc("order.get", json!({ "orderId": "x" }), Some(INTERNAL_KEY))).await;
    assert_eq!(body["error"]["code"], json!(-32602));
}

#[tokio::test]
async fn logistics_callback_route_checks_the_signature() {
    let app = TestApp::new().await;
    let payload = json!({ "order_no": "PET19990101000000ZZZZ", "tracking_number": "SF1" }).to_string();

    let unsigned = Request::builder()
        .method("POST")
        .uri("/api/printer/logistics-callback")
        .body(Body::from(payload.clone()))
        .unwrap();
    let (status, _) = call(&app, unsigned).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let signature = sign_hex(CALLBACK_SECRET, payload.as_bytes()).unwrap();
    let signed = Request::builder()
        .method("POST")
        .uri("/api/printer/logistics-callback")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(payload))
        .unwrap();
    let (status, body) = call(&app, signed).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
}

#[tokio::test]
async fn scheduler_skips_concerns_leased_elsewhere() {
    let app = TestApp::new().await;
    assert!(
        app.state
            .cache
            .try_acquire_lease(AI_POLL, "other-worker")
            .await
            .unwrap()
    );

    let report = scheduler::run_once(&app.state, "this-worker").await;

    assert!(report.ai.is_none());
    assert!(report.printer.is_some());
    assert!(report.expiry.is_some());

    // The losing worker must not have released the foreign lease.
    assert!(
        !app.state
            .cache
            .try_acquire_lease(AI_POLL, "third-worker")
            .await
            .unwrap()
    );
}
