//! Router-level coverage of the organization/integration CRUD surface and
//! the ingestion endpoints' error paths that don't require a live Slack/
//! Discord connection (constructing a real `ChatAdapter` needs outbound
//! network access, so the happy paths for message/reaction ingestion are
//! covered at the Jobs Service / Scheduler level in the root integration
//! tests instead).

use std::sync::Arc;

use http_body_util::BodyExt;
use tower::ServiceExt;

use chatbridge_core::Database;
use chatbridge_web::app::AppState;
use chatbridge_web::create_router;

async fn test_router() -> axum::Router {
    let db = Database::in_memory().await.unwrap();
    let state = Arc::new(AppState::new(db, None));
    create_router(state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_reports_ok() {
    let router = test_router().await;
    let request = axum::http::Request::builder().uri("/healthz").body(axum::body::Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}

#[tokio::test]
async fn metrics_endpoint_serves_prometheus_text() {
    let router = test_router().await;
    let request = axum::http::Request::builder().uri("/metrics").body(axum::body::Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains("chatbridge_queue_depth"));
}

#[tokio::test]
async fn organization_and_integration_crud_round_trips() {
    let router = test_router().await;

    let create_org = axum::http::Request::builder()
        .method("POST")
        .uri("/organizations")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&serde_json::json!({ "name": "acme" })).unwrap()))
        .unwrap();
    let response = router.clone().oneshot(create_org).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let org_body = body_json(response).await;
    let org_id = org_body["id"].as_str().unwrap().to_string();

    let create_integration = axum::http::Request::builder()
        .method("POST")
        .uri("/integrations")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(
            serde_json::to_vec(&serde_json::json!({
                "org_id": org_id,
                "platform": "slack",
                "workspace_id": "T1",
                "bot_token": "xoxb-test",
            }))
            .unwrap(),
        ))
        .unwrap();
    let response = router.clone().oneshot(create_integration).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let integration_body = body_json(response).await;
    let integration_id = integration_body["id"].as_str().unwrap().to_string();
    assert_eq!(integration_body["workspace_id"], "T1");

    let list = axum::http::Request::builder()
        .uri(format!("/integrations?org_id={org_id}"))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router.clone().oneshot(list).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let delete = axum::http::Request::builder()
        .method("DELETE")
        .uri(format!("/integrations/{integration_id}?org_id={org_id}"))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router.clone().oneshot(delete).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let list_after_delete = axum::http::Request::builder()
        .uri(format!("/integrations?org_id={org_id}"))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router.oneshot(list_after_delete).await.unwrap();
    let listed = body_json(response).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn ingesting_a_message_for_an_unknown_integration_is_rejected() {
    let router = test_router().await;
    let event = serde_json::json!({
        "platform": "slack",
        "integration_id": "itg_01J00000000000000000000000",
        "org_id": "org_01J00000000000000000000000",
        "user_id": "U1",
        "channel_id": "C1",
        "thread_key": null,
        "message_key": "C1:1700000000.000100",
        "text": "@bot do X",
        "mentions": [],
    });
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/events/message")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&event).unwrap()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
}
