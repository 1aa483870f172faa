use std::time::{Duration, Instant};

use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, app_with, Collector, RecordedPost, Reply};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn metrics_post(authorization: &str, body: &str) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri("/v1/metrics")
        .header(http::header::AUTHORIZATION, authorization)
        .header(http::header::USER_AGENT, "agent/1.0")
        .header(http::header::CONTENT_TYPE, "application/json; charset=utf-8")
        .body(body.to_string())
        .unwrap()
}

fn list_request() -> Request<String> {
    Request::builder()
        .uri("/v1/metrics")
        .body(String::new())
        .unwrap()
}

// --- record ---

#[tokio::test]
async fn post_returns_default_reply() {
    let resp = app()
        .oneshot(metrics_post("Basic YTpi", r#"{"gauge":1}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, "ok");
}

#[tokio::test]
async fn post_is_recorded_with_headers() {
    let db = Collector::new();
    let resp = app_with(db.clone())
        .oneshot(metrics_post("Basic YTpi", r#"{"gauge":1}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let received = db.received().await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].authorization.as_deref(), Some("Basic YTpi"));
    assert_eq!(received[0].user_agent.as_deref(), Some("agent/1.0"));
    assert_eq!(
        received[0].content_type.as_deref(),
        Some("application/json; charset=utf-8")
    );
    assert_eq!(received[0].body, r#"{"gauge":1}"#);
}

#[tokio::test]
async fn configured_error_reply_is_returned() {
    let db = Collector::new();
    db.set_reply(Reply {
        status: 503,
        body: "try later".to_string(),
        delay: Duration::ZERO,
    })
    .await;

    let resp = app_with(db.clone())
        .oneshot(metrics_post("Basic YTpi", "{}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_bytes(resp).await, "try later");
    assert_eq!(db.received().await.len(), 1);
}

#[tokio::test]
async fn reply_delay_is_honored() {
    let db = Collector::new();
    db.set_reply(Reply {
        delay: Duration::from_millis(100),
        ..Reply::default()
    })
    .await;

    let start = Instant::now();
    let resp = app_with(db).oneshot(metrics_post("Basic YTpi", "{}")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(start.elapsed() >= Duration::from_millis(100));
}

// --- authorization ---

#[tokio::test]
async fn wrong_authorization_is_rejected_and_not_recorded() {
    let db = Collector::new();
    db.require_authorization("Basic YTpi").await;

    let resp = app_with(db.clone())
        .oneshot(metrics_post("Basic bm9wZQ==", "{}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(db.received().await.is_empty());
}

#[tokio::test]
async fn missing_authorization_is_rejected() {
    let db = Collector::new();
    db.require_authorization("Basic YTpi").await;

    let req = Request::builder()
        .method("POST")
        .uri("/v1/metrics")
        .body("{}".to_string())
        .unwrap();
    let resp = app_with(db).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn matching_authorization_is_accepted() {
    let db = Collector::new();
    db.require_authorization("Basic YTpi").await;

    let resp = app_with(db.clone())
        .oneshot(metrics_post("Basic YTpi", "{}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(db.received().await.len(), 1);
}

// --- list ---

#[tokio::test]
async fn list_starts_empty() {
    let resp = app().oneshot(list_request()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let posts: Vec<RecordedPost> = body_json(resp).await;
    assert!(posts.is_empty());
}

#[tokio::test]
async fn list_returns_posts_in_arrival_order() {
    use tower::Service;

    let mut app = app().into_service();

    for body in [r#"{"n":1}"#, r#"{"n":2}"#] {
        let resp = ServiceExt::ready(&mut app)
            .await
            .unwrap()
            .call(metrics_post("Basic YTpi", body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(list_request())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let posts: Vec<RecordedPost> = body_json(resp).await;
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].body, r#"{"n":1}"#);
    assert_eq!(posts[1].body, r#"{"n":2}"#);
    assert_ne!(posts[0].id, posts[1].id);
}

#[tokio::test]
async fn put_is_not_allowed() {
    let req = Request::builder()
        .method("PUT")
        .uri("/v1/metrics")
        .body(String::new())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}
