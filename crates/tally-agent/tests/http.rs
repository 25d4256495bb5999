use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use chrono_tz::Tz;
use serde_json::{Value, json};
use tally_agent::agent::CreateAgentError;
use tally_agent::runtime::router;
use tally_agent::{Invoker, build_agent};
use tally_agent_model::{ErrorKind, ModelMessage};
use tally_agent_test_model::{PresetResponse, TestModelProvider};
use tower::ServiceExt;

fn app(provider: &TestModelProvider) -> Router {
    let provider = provider.clone();
    router(Arc::new(Invoker::new(move || {
        Ok::<_, CreateAgentError>(build_agent(provider.clone(), Tz::UTC))
    })))
}

fn invocation(body: impl Into<Body>) -> Request<Body> {
    Request::post("/invocations")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_invocation_with_prompt() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::text("4"));

    let (status, body) = send(
        app(&provider),
        invocation(r#"{"prompt": "What is 2 + 2?"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "success", "response": "4" }));
    assert_eq!(
        provider.requests()[0].messages,
        [ModelMessage::User("What is 2 + 2?".to_owned())]
    );
}

#[tokio::test]
async fn test_empty_body_uses_default_prompt() {
    let mut provider = TestModelProvider::default();
    provider.add_response(PresetResponse::text("Hello there!"));
    provider.add_response(PresetResponse::text("Hello again!"));

    let (status, body) = send(app(&provider), invocation(Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Hello there!");

    let (_, body) = send(app(&provider), invocation("{}")).await;
    assert_eq!(body["response"], "Hello again!");

    for request in provider.requests() {
        assert_eq!(request.messages, [ModelMessage::User("Hello!".to_owned())]);
    }
}

#[tokio::test]
async fn test_malformed_body() {
    let provider = TestModelProvider::default();

    let (status, body) =
        send(app(&provider), invocation("{\"prompt\": ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{body}");
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn test_failures_are_reported_in_the_body() {
    let mut provider = TestModelProvider::default();
    provider.add_failure(ErrorKind::Unauthorized);

    let (status, body) =
        send(app(&provider), invocation(r#"{"prompt": "Hi"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "status": "error", "error": "Internal processing error" })
    );
}

#[tokio::test]
async fn test_ping() {
    let request = Request::get("/ping").body(Body::empty()).unwrap();
    let (status, body) =
        send(app(&TestModelProvider::default()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Healthy");
    assert!(body["time_of_last_update"].as_i64().is_some(), "{body}");
}

#[tokio::test]
async fn test_unknown_route() {
    let request = Request::get("/nope").body(Body::empty()).unwrap();
    let response = app(&TestModelProvider::default())
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
