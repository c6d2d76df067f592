//! Webhook gateway routes exercised in-process.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use gagstock::channels::gateway::{GatewayState, router};
use gagstock::channels::messenger::MessengerAdapter;
use gagstock::channels::traits::ChannelInboundMessage;
use gagstock::config::{GatewayConfig, MessengerConfig};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;

fn app(bearer: Option<&str>) -> (axum::Router, mpsc::Receiver<ChannelInboundMessage>) {
    let (tx, rx) = mpsc::channel(16);
    let config = GatewayConfig {
        verify_token: "verify-me".to_owned(),
        bearer_token: bearer.map(str::to_owned),
        ..GatewayConfig::default()
    };
    let messenger = Arc::new(MessengerAdapter::new(&MessengerConfig::default()));
    (router(GatewayState::new(&config, messenger, tx)), rx)
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _rx) = app(None);
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("ok"));
}

#[tokio::test]
async fn verification_echoes_challenge_for_matching_token() {
    let (app, _rx) = app(None);
    let uri = "/webhook?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1158201444";
    let response = app
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "1158201444");
}

#[tokio::test]
async fn verification_rejects_wrong_token() {
    let (app, _rx) = app(None);
    let uri = "/webhook?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=1";
    let response = app
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn page_events_are_queued() {
    let (app, mut rx) = app(None);
    let payload = json!({
        "object": "page",
        "entry": [{
            "id": "page-id",
            "messaging": [
                { "sender": { "id": "42" }, "message": { "text": "gagstock on carrot" } },
                { "sender": { "id": "page-id" }, "message": { "is_echo": true, "text": "echo" } }
            ]
        }]
    });
    let response = app.oneshot(post_json("/webhook", payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("\"queued_messages\":1"));

    let message = rx.recv().await.unwrap();
    assert_eq!(message.channel, "messenger");
    assert_eq!(message.sender, "42");
    assert_eq!(message.text, "gagstock on carrot");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn non_page_objects_are_rejected() {
    let (app, _rx) = app(None);
    let response = app
        .oneshot(post_json("/webhook", json!({"object": "instagram", "entry": []})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn generic_inbound_requires_bearer_when_configured() {
    let (app, mut rx) = app(Some("secret"));

    let denied = app
        .clone()
        .oneshot(post_json("/inbound", json!({"sender": "7", "text": "help"})))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let mut request = post_json("/inbound", json!({"sender": "7", "text": " help "}));
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer secret".parse().unwrap());
    let accepted = app.oneshot(request).await.unwrap();
    assert_eq!(accepted.status(), StatusCode::OK);

    let message = rx.recv().await.unwrap();
    assert_eq!(message.channel, "inbound");
    assert_eq!(message.reply_target, "7");
    assert_eq!(message.text, "help");
}

#[tokio::test]
async fn generic_inbound_rejects_blank_text() {
    let (app, _rx) = app(None);
    let response = app
        .oneshot(post_json("/inbound", json!({"sender": "7", "text": "   "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
