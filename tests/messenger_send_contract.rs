//! Contract tests for the Messenger Send API adapter.

use gagstock::channels::messenger::{MAX_MESSAGE_CHARS, MessengerAdapter};
use gagstock::channels::traits::{ChannelAdapter, ChannelOutboundMessage};
use gagstock::config::MessengerConfig;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn adapter_for(server: &MockServer, token: &str) -> MessengerAdapter {
    MessengerAdapter::new(&MessengerConfig {
        page_access_token: token.to_owned(),
        graph_base_url: format!("{}/v18.0", server.uri()),
    })
}

#[tokio::test]
async fn send_posts_recipient_and_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v18.0/me/messages"))
        .and(query_param("access_token", "page-token"))
        .and(body_json(json!({
            "recipient": { "id": "12345" },
            "message": { "text": "🛑 Gagstock tracking stopped." }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message_id": "m1"})))
        .expect(1)
        .mount(&server)
        .await;

    adapter_for(&server, "page-token")
        .send(ChannelOutboundMessage {
            reply_target: "12345".to_owned(),
            text: "🛑 Gagstock tracking stopped.".to_owned(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn long_messages_are_sent_in_chunks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v18.0/me/messages"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let line = "- Carrot: x10";
    let lines = MAX_MESSAGE_CHARS / line.len() + 10;
    let text = vec![line; lines].join("\n");

    adapter_for(&server, "page-token")
        .send(ChannelOutboundMessage {
            reply_target: "12345".to_owned(),
            text,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v18.0/me/messages"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid recipient"))
        .mount(&server)
        .await;

    let err = adapter_for(&server, "page-token")
        .send(ChannelOutboundMessage {
            reply_target: "nobody".to_owned(),
            text: "hi".to_owned(),
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("400"));
    assert!(err.to_string().contains("invalid recipient"));
}

#[tokio::test]
async fn empty_token_fails_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = adapter_for(&server, "  ")
        .send(ChannelOutboundMessage {
            reply_target: "12345".to_owned(),
            text: "hi".to_owned(),
        })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn health_check_reflects_page_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v18.0/me"))
        .and(query_param("access_token", "page-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "page"})))
        .mount(&server)
        .await;

    assert!(adapter_for(&server, "page-token").health_check().await.unwrap());
    assert!(!adapter_for(&server, "").health_check().await.unwrap());
}
