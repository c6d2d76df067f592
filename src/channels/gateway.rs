use crate::channels::messenger::MessengerAdapter;
use crate::channels::traits::ChannelInboundMessage;
use crate::config::GatewayConfig;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct GatewayState {
    inbound_tx: mpsc::Sender<ChannelInboundMessage>,
    verify_token: String,
    bearer_token: Option<String>,
    messenger: Arc<MessengerAdapter>,
}

impl GatewayState {
    pub fn new(
        config: &GatewayConfig,
        messenger: Arc<MessengerAdapter>,
        inbound_tx: mpsc::Sender<ChannelInboundMessage>,
    ) -> Self {
        let bearer_token = config
            .bearer_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned);
        Self {
            inbound_tx,
            verify_token: config.verify_token.clone(),
            bearer_token,
            messenger,
        }
    }
}

#[derive(serde::Deserialize)]
struct GenericInboundBody {
    #[serde(default = "default_inbound_channel")]
    channel: String,
    sender: String,
    #[serde(default)]
    reply_target: Option<String>,
    text: String,
}

fn default_inbound_channel() -> String {
    "inbound".to_owned()
}

#[derive(serde::Deserialize)]
struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// Routes: `/health`, `/webhook` (Messenger verify + events) and `/inbound`.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(gateway_health))
        .route("/webhook", get(messenger_verify).post(messenger_inbound))
        .route("/inbound", post(generic_inbound))
        .with_state(state)
}

/// Serve the gateway until `shutdown` fires.
pub async fn run_gateway(
    config: GatewayConfig,
    messenger: Arc<MessengerAdapter>,
    inbound_tx: mpsc::Sender<ChannelInboundMessage>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let app = router(GatewayState::new(&config, messenger, inbound_tx));

    tracing::info!("webhook gateway listening on http://{local_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn gateway_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

fn bearer_is_valid(headers: &HeaderMap, expected: &Option<String>) -> bool {
    let Some(expected_token) = expected else {
        return true;
    };
    let candidate = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .trim();
    !expected_token.is_empty() && candidate == expected_token
}

async fn generic_inbound(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<GenericInboundBody>,
) -> impl IntoResponse {
    if !bearer_is_valid(&headers, &state.bearer_token) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "unauthorized"})),
        );
    }

    let sender = body.sender.trim();
    let text = body.text.trim();
    if sender.is_empty() || text.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "sender and text are required"})),
        );
    }

    let reply_target = body
        .reply_target
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(sender)
        .to_owned();

    let inbound = ChannelInboundMessage {
        channel: body.channel,
        sender: sender.to_owned(),
        reply_target,
        text: text.to_owned(),
    };
    if state.inbound_tx.send(inbound).await.is_err() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "bot runtime unavailable"})),
        );
    }

    (StatusCode::OK, Json(serde_json::json!({"queued": true})))
}

async fn messenger_verify(
    State(state): State<GatewayState>,
    Query(query): Query<VerifyQuery>,
) -> impl IntoResponse {
    let mode = query.mode.unwrap_or_default();
    let token = query.verify_token.unwrap_or_default();
    if mode == "subscribe" && !state.verify_token.is_empty() && token == state.verify_token {
        tracing::info!("messenger webhook verified");
        return (StatusCode::OK, query.challenge.unwrap_or_default()).into_response();
    }

    tracing::warn!(%mode, "messenger webhook verification rejected");
    (StatusCode::FORBIDDEN, "verification failed").into_response()
}

async fn messenger_inbound(
    State(state): State<GatewayState>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    if payload.get("object").and_then(serde_json::Value::as_str) != Some("page") {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "not a page event"})),
        );
    }

    let mut queued: usize = 0;
    for message in state.messenger.parse_webhook_payload(&payload) {
        if state.inbound_tx.send(message).await.is_ok() {
            queued = queued.saturating_add(1);
        }
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "received": true,
            "queued_messages": queued
        })),
    )
}
