//! Chat commands driven end to end against a mock stock feed.

use async_trait::async_trait;
use gagstock::channels::traits::{ChannelAdapter, ChannelOutboundMessage};
use gagstock::commands::{AdminAllowlist, CommandDispatcher};
use gagstock::config::TrackerConfig;
use gagstock::tracker::{InMemorySessionStore, TrackerManager};
use gagstock_feed::{FeedConfig, HttpStockFeed};
use serde_json::json;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<ChannelOutboundMessage>>,
}

impl Outbox {
    fn sent_to(&self, user: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.reply_target == user)
            .map(|m| m.text.clone())
            .collect()
    }
}

#[async_trait]
impl ChannelAdapter for Outbox {
    fn id(&self) -> &'static str {
        "outbox"
    }

    async fn send(&self, message: ChannelOutboundMessage) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn health_check(&self) -> anyhow::Result<bool> {
        Ok(true)
    }
}

async fn feed_server(stock: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stock"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stock))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "currentWeather": "Rain",
            "icon": "🌧️",
            "cropBonuses": "Wet"
        })))
        .mount(&server)
        .await;
    server
}

fn trowel_stock() -> serde_json::Value {
    json!({
        "gearStock": [{"name": "Trowel", "value": 5}],
        "seedsStock": [{"name": "Carrot", "value": 1500}],
        "eggStock": [{"name": "Common Egg", "value": 1}],
        "cosmeticsStock": [],
        "honeyStock": []
    })
}

fn dispatcher(server: &MockServer, admins: &[&str]) -> (CommandDispatcher, Arc<Outbox>) {
    let feed = HttpStockFeed::new(&FeedConfig {
        stock_url: format!("{}/stock", server.uri()),
        weather_url: format!("{}/weather", server.uri()),
        timeout_seconds: 2,
        user_agent: None,
    })
    .unwrap();
    let outbox = Arc::new(Outbox::default());
    let tracker = TrackerManager::new(
        TrackerConfig::default(),
        Arc::new(InMemorySessionStore::new()),
        Arc::new(feed),
        outbox.clone(),
    );
    let admins = AdminAllowlist::new(admins.iter().map(|a| (*a).to_owned()).collect());
    (CommandDispatcher::new(tracker, Arc::new(admins)), outbox)
}

#[tokio::test]
async fn start_without_filters_sends_stock() {
    let server = feed_server(trowel_stock()).await;
    let (dispatcher, outbox) = dispatcher(&server, &[]);

    let reply = dispatcher.dispatch("u1", "gagstock on").await;
    assert!(reply.contains("tracking started"));

    let sent = outbox.sent_to("u1");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Trowel"));
    assert!(sent[0].contains("x5"));
    assert!(sent[0].contains("x1.5K"));
    assert!(sent[0].contains("🌧️ Rain"));
    assert!(dispatcher.tracker().cache().contains("u1"));
}

#[tokio::test]
async fn start_with_unmatched_filter_sends_nothing() {
    let server = feed_server(trowel_stock()).await;
    let (dispatcher, outbox) = dispatcher(&server, &[]);

    let reply = dispatcher.dispatch("u1", "gagstock on Sunflower").await;
    assert!(reply.contains("Nothing matching"));
    assert!(outbox.sent_to("u1").is_empty());
    assert!(dispatcher.tracker().status("u1").is_some());
}

#[tokio::test]
async fn second_start_reports_already_active() {
    let server = feed_server(trowel_stock()).await;
    let (dispatcher, _outbox) = dispatcher(&server, &[]);

    dispatcher.dispatch("u1", "gagstock on").await;
    let reply = dispatcher.dispatch("u1", "gagstock on carrot").await;
    assert!(reply.contains("already active"));
    assert_eq!(dispatcher.tracker().active_count(), 1);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let server = feed_server(trowel_stock()).await;
    let (dispatcher, _outbox) = dispatcher(&server, &[]);

    assert!(dispatcher.dispatch("u1", "gagstock off").await.contains("No active session"));
    dispatcher.dispatch("u1", "gagstock on").await;
    assert!(dispatcher.dispatch("u1", "gagstock off").await.contains("stopped"));
    assert!(dispatcher.dispatch("u1", "gagstock off").await.contains("No active session"));
    assert!(!dispatcher.tracker().cache().contains("u1"));
}

#[tokio::test]
async fn refresh_resends_unchanged_stock() {
    let server = feed_server(trowel_stock()).await;
    let (dispatcher, outbox) = dispatcher(&server, &[]);

    dispatcher.dispatch("u1", "gagstock on").await;
    let reply = dispatcher.dispatch("u1", "gagstock refresh").await;
    assert!(reply.contains("refreshed"));
    assert_eq!(outbox.sent_to("u1").len(), 2);
}

#[tokio::test]
async fn failed_first_fetch_rolls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    let (dispatcher, outbox) = dispatcher(&server, &[]);

    let reply = dispatcher.dispatch("u1", "gagstock on").await;
    assert!(reply.contains("Couldn't fetch"));
    assert_eq!(dispatcher.tracker().active_count(), 0);
    assert!(outbox.sent_to("u1").is_empty());
}

#[tokio::test]
async fn status_lists_filters() {
    let server = feed_server(trowel_stock()).await;
    let (dispatcher, _outbox) = dispatcher(&server, &[]);

    dispatcher.dispatch("u1", "gagstock on Trowel | carrot").await;
    let reply = dispatcher.dispatch("u1", "gagstock status").await;
    assert!(reply.contains("Filters: trowel, carrot"));
}

#[tokio::test]
async fn admin_commands_need_an_allowlisted_id() {
    let server = feed_server(trowel_stock()).await;
    let (dispatcher, _outbox) = dispatcher(&server, &["boss"]);
    dispatcher.dispatch("u1", "gagstock on").await;
    dispatcher.dispatch("u2", "gagstock on").await;

    assert!(dispatcher.dispatch("u1", "admin sessions").await.contains("admins only"));

    let sessions = dispatcher.dispatch("boss", "admin sessions").await;
    assert!(sessions.contains("Active sessions: 2"));
    assert!(sessions.contains("- u1"));

    let stopped = dispatcher.dispatch("boss", "admin stopall").await;
    assert!(stopped.contains("Stopped 2"));
    assert_eq!(dispatcher.tracker().active_count(), 0);
}

#[tokio::test]
async fn free_text_is_classified() {
    let server = feed_server(trowel_stock()).await;
    let (dispatcher, outbox) = dispatcher(&server, &[]);

    let reply = dispatcher.dispatch("u1", "track carrot").await;
    assert!(reply.contains("tracking started for carrot"));
    assert_eq!(outbox.sent_to("u1").len(), 1);

    assert!(dispatcher.dispatch("u1", "please stop tracking").await.contains("stopped"));
    assert!(dispatcher.dispatch("u1", "good morning").await.contains("help"));
}
