//! Messaging platform integration.
//!
//! The gateway turns webhook calls into [`ChannelInboundMessage`]s on a
//! bounded queue. The runtime loop rate limits each user, runs the command
//! and sends the reply through the Messenger adapter.

pub mod gateway;
pub mod messenger;
pub mod rate_limit;
pub mod traits;

use crate::channels::gateway::run_gateway;
use crate::channels::messenger::MessengerAdapter;
use crate::channels::rate_limit::UserRateLimiters;
use crate::channels::traits::{ChannelAdapter, ChannelInboundMessage, ChannelOutboundMessage};
use crate::commands::{AdminAllowlist, CommandDispatcher};
use crate::config::{BotConfig, ConfigIssueSeverity, validate_config};
use crate::tracker::{InMemorySessionStore, TrackerManager};
use gagstock_feed::HttpStockFeed;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// How often idle rate-limit windows and sender queues are dropped.
const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Reply for users over their command budget.
pub const SLOW_DOWN: &str = "⏳ Slow down! You're sending commands too fast. Try again in a minute.";

/// One sender's command queue. `pending` counts messages queued or running.
struct SenderQueue {
    tx: mpsc::UnboundedSender<ChannelInboundMessage>,
    pending: Arc<AtomicUsize>,
}

/// Rate limits inbound messages and hands accepted ones to the dispatcher.
///
/// Each sender gets one worker task that runs their commands in arrival
/// order, so "on" followed by "off" can never be applied as "off, on".
/// Different senders run concurrently.
pub struct InboundRouter {
    dispatcher: CommandDispatcher,
    replies: Arc<dyn ChannelAdapter>,
    limiters: UserRateLimiters,
    /// Whether the slow-down notice was already sent in the current window.
    warned: HashSet<String>,
    queues: HashMap<String, SenderQueue>,
}

impl InboundRouter {
    pub fn new(
        dispatcher: CommandDispatcher,
        replies: Arc<dyn ChannelAdapter>,
        max_commands_per_minute: u32,
    ) -> Self {
        Self {
            dispatcher,
            replies,
            limiters: UserRateLimiters::new(max_commands_per_minute),
            warned: HashSet::new(),
            queues: HashMap::new(),
        }
    }

    /// Route one message. Accepted commands go to the sender's queue; new
    /// queue workers are spawned on `tasks`.
    pub fn route(&mut self, message: ChannelInboundMessage, tasks: &mut JoinSet<()>) {
        if let Err(err) = self.limiters.try_acquire(&message.sender) {
            tracing::warn!(sender = %message.sender, %err, "inbound command rate limited");
            // One notice per burst.
            if !self.warned.insert(message.sender.clone()) {
                return;
            }
            let replies = Arc::clone(&self.replies);
            tasks.spawn(async move {
                send_reply(replies.as_ref(), message.reply_target, SLOW_DOWN.to_owned()).await;
            });
            return;
        }
        self.warned.remove(&message.sender);

        let sender = message.sender.clone();
        let message = match self.enqueue(&sender, message, tasks) {
            Ok(()) => return,
            Err(message) => message,
        };
        // The worker is gone (it panicked); start a fresh one.
        tracing::warn!(sender = %sender, "command queue worker missing; restarting");
        self.queues.remove(&sender);
        if self.enqueue(&sender, message, tasks).is_err() {
            tracing::error!(sender = %sender, "dropping command: queue worker unavailable");
        }
    }

    fn enqueue(
        &mut self,
        sender: &str,
        message: ChannelInboundMessage,
        tasks: &mut JoinSet<()>,
    ) -> Result<(), ChannelInboundMessage> {
        if !self.queues.contains_key(sender) {
            let (tx, rx) = mpsc::unbounded_channel();
            let pending = Arc::new(AtomicUsize::new(0));
            tasks.spawn(run_sender_queue(
                self.dispatcher.clone(),
                Arc::clone(&self.replies),
                rx,
                Arc::clone(&pending),
            ));
            self.queues
                .insert(sender.to_owned(), SenderQueue { tx, pending });
        }
        let Some(queue) = self.queues.get(sender) else {
            return Err(message);
        };
        queue.pending.fetch_add(1, Ordering::AcqRel);
        queue.tx.send(message).map_err(|mpsc::error::SendError(message)| {
            queue.pending.fetch_sub(1, Ordering::AcqRel);
            message
        })
    }

    /// Drop stale rate-limit windows and the queues of senders with nothing
    /// queued or running. A dropped queue's worker exits on its own.
    pub fn prune(&mut self) {
        self.limiters.prune();
        let limiters = &self.limiters;
        self.warned.retain(|user| limiters.remaining(user) == 0);
        self.queues
            .retain(|_, queue| queue.pending.load(Ordering::Acquire) > 0);
    }

    /// Close every sender queue. Workers finish what is already queued and
    /// then exit.
    pub fn close(&mut self) {
        self.queues.clear();
    }
}

async fn run_sender_queue(
    dispatcher: CommandDispatcher,
    replies: Arc<dyn ChannelAdapter>,
    mut rx: mpsc::UnboundedReceiver<ChannelInboundMessage>,
    pending: Arc<AtomicUsize>,
) {
    while let Some(message) = rx.recv().await {
        tracing::info!(channel = %message.channel, sender = %message.sender, "inbound command");
        let reply = dispatcher.dispatch(&message.sender, &message.text).await;
        send_reply(replies.as_ref(), message.reply_target, reply).await;
        pending.fetch_sub(1, Ordering::AcqRel);
    }
}

async fn send_reply(adapter: &dyn ChannelAdapter, reply_target: String, text: String) {
    let outbound = ChannelOutboundMessage { reply_target, text };
    if let Err(err) = adapter.send(outbound).await {
        tracing::warn!("failed to send {} reply: {err}", adapter.id());
    }
}

/// Run the bot until `shutdown` fires.
///
/// # Errors
///
/// Returns an error when the configuration has blocking issues or the feed
/// client cannot be built.
pub async fn run_runtime(config: BotConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let validation = validate_config(&config);
    let has_error = validation
        .iter()
        .any(|issue| issue.severity == ConfigIssueSeverity::Error);
    for issue in validation {
        match issue.severity {
            ConfigIssueSeverity::Warning => tracing::warn!("{}: {}", issue.id, issue.summary),
            ConfigIssueSeverity::Error => tracing::error!("{}: {}", issue.id, issue.summary),
        }
    }
    if has_error {
        anyhow::bail!("configuration has blocking errors");
    }

    let feed = Arc::new(HttpStockFeed::new(&config.feed)?);
    let messenger = Arc::new(MessengerAdapter::new(&config.messenger));
    match messenger.health_check().await {
        Ok(true) => tracing::info!("messenger send API reachable"),
        Ok(false) => tracing::warn!("messenger health check failed; replies may not be delivered"),
        Err(err) => tracing::warn!("messenger health check errored: {err}"),
    }

    let store = Arc::new(InMemorySessionStore::new());
    let tracker = TrackerManager::new(
        config.tracker.clone(),
        store,
        feed,
        messenger.clone(),
    );
    let dispatcher = CommandDispatcher::new(
        tracker.clone(),
        Arc::new(AdminAllowlist::from_config(&config.admin)),
    );
    let mut router = InboundRouter::new(
        dispatcher,
        messenger.clone(),
        config.rate_limit.max_commands_per_minute,
    );

    let queue_size = config.gateway.inbound_queue_size.max(8);
    let (inbound_tx, mut inbound_rx) = mpsc::channel::<ChannelInboundMessage>(queue_size);

    let sweeper = tracker.spawn_sweeper(shutdown.child_token());

    let mut workers = JoinSet::new();
    {
        let gateway_cfg = config.gateway.clone();
        let gateway_shutdown = shutdown.child_token();
        let messenger = messenger.clone();
        workers.spawn(async move {
            if let Err(err) = run_gateway(gateway_cfg, messenger, inbound_tx, gateway_shutdown).await {
                tracing::error!("webhook gateway stopped: {err}");
            }
        });
    }
    tracing::info!("gagstock runtime started");

    let mut handlers = JoinSet::new();
    let mut prune = tokio::time::interval(RATE_LIMIT_PRUNE_INTERVAL);
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            received = inbound_rx.recv() => match received {
                Some(message) => router.route(message, &mut handlers),
                None => {
                    tracing::warn!("inbound queue closed");
                    break;
                }
            },
            _ = prune.tick() => router.prune(),
            Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                if let Err(err) = joined {
                    tracing::error!("command handler panicked: {err}");
                }
            }
        }
    }

    let stopped = tracker.stop_all().await;
    tracing::info!(stopped, "gagstock runtime stopping");
    shutdown.cancel();
    let _ = sweeper.await;
    handlers.abort_all();
    while handlers.join_next().await.is_some() {}
    while workers.join_next().await.is_some() {}
    Ok(())
}
