use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant, sleep};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use notifq_core::domain::{NotificationEntry, NotificationKey, OwnerId};
use notifq_core::error::HandlerError;
use notifq_core::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};
use notifq_core::runtime::{HandlerRegistry, KeyHandler};
use notifq_core::{Dispatcher, NotificationQueue, NotificationQueueService, QueueConfig};

/// Schedule a few notifications on an in-memory queue and watch them drain.
#[derive(Debug, Parser)]
#[command(name = "notifq", version)]
struct Args {
    /// TOML config file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of notifications to schedule.
    #[arg(long, default_value_t = 3)]
    count: u32,

    /// Spacing between effective times, in milliseconds.
    #[arg(long, default_value_t = 200)]
    spacing_ms: u64,

    /// How many times the handler fails before it starts succeeding.
    #[arg(long, default_value_t = 2)]
    failures: u32,

    /// Override retry.base_delay_ms from the config.
    #[arg(long)]
    retry_base_delay_ms: Option<u64>,

    /// Give up waiting after this many seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct HelloKey {
    name: String,
    seq: u32,
}

impl NotificationKey for HelloKey {
    const KEY_TYPE: &'static str = "notifq.demo.hello.v1";
}

struct HelloHandler {
    remaining_failures: AtomicU32,
}

impl HelloHandler {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl KeyHandler<HelloKey> for HelloHandler {
    async fn handle(&self, key: HelloKey, entry: &NotificationEntry) -> Result<(), HandlerError> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(HandlerError::Transient(format!("intentional failure (left={left})")));
        }

        info!(
            notification_id = %entry.id(),
            retry_count = entry.retry_count(),
            "Hello, {} (#{})!",
            key.name,
            key.seq
        );
        Ok(())
    }
}

/// Effective time of the `seq`-th notification: `start + spacing_ms * seq`.
fn schedule_at(start: DateTime<Utc>, spacing_ms: u64, seq: u32) -> Result<DateTime<Utc>, String> {
    let offset_ms = spacing_ms
        .checked_mul(u64::from(seq))
        .and_then(|ms| i64::try_from(ms).ok())
        .ok_or_else(|| format!("offset overflows: spacing_ms={spacing_ms} seq={seq}"))?;
    chrono::Duration::try_milliseconds(offset_ms)
        .and_then(|offset| start.checked_add_signed(offset))
        .ok_or_else(|| format!("effective time out of range: spacing_ms={spacing_ms} seq={seq}"))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => QueueConfig::load(path)?,
        None => QueueConfig::default(),
    };
    if let Some(base) = args.retry_base_delay_ms {
        config.retry.base_delay_ms = base;
    }
    info!(?config, "loaded configuration");

    // (A) service + queue with a typed handler
    let service = NotificationQueueService::from_config(&config);
    let mut registry = HandlerRegistry::new();
    registry.register::<HelloKey, _>(HelloHandler::new(args.failures))?;
    let queue = service.create_notification_queue(
        &config.service_name,
        &config.queue_name,
        Arc::new(registry),
    )?;

    // (B) dispatcher polls while the queue is started
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&queue), Arc::new(config.retry_policy())));
    let handle = Arc::clone(&dispatcher).spawn(config.poll_interval());
    queue.start_queue();

    // (C) schedule notifications
    let tokens = UlidGenerator::new(SystemClock);
    let owner = OwnerId::new(1);
    let start = service.clock().now();
    for seq in 0..args.count {
        let effective_date = schedule_at(start, args.spacing_ms, seq)?;
        let id = queue.record_future_notification(
            effective_date,
            &HelloKey {
                name: "notifq".to_string(),
                seq,
            },
            tokens.generate_user_token(),
            owner,
            0,
        )?;
        info!(notification_id = %id, seq, "scheduled");
    }
    info!(
        future = queue.future_notifications_for_owner(owner).len(),
        "pending for owner {owner}"
    );

    // (D) wait until the store drains
    let deadline = Instant::now() + Duration::from_secs(args.timeout_secs);
    while !queue.store().is_empty() {
        if Instant::now() >= deadline {
            warn!(remaining = queue.store().len(), "timed out waiting for notifications");
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }
    info!(stats = ?queue.store().stats(service.clock().now()), "final stats");

    // (E) graceful shutdown
    queue.stop_queue();
    handle.shutdown_and_join().await;
    service.delete_notification_queue(&config.service_name, &config.queue_name)?;
    Ok(())
}
