use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::filter;
use super::JobSubmitter;
use crate::config::SchedulerConfig;
use crate::resolver::MediaResolver;
use crate::store::{HistoryStore, SubscriptionRecord, SubscriptionStore};

/// Background loop that re-checks subscribed sources for new items.
///
/// One poll tick every `poll_interval_secs` regardless of subscription
/// intervals; per tick, only due subscriptions are checked. Subscription
/// check state is persisted after a fully successful check, so a crash
/// mid-cycle retries the check next tick instead of skipping it. Duplicate
/// enqueue attempts from such a retry are harmless because history
/// membership is re-checked per entry.
pub struct SubscriptionScheduler {
    config: SchedulerConfig,
    subscriptions: Arc<dyn SubscriptionStore>,
    history: Arc<dyn HistoryStore>,
    resolver: Arc<dyn MediaResolver>,
    submitter: Arc<dyn JobSubmitter>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl SubscriptionScheduler {
    pub fn new(
        config: SchedulerConfig,
        subscriptions: Arc<dyn SubscriptionStore>,
        history: Arc<dyn HistoryStore>,
        resolver: Arc<dyn MediaResolver>,
        submitter: Arc<dyn JobSubmitter>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            subscriptions,
            history,
            resolver,
            submitter,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Starts the poll loop. A second call while running is a no-op.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Subscription scheduler already running");
            return;
        }
        info!(
            poll_interval_secs = self.config.poll_interval_secs,
            "Starting subscription scheduler"
        );

        let scheduler = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            let interval = Duration::from_secs(scheduler.config.poll_interval_secs);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Subscription scheduler received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !scheduler.running.load(Ordering::Relaxed) {
                            break;
                        }
                        scheduler.run_cycle().await;
                    }
                }
            }
            info!("Subscription scheduler stopped");
        });
    }

    /// Stops the poll loop.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// One pass over all enabled subscriptions.
    ///
    /// A failing subscription is logged and skipped; it never aborts the
    /// cycle for the others.
    pub async fn run_cycle(&self) {
        let subs = match self.subscriptions.list_enabled().await {
            Ok(subs) => subs,
            Err(e) => {
                error!(error = %e, "Failed to list subscriptions");
                return;
            }
        };
        debug!(count = subs.len(), "Subscription check cycle");

        let now = Utc::now();
        for sub in subs {
            if !sub.is_due(now) {
                continue;
            }
            if let Err(e) = self.check_subscription(&sub).await {
                warn!(
                    subscription = %sub.name,
                    error = %format!("{e:#}"),
                    "Subscription check failed, will retry next cycle"
                );
            }
        }
    }

    /// Runs one check for a single subscription on demand.
    pub async fn check_now(&self, subscription_id: i64) -> anyhow::Result<usize> {
        let sub = self
            .subscriptions
            .get_subscription(subscription_id)
            .await?
            .with_context(|| format!("subscription {subscription_id} not found"))?;
        self.check_subscription(&sub).await
    }

    /// Resolves, filters, and enqueues new items; returns how many.
    async fn check_subscription(&self, sub: &SubscriptionRecord) -> anyhow::Result<usize> {
        info!(subscription = %sub.name, url = %sub.url, "Checking subscription");

        let feed = self
            .resolver
            .feed(&sub.url)
            .await
            .context("feed resolution failed")?;
        let resolved_count = feed.entries.len();
        let selected = filter::select_entries(sub, feed.entries);
        // The persisted count reflects what the filters let through, not the
        // raw feed size.
        let selected_count = selected.len();

        let mut submitted = 0usize;
        for entry in selected {
            if self.history.contains(&entry.video_id).await? {
                continue;
            }
            let url = format!("https://www.youtube.com/watch?v={}", entry.video_id);
            let job_id = self
                .submitter
                .submit(&url, sub.options.clone())
                .await
                .with_context(|| format!("failed to enqueue {}", entry.video_id))?;
            info!(
                subscription = %sub.name,
                video_id = %entry.video_id,
                title = %entry.title,
                job_id,
                "Enqueued new subscription item"
            );
            submitted += 1;
        }

        self.subscriptions
            .update_check_state(sub.id, Utc::now(), selected_count)
            .await?;
        info!(
            subscription = %sub.name,
            resolved = resolved_count,
            selected = selected_count,
            submitted,
            "Subscription check complete"
        );
        Ok(submitted)
    }
}
