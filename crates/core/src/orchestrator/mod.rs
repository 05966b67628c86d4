//! The download orchestrator facade.
//!
//! Wires the stores, resolver, registry, broadcaster, cleanup engine and
//! scheduler together and exposes the operations an embedding server calls:
//! submit, cancel, resubmit, event subscription, and scheduler control.

use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cleanup::CleanupEngine;
use crate::config::Config;
use crate::events::{EventBroadcaster, JobEvent};
use crate::job::{JobId, JobOptions, JobRegistry, JobState};
use crate::resolver::MediaResolver;
use crate::scheduler::{JobSubmitter, SubscriptionScheduler};
use crate::store::{HistoryStore, JobStore, StoreError, SubscriptionStore};
use crate::supervisor::JobSupervisor;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Job {0} not found")]
    JobNotFound(JobId),

    #[error("Job {0} is still active")]
    JobStillActive(JobId),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Facade over the download core.
pub struct DownloadOrchestrator {
    store: Arc<dyn JobStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    history: Arc<dyn HistoryStore>,
    resolver: Arc<dyn MediaResolver>,
    registry: Arc<JobRegistry>,
    broadcaster: Arc<EventBroadcaster>,
    supervisor: Arc<JobSupervisor>,
    scheduler_config: crate::config::SchedulerConfig,
    scheduler: OnceLock<Arc<SubscriptionScheduler>>,
}

impl DownloadOrchestrator {
    pub fn new(
        config: Config,
        store: Arc<dyn JobStore>,
        history: Arc<dyn HistoryStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        resolver: Arc<dyn MediaResolver>,
    ) -> Arc<Self> {
        let registry = Arc::new(JobRegistry::new());
        let broadcaster = Arc::new(EventBroadcaster::new());
        let cleanup = Arc::new(CleanupEngine::new(config.cleanup.clone()));
        let supervisor = Arc::new(JobSupervisor::new(
            config.fetcher.clone(),
            Arc::clone(&store),
            Arc::clone(&history),
            Arc::clone(&resolver),
            Arc::clone(&registry),
            Arc::clone(&broadcaster),
            cleanup,
        ));

        Arc::new(Self {
            store,
            subscriptions,
            history,
            resolver,
            registry,
            broadcaster,
            supervisor,
            scheduler_config: config.scheduler,
            scheduler: OnceLock::new(),
        })
    }

    /// Creates a job for `url` and spawns its supervision task.
    pub async fn submit(
        &self,
        url: &str,
        options: JobOptions,
    ) -> Result<JobId, OrchestratorError> {
        let record = self.store.create_job(url, options).await?;
        let job_id = record.id;
        let Some(cancel) = self.registry.register(job_id) else {
            return Err(OrchestratorError::JobStillActive(job_id));
        };

        let supervisor = Arc::clone(&self.supervisor);
        tokio::spawn(async move {
            supervisor.run(record, cancel).await;
        });
        Ok(job_id)
    }

    /// Submits several URLs with the same options, skipping ones that fail
    /// to enqueue.
    pub async fn submit_batch(
        &self,
        urls: &[String],
        options: JobOptions,
    ) -> Vec<(String, Result<JobId, OrchestratorError>)> {
        let mut results = Vec::with_capacity(urls.len());
        for url in urls {
            let result = self.submit(url, options.clone()).await;
            if let Err(e) = &result {
                warn!(url = %url, error = %e, "Batch submission entry failed");
            }
            results.push((url.clone(), result));
        }
        results
    }

    /// Re-runs a failed or cancelled job under its original id and options.
    pub async fn resubmit(&self, job_id: JobId) -> Result<(), OrchestratorError> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or(OrchestratorError::JobNotFound(job_id))?;
        if !matches!(job.state, JobState::Failed | JobState::Cancelled) {
            return Err(OrchestratorError::JobStillActive(job_id));
        }

        let record = self.store.reset_job(job_id).await?;
        let Some(cancel) = self.registry.register(job_id) else {
            return Err(OrchestratorError::JobStillActive(job_id));
        };
        info!(job_id, url = %record.url, "Resubmitting job");

        let supervisor = Arc::clone(&self.supervisor);
        tokio::spawn(async move {
            supervisor.run(record, cancel).await;
        });
        Ok(())
    }

    /// Requests cancellation of an active job.
    ///
    /// Returns whether a live job saw the request; a cancel for an unknown
    /// or already-terminal id is a silent no-op.
    pub fn cancel(&self, job_id: JobId) -> bool {
        self.registry.request_cancel(job_id).is_some()
    }

    /// Subscribes to the job event stream.
    pub fn subscribe(&self) -> mpsc::Receiver<JobEvent> {
        self.broadcaster.subscribe()
    }

    fn scheduler(self: &Arc<Self>) -> &Arc<SubscriptionScheduler> {
        self.scheduler.get_or_init(|| {
            Arc::new(SubscriptionScheduler::new(
                self.scheduler_config.clone(),
                Arc::clone(&self.subscriptions),
                Arc::clone(&self.history),
                Arc::clone(&self.resolver),
                Arc::new(WeakSubmitter(Arc::downgrade(self))),
            ))
        })
    }

    /// Starts the subscription scheduler. Subsequent calls are no-ops.
    pub fn start_scheduler(self: &Arc<Self>) {
        self.scheduler().start();
    }

    /// Runs one subscription check immediately, outside the poll cadence.
    pub async fn check_subscription_now(
        self: &Arc<Self>,
        subscription_id: i64,
    ) -> anyhow::Result<usize> {
        // Works whether or not the poll loop has been started.
        self.scheduler().check_now(subscription_id).await
    }

    /// Stops the scheduler and requests cancellation of every active job.
    pub fn shutdown(&self) {
        info!(
            active_jobs = self.registry.active_count(),
            "Shutting down orchestrator"
        );
        if let Some(scheduler) = self.scheduler.get() {
            scheduler.stop();
        }
        for job_id in self.registry.active_ids() {
            self.registry.request_cancel(job_id);
        }
    }

    pub fn active_job_count(&self) -> usize {
        self.registry.active_count()
    }
}

/// Scheduler-side handle into the orchestrator.
///
/// Weak so the scheduler task never keeps a shut-down orchestrator alive.
struct WeakSubmitter(Weak<DownloadOrchestrator>);

#[async_trait]
impl JobSubmitter for WeakSubmitter {
    async fn submit(&self, url: &str, options: JobOptions) -> anyhow::Result<JobId> {
        let orchestrator = self
            .0
            .upgrade()
            .ok_or_else(|| anyhow::anyhow!("orchestrator is gone"))?;
        Ok(orchestrator.submit(url, options).await?)
    }
}
