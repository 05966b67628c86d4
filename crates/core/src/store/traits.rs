use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::types::SubscriptionRecord;
use super::StoreError;
use crate::job::{JobId, JobOptions, JobRecord, JobState};

/// Job record persistence.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Creates a queued job record and assigns its id.
    async fn create_job(&self, url: &str, options: JobOptions) -> Result<JobRecord, StoreError>;

    async fn get_job(&self, id: JobId) -> Result<Option<JobRecord>, StoreError>;

    /// Records a non-terminal state transition.
    async fn update_state(&self, id: JobId, state: JobState) -> Result<(), StoreError>;

    /// Stores resolved item metadata after the metadata phase.
    async fn set_metadata(
        &self,
        id: JobId,
        video_id: Option<&str>,
        title: Option<&str>,
        thumbnail: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Updates live progress fields.
    async fn set_progress(
        &self,
        id: JobId,
        percent: f32,
        speed: Option<&str>,
        eta: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Records the terminal outcome (state, output path or error message).
    async fn set_outcome(
        &self,
        id: JobId,
        state: JobState,
        output_path: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Resets a terminal job back to queued for resubmission.
    async fn reset_job(&self, id: JobId) -> Result<JobRecord, StoreError>;
}

/// History of previously completed item identifiers, used for dedup.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn contains(&self, video_id: &str) -> Result<bool, StoreError>;

    async fn record(
        &self,
        video_id: &str,
        title: &str,
        channel: Option<&str>,
        file_path: Option<&str>,
    ) -> Result<(), StoreError>;
}

/// Subscription check-state persistence.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn list_enabled(&self) -> Result<Vec<SubscriptionRecord>, StoreError>;

    async fn get_subscription(&self, id: i64) -> Result<Option<SubscriptionRecord>, StoreError>;

    /// Persists the outcome of a completed check cycle. Called only after
    /// resolution and enqueue succeed, so a crash mid-cycle retries the check
    /// instead of skipping it.
    async fn update_check_state(
        &self,
        id: i64,
        last_checked: DateTime<Utc>,
        last_item_count: usize,
    ) -> Result<(), StoreError>;
}
