use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::traits::{HistoryStore, JobStore, SubscriptionStore};
use super::types::SubscriptionRecord;
use super::StoreError;
use crate::job::{JobId, JobOptions, JobRecord, JobState};

#[derive(Default)]
struct Inner {
    next_job_id: JobId,
    jobs: HashMap<JobId, JobRecord>,
    history: HashMap<String, HistoryEntry>,
    subscriptions: HashMap<i64, SubscriptionRecord>,
}

#[allow(dead_code)]
struct HistoryEntry {
    title: String,
    channel: Option<String>,
    file_path: Option<String>,
    downloaded_at: DateTime<Utc>,
}

/// In-memory implementation of all three store traits.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_job_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Seeds a subscription, for tests and embedders.
    pub fn insert_subscription(&self, record: SubscriptionRecord) {
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .insert(record.id, record);
    }

    /// Seeds a history entry by id only.
    pub fn insert_history(&self, video_id: &str) {
        self.inner.lock().unwrap().history.insert(
            video_id.to_string(),
            HistoryEntry {
                title: String::new(),
                channel: None,
                file_path: None,
                downloaded_at: Utc::now(),
            },
        );
    }

    pub fn job_count(&self) -> usize {
        self.inner.lock().unwrap().jobs.len()
    }

    /// All job records, newest first. Convenience for assertions.
    pub fn all_jobs(&self) -> Vec<JobRecord> {
        let inner = self.inner.lock().unwrap();
        let mut jobs: Vec<_> = inner.jobs.values().cloned().collect();
        jobs.sort_by_key(|j| std::cmp::Reverse(j.id));
        jobs
    }

    fn with_job<T>(
        &self,
        id: JobId,
        f: impl FnOnce(&mut JobRecord) -> T,
    ) -> Result<T, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("job {id}")))?;
        Ok(f(job))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(&self, url: &str, options: JobOptions) -> Result<JobRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_job_id;
        inner.next_job_id += 1;
        let record = JobRecord::new(id, url, options);
        inner.jobs.insert(id, record.clone());
        Ok(record)
    }

    async fn get_job(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.inner.lock().unwrap().jobs.get(&id).cloned())
    }

    async fn update_state(&self, id: JobId, state: JobState) -> Result<(), StoreError> {
        self.with_job(id, |job| job.state = state)
    }

    async fn set_metadata(
        &self,
        id: JobId,
        video_id: Option<&str>,
        title: Option<&str>,
        thumbnail: Option<&str>,
    ) -> Result<(), StoreError> {
        self.with_job(id, |job| {
            job.video_id = video_id.map(String::from);
            job.title = title.map(String::from);
            job.thumbnail = thumbnail.map(String::from);
        })
    }

    async fn set_progress(
        &self,
        id: JobId,
        percent: f32,
        speed: Option<&str>,
        eta: Option<&str>,
    ) -> Result<(), StoreError> {
        self.with_job(id, |job| {
            job.progress = percent;
            job.speed = speed.map(String::from);
            job.eta = eta.map(String::from);
        })
    }

    async fn set_outcome(
        &self,
        id: JobId,
        state: JobState,
        output_path: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        self.with_job(id, |job| {
            job.state = state;
            job.output_path = output_path.map(String::from);
            job.error_message = error.map(String::from);
            job.completed_at = Some(Utc::now());
            if state == JobState::Completed {
                job.progress = 100.0;
            }
        })
    }

    async fn reset_job(&self, id: JobId) -> Result<JobRecord, StoreError> {
        self.with_job(id, |job| {
            job.state = JobState::Queued;
            job.progress = 0.0;
            job.speed = None;
            job.eta = None;
            job.error_message = None;
            job.completed_at = None;
            job.clone()
        })
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn contains(&self, video_id: &str) -> Result<bool, StoreError> {
        Ok(self.inner.lock().unwrap().history.contains_key(video_id))
    }

    async fn record(
        &self,
        video_id: &str,
        title: &str,
        channel: Option<&str>,
        file_path: Option<&str>,
    ) -> Result<(), StoreError> {
        self.inner.lock().unwrap().history.insert(
            video_id.to_string(),
            HistoryEntry {
                title: title.to_string(),
                channel: channel.map(String::from),
                file_path: file_path.map(String::from),
                downloaded_at: Utc::now(),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn list_enabled(&self) -> Result<Vec<SubscriptionRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut subs: Vec<_> = inner
            .subscriptions
            .values()
            .filter(|s| s.enabled)
            .cloned()
            .collect();
        subs.sort_by_key(|s| s.id);
        Ok(subs)
    }

    async fn get_subscription(&self, id: i64) -> Result<Option<SubscriptionRecord>, StoreError> {
        Ok(self.inner.lock().unwrap().subscriptions.get(&id).cloned())
    }

    async fn update_check_state(
        &self,
        id: i64,
        last_checked: DateTime<Utc>,
        last_item_count: usize,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let sub = inner
            .subscriptions
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("subscription {id}")))?;
        sub.last_checked = Some(last_checked);
        sub.last_item_count = last_item_count;
        Ok(())
    }
}
