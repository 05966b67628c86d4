//! Periodic subscription checking.

mod filter;
mod runner;

use async_trait::async_trait;

use crate::job::{JobId, JobOptions};

pub use filter::{glob_match, select_entries};
pub use runner::SubscriptionScheduler;

/// Enqueues a download job. Implemented by the orchestrator so scheduler
/// submissions go through the same path as caller submissions.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    async fn submit(&self, url: &str, options: JobOptions) -> anyhow::Result<JobId>;
}
