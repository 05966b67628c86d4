//! corvid-core: the download orchestration core.
//!
//! Runs external media-fetch jobs as supervised subprocesses, parses their
//! free-text progress output into structured events, enforces
//! at-most-one-process-per-job cancellation with filesystem cleanup of
//! partial downloads, and drives a periodic scheduler that re-evaluates
//! subscribed sources for new work. Persistence and the serving surface are
//! the embedder's concern, plugged in through the `store` traits.

pub mod cleanup;
pub mod config;
pub mod events;
pub mod job;
pub mod orchestrator;
pub mod progress;
pub mod resolver;
pub mod scheduler;
pub mod store;
pub mod supervisor;
pub mod testing;

pub use cleanup::CleanupEngine;
pub use config::{load_config, load_config_from_str, Config, ConfigError};
pub use events::{EventBroadcaster, JobEvent, ProgressEvent};
pub use job::{JobId, JobOptions, JobRecord, JobRegistry, JobState};
pub use orchestrator::{DownloadOrchestrator, OrchestratorError};
pub use progress::ProgressParser;
pub use resolver::{MediaResolver, ResolverError, YtDlpResolver};
pub use scheduler::{JobSubmitter, SubscriptionScheduler};
pub use store::{
    HistoryStore, JobStore, MemoryStore, StoreError, SubscriptionRecord, SubscriptionStore,
};
pub use supervisor::{FetchError, JobSupervisor};
