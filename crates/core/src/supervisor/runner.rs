//! Per-job supervision task.
//!
//! One `JobSupervisor::run` invocation owns a job's whole active lifetime:
//! the metadata phase, the tool process, the output read loop, and the single
//! terminal transition. The child process handle never leaves this task;
//! cancellation arrives through the registry's notify and is acted on here,
//! so there is exactly one place that terminates and reaps the process.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};

use super::command;
use super::error::FetchError;
use super::throttle::ProgressThrottle;
use crate::cleanup::CleanupEngine;
use crate::config::FetcherConfig;
use crate::events::{EventBroadcaster, JobEvent, ProgressEvent};
use crate::job::{JobId, JobRecord, JobRegistry, JobState};
use crate::progress::ProgressParser;
use crate::resolver::{MediaInfo, MediaResolver};
use crate::store::{HistoryStore, JobStore};

/// Runs download jobs to a terminal state.
pub struct JobSupervisor {
    config: FetcherConfig,
    store: Arc<dyn JobStore>,
    history: Arc<dyn HistoryStore>,
    resolver: Arc<dyn MediaResolver>,
    registry: Arc<JobRegistry>,
    broadcaster: Arc<EventBroadcaster>,
    cleanup: Arc<CleanupEngine>,
}

impl JobSupervisor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: FetcherConfig,
        store: Arc<dyn JobStore>,
        history: Arc<dyn HistoryStore>,
        resolver: Arc<dyn MediaResolver>,
        registry: Arc<JobRegistry>,
        broadcaster: Arc<EventBroadcaster>,
        cleanup: Arc<CleanupEngine>,
    ) -> Self {
        Self {
            config,
            store,
            history,
            resolver,
            registry,
            broadcaster,
            cleanup,
        }
    }

    /// Supervises one job from queued to terminal.
    ///
    /// `cancel` is the notify handed out by the registry at registration.
    /// Never panics and never returns early without a terminal transition;
    /// every failure path collapses into `Failed`.
    pub async fn run(&self, job: JobRecord, cancel: Arc<Notify>) {
        let job_id = job.id;
        info!(job_id, url = %job.url, "Starting download job");

        let mut media: Option<MediaInfo> = None;
        let mut partial_path: Option<PathBuf> = None;

        let result = self
            .run_phases(&job, &cancel, &mut media, &mut partial_path)
            .await;

        // Removing the entry and acting on the outcome must leave no window
        // where a cancel request finds the entry but nobody acts on it: the
        // entry goes away first, making any later cancel a registry no-op.
        let snapshot = self.registry.remove(job_id);

        match result {
            Ok(final_path) => {
                info!(job_id, path = ?final_path, "Download completed");
                if let Err(e) = self
                    .store
                    .set_outcome(job_id, JobState::Completed, final_path.as_deref(), None)
                    .await
                {
                    error!(job_id, error = %e, "Failed to persist completion");
                }
                self.record_history(&media, final_path.as_deref()).await;
                self.broadcaster
                    .publish(JobEvent::new(job_id, ProgressEvent::Finished {
                        path: final_path,
                    }));
            }
            Err(FetchError::Cancelled) => {
                let partial = partial_path
                    .or_else(|| snapshot.and_then(|s| s.current_path));
                info!(job_id, partial = ?partial, "Download cancelled");
                if let Err(e) = self
                    .store
                    .set_outcome(job_id, JobState::Cancelled, None, None)
                    .await
                {
                    error!(job_id, error = %e, "Failed to persist cancellation");
                }
                self.broadcaster
                    .publish(JobEvent::new(job_id, ProgressEvent::Cancelled {
                        partial_path: partial
                            .as_ref()
                            .map(|p| p.to_string_lossy().into_owned()),
                    }));
                if let Some(path) = partial {
                    self.cleanup.cleanup_partial(&path).await;
                }
                // Markers from earlier unclean runs accumulate in the
                // downloads dir; every cancellation sweeps them too.
                self.cleanup
                    .sweep_markers(&self.config.downloads_dir)
                    .await;
            }
            Err(e) => {
                let message = e.to_string();
                error!(job_id, error = %message, "Download failed");
                if let Err(e) = self
                    .store
                    .set_outcome(job_id, JobState::Failed, None, Some(&message))
                    .await
                {
                    error!(job_id, error = %e, "Failed to persist failure");
                }
                self.broadcaster
                    .publish(JobEvent::new(job_id, ProgressEvent::Failed { message }));
            }
        }
    }

    async fn run_phases(
        &self,
        job: &JobRecord,
        cancel: &Notify,
        media: &mut Option<MediaInfo>,
        partial_path: &mut Option<PathBuf>,
    ) -> Result<Option<String>, FetchError> {
        if self.registry.is_cancelled(job.id) {
            return Err(FetchError::Cancelled);
        }
        *media = Some(self.fetch_metadata(job, cancel).await?);
        if let Some(info) = media.as_ref() {
            self.store
                .set_metadata(
                    job.id,
                    info.id.as_deref(),
                    Some(&info.title),
                    info.thumbnail.as_deref(),
                )
                .await?;
        }
        self.supervise_process(job, cancel, partial_path).await
    }

    /// Metadata phase, bounded by the configured timeout and racing cancel.
    async fn fetch_metadata(
        &self,
        job: &JobRecord,
        cancel: &Notify,
    ) -> Result<MediaInfo, FetchError> {
        self.store
            .update_state(job.id, JobState::FetchingMetadata)
            .await?;

        let bound = Duration::from_secs(self.config.metadata_timeout_secs);
        tokio::select! {
            resolved = tokio::time::timeout(bound, self.resolver.resolve(&job.url)) => {
                match resolved {
                    Ok(Ok(info)) => Ok(info),
                    Ok(Err(e)) => Err(FetchError::MetadataFailure(e)),
                    Err(_) => Err(FetchError::MetadataTimeout(
                        self.config.metadata_timeout_secs,
                    )),
                }
            }
            _ = cancel.notified() => Err(FetchError::Cancelled),
        }
    }

    /// Process phase: spawn, pump output through the parser, wait or cancel.
    async fn supervise_process(
        &self,
        job: &JobRecord,
        cancel: &Notify,
        partial_path: &mut Option<PathBuf>,
    ) -> Result<Option<String>, FetchError> {
        self.store.update_state(job.id, JobState::Running).await?;

        let mut cmd = command::build_command(&self.config, &job.url, &job.options);
        debug!(job_id = job.id, argv = ?command::describe(&cmd), "Spawning download tool");
        let mut child = cmd.spawn().map_err(FetchError::ProcessSpawnFailure)?;
        if let Some(pid) = child.id() {
            self.registry.set_pid(job.id, pid);
        }

        // The tool writes progress to stdout and diagnostics to stderr; both
        // feed one line channel so the parser sees a single merged stream.
        let (line_tx, mut line_rx) = mpsc::channel::<String>(64);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump_lines(stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_lines(stderr, line_tx.clone()));
        }
        drop(line_tx);

        let mut parser = ProgressParser::new();
        let mut throttle = ProgressThrottle::new(
            Duration::from_millis(self.config.progress_throttle_ms),
            self.config.progress_throttle_step,
        );

        let mut cancelled = self.registry.is_cancelled(job.id);
        while !cancelled {
            tokio::select! {
                line = line_rx.recv() => {
                    let Some(line) = line else { break };
                    for event in parser.push(&line) {
                        self.forward(job.id, &mut throttle, event).await;
                    }
                    if let Some(dest) = parser.destination() {
                        let dest = PathBuf::from(dest);
                        if partial_path.as_deref() != Some(dest.as_path()) {
                            self.registry.set_current_path(job.id, dest.clone());
                            *partial_path = Some(dest);
                        }
                    }
                }
                _ = cancel.notified() => {
                    cancelled = true;
                }
            }
        }

        if cancelled {
            self.terminate(job.id, &mut child).await;
            self.registry.clear_pid(job.id);
            if let Some(path) = parser.final_path() {
                *partial_path = Some(PathBuf::from(path));
            }
            return Err(FetchError::Cancelled);
        }

        let status = child.wait().await?;
        self.registry.clear_pid(job.id);

        // A cancel landing while the process was already exiting still wins:
        // the caller asked for no file, so the partial sweep runs.
        if self.registry.is_cancelled(job.id) {
            return Err(FetchError::Cancelled);
        }

        if status.success() {
            let path = parser
                .final_path()
                .or_else(|| parser.destination())
                .map(str::to_string);
            Ok(path)
        } else {
            Err(FetchError::ProcessExitFailure(status.code().unwrap_or(-1)))
        }
    }

    /// Throttled fan-out of one parsed event to the store and observers.
    async fn forward(&self, job_id: JobId, throttle: &mut ProgressThrottle, event: ProgressEvent) {
        if !throttle.admit(&event) {
            return;
        }
        if let ProgressEvent::Downloading {
            percent,
            ref speed,
            ref eta,
        } = event
        {
            if let Err(e) = self
                .store
                .set_progress(job_id, percent, speed.as_deref(), eta.as_deref())
                .await
            {
                warn!(job_id, error = %e, "Failed to persist progress");
            }
        }
        self.broadcaster.publish(JobEvent::new(job_id, event));
    }

    /// Graceful termination: SIGTERM, bounded wait, then hard kill.
    #[cfg(unix)]
    async fn terminate(&self, job_id: JobId, child: &mut Child) {
        let Some(pid) = child.id() else {
            return;
        };
        info!(job_id, pid, "Terminating download process");
        // SAFETY: pid came from a live child we own; worst case the process
        // exited in between and the signal hits a reaped-but-unwaited pid,
        // which is still ours until wait() below.
        unsafe {
            libc::kill(pid as i32, libc::SIGTERM);
        }
        let grace = Duration::from_secs(self.config.terminate_grace_secs);
        if tokio::time::timeout(grace, child.wait()).await.is_err() {
            warn!(job_id, pid, "Process ignored SIGTERM, killing");
            let _ = child.kill().await;
            let _ = child.wait().await;
        }
    }

    #[cfg(windows)]
    async fn terminate(&self, job_id: JobId, child: &mut Child) {
        let Some(pid) = child.id() else {
            return;
        };
        info!(job_id, pid, "Terminating download process tree");
        let _ = tokio::process::Command::new("taskkill")
            .args(["/F", "/T", "/PID", &pid.to_string()])
            .output()
            .await;
        let _ = child.wait().await;
    }

    /// Records a finished item in the dedup history. Best effort.
    async fn record_history(&self, media: &Option<MediaInfo>, file_path: Option<&str>) {
        let Some(info) = media else { return };
        let Some(video_id) = info.id.as_deref() else {
            return;
        };
        if let Err(e) = self
            .history
            .record(video_id, &info.title, info.uploader.as_deref(), file_path)
            .await
        {
            warn!(video_id, error = %e, "Failed to record download history");
        }
    }
}

/// Forwards lines from one child stream into the merged channel.
async fn pump_lines(stream: impl AsyncRead + Unpin, tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBroadcaster;
    use crate::store::MemoryStore;
    use crate::testing::MockResolver;
    use std::path::PathBuf;

    fn supervisor_with(
        config: FetcherConfig,
        store: Arc<MemoryStore>,
        resolver: MockResolver,
        registry: Arc<JobRegistry>,
        broadcaster: Arc<EventBroadcaster>,
    ) -> JobSupervisor {
        JobSupervisor::new(
            config,
            store.clone(),
            store,
            Arc::new(resolver),
            registry,
            broadcaster,
            Arc::new(CleanupEngine::with_defaults()),
        )
    }

    #[tokio::test]
    async fn test_spawn_failure_becomes_failed_terminal() {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(JobRegistry::new());
        let broadcaster = Arc::new(EventBroadcaster::new());
        let mut rx = broadcaster.subscribe();

        let resolver = MockResolver::new();
        resolver.push_video("abc123", "Some Video");

        let config = FetcherConfig {
            tool_path: PathBuf::from("/nonexistent/download-tool"),
            ..FetcherConfig::default()
        };
        let supervisor = supervisor_with(
            config,
            store.clone(),
            resolver,
            registry.clone(),
            broadcaster,
        );

        let job = store.create_job("https://example.com/v", Default::default()).await.unwrap();
        let cancel = registry.register(job.id).unwrap();
        supervisor.run(job.clone(), cancel).await;

        let stored = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Failed);
        assert!(stored.error_message.is_some());
        assert!(!registry.contains(job.id));

        let event = rx.recv().await.unwrap();
        assert!(matches!(event.event, ProgressEvent::Failed { .. }));
    }

    #[tokio::test]
    async fn test_metadata_failure_becomes_failed_terminal() {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(JobRegistry::new());
        let broadcaster = Arc::new(EventBroadcaster::new());

        // No queued response: the mock resolver fails the call.
        let resolver = MockResolver::new();
        let supervisor = supervisor_with(
            FetcherConfig::default(),
            store.clone(),
            resolver,
            registry.clone(),
            broadcaster,
        );

        let job = store.create_job("https://example.com/v", Default::default()).await.unwrap();
        let cancel = registry.register(job.id).unwrap();
        supervisor.run(job.clone(), cancel).await;

        let stored = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Failed);
    }

    #[tokio::test]
    async fn test_cancel_before_start_skips_metadata_and_spawn() {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(JobRegistry::new());
        let broadcaster = Arc::new(EventBroadcaster::new());
        let mut rx = broadcaster.subscribe();

        let resolver = MockResolver::new();
        let supervisor = supervisor_with(
            FetcherConfig::default(),
            store.clone(),
            resolver,
            registry.clone(),
            broadcaster,
        );

        let job = store.create_job("https://example.com/v", Default::default()).await.unwrap();
        let cancel = registry.register(job.id).unwrap();
        registry.request_cancel(job.id).unwrap();
        supervisor.run(job.clone(), cancel).await;

        let stored = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Cancelled);
        let event = rx.recv().await.unwrap();
        assert!(matches!(event.event, ProgressEvent::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_cancellation_sweeps_orphaned_markers_from_downloads_dir() {
        let downloads = tempfile::tempdir().unwrap();
        for name in ["stale.mp4.ytdl", "stale.mp4", "stale.f140.m4a"] {
            std::fs::File::create(downloads.path().join(name)).unwrap();
        }
        std::fs::File::create(downloads.path().join("finished.mp4")).unwrap();

        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(JobRegistry::new());
        let broadcaster = Arc::new(EventBroadcaster::new());

        let config = FetcherConfig {
            downloads_dir: downloads.path().to_path_buf(),
            ..FetcherConfig::default()
        };
        let supervisor = supervisor_with(
            config,
            store.clone(),
            MockResolver::new(),
            registry.clone(),
            broadcaster,
        );

        let job = store.create_job("https://example.com/v", Default::default()).await.unwrap();
        let cancel = registry.register(job.id).unwrap();
        registry.request_cancel(job.id).unwrap();
        supervisor.run(job, cancel).await;

        // The marker, its target, and the target's siblings are gone; a file
        // with no marker survives.
        assert!(!downloads.path().join("stale.mp4.ytdl").exists());
        assert!(!downloads.path().join("stale.mp4").exists());
        assert!(!downloads.path().join("stale.f140.m4a").exists());
        assert!(downloads.path().join("finished.mp4").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_metadata_timeout_becomes_failed_terminal() {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(JobRegistry::new());
        let broadcaster = Arc::new(EventBroadcaster::new());
        let mut rx = broadcaster.subscribe();

        let resolver = MockResolver::new();
        resolver.push_video("abc123", "Never Delivered");
        resolver.set_resolve_delay(Duration::from_secs(60));

        let config = FetcherConfig {
            metadata_timeout_secs: 5,
            ..FetcherConfig::default()
        };
        let supervisor = supervisor_with(
            config,
            store.clone(),
            resolver,
            registry.clone(),
            broadcaster,
        );

        let job = store.create_job("https://example.com/v", Default::default()).await.unwrap();
        let cancel = registry.register(job.id).unwrap();
        supervisor.run(job.clone(), cancel).await;

        let stored = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Failed);
        assert!(
            stored.error_message.as_deref().unwrap_or("").contains("timed out"),
            "unexpected message: {:?}",
            stored.error_message
        );
        assert!(!registry.contains(job.id));

        let event = rx.recv().await.unwrap();
        assert!(matches!(event.event, ProgressEvent::Failed { .. }));
    }
}
