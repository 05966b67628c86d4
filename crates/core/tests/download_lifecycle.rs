//! End-to-end job lifecycle tests against a scripted stand-in for the
//! download tool.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use corvid_core::testing::MockResolver;
use corvid_core::{
    Config, DownloadOrchestrator, JobOptions, JobState, JobStore, MemoryStore, ProgressEvent,
};

/// Writes an executable shell script standing in for the download tool.
fn write_tool(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-tool.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn orchestrator_with_tool(
    store: Arc<MemoryStore>,
    tool_path: PathBuf,
) -> Arc<DownloadOrchestrator> {
    let mut config = Config::default();
    config.fetcher.downloads_dir = tool_path.parent().unwrap().to_path_buf();
    config.fetcher.tool_path = tool_path;
    config.fetcher.cookies_path = PathBuf::from("/nonexistent/cookies.txt");
    config.fetcher.terminate_grace_secs = 2;
    config.cleanup.settle_ms = 0;

    let resolver = MockResolver::new();
    resolver.push_video("abc123", "Integration Video");
    DownloadOrchestrator::new(
        config,
        store.clone(),
        store.clone(),
        store,
        Arc::new(resolver),
    )
}

async fn next_event(
    rx: &mut tokio::sync::mpsc::Receiver<corvid_core::JobEvent>,
) -> corvid_core::JobEvent {
    timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_successful_download_reaches_completed() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("Channel").join("20240101_video.mp4");
    std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
    let dest_str = dest.to_str().unwrap();

    let tool = write_tool(
        dir.path(),
        &format!(
            r#"echo "[youtube] Extracting URL"
echo "[download] Destination: {dest_str}"
echo "[download]   0.0% of 10.00MiB at 512.00KiB/s ETA 00:20"
echo "[download]  55.0% of 10.00MiB at 512.00KiB/s ETA 00:09"
echo "[download] 100% of 10.00MiB in 00:20"
echo "[Metadata] Adding metadata to \"{dest_str}\""
: > "{dest_str}"
printf '%s\n' "{dest_str}"
exit 0
"#
        ),
    );

    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator_with_tool(store.clone(), tool);
    let mut rx = orchestrator.subscribe();

    let job_id = orchestrator
        .submit("https://example.com/watch?v=abc123", JobOptions::default())
        .await
        .unwrap();

    let mut saw_downloading = false;
    loop {
        let event = next_event(&mut rx).await;
        assert_eq!(event.job_id, job_id);
        match event.event {
            ProgressEvent::Downloading { percent, .. } => {
                assert!(percent >= 0.0);
                saw_downloading = true;
            }
            ProgressEvent::Processing { .. } | ProgressEvent::StreamReset => {}
            ProgressEvent::Finished { path } => {
                assert_eq!(path.as_deref(), Some(dest_str));
                break;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert!(saw_downloading);

    let job = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.output_path.as_deref(), Some(dest_str));
    assert_eq!(job.title.as_deref(), Some("Integration Video"));
    assert!(job.completed_at.is_some());
    assert_eq!(orchestrator.active_job_count(), 0);

    // The finished item went into dedup history.
    use corvid_core::HistoryStore;
    assert!(store.contains("abc123").await.unwrap());
}

#[tokio::test]
async fn test_cancelled_download_terminates_and_sweeps_partials() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("video.mp4");
    let dest_str = dest.to_str().unwrap();
    let sibling = dir.path().join("video.f140.m4a");

    // Leftovers from an earlier unclean shutdown: a transfer marker, its
    // target, and a stream sibling. Cancellation should sweep these too.
    let orphan_marker = dir.path().join("orphan.mp4.ytdl");
    let orphan_target = dir.path().join("orphan.mp4");
    let orphan_stream = dir.path().join("orphan.f140.m4a");
    for path in [&orphan_marker, &orphan_target, &orphan_stream] {
        std::fs::File::create(path).unwrap();
    }

    // Announces its destination, leaves partial files, then hangs.
    let tool = write_tool(
        dir.path(),
        &format!(
            r#": > "{dest_str}"
: > "{sibling}"
echo "[download] Destination: {dest_str}"
echo "[download]   1.0% of 100.00MiB at 100.00KiB/s ETA 17:00"
exec sleep 30
"#,
            sibling = sibling.to_str().unwrap()
        ),
    );

    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator_with_tool(store.clone(), tool);
    let mut rx = orchestrator.subscribe();

    let job_id = orchestrator
        .submit("https://example.com/watch?v=abc123", JobOptions::default())
        .await
        .unwrap();

    // Wait for the job to report progress, so the process is live and the
    // destination is registered.
    loop {
        if matches!(next_event(&mut rx).await.event, ProgressEvent::Downloading { .. }) {
            break;
        }
    }

    assert!(orchestrator.cancel(job_id));

    let event = next_event(&mut rx).await;
    assert_eq!(event.job_id, job_id);
    let ProgressEvent::Cancelled { partial_path } = event.event else {
        panic!("expected Cancelled, got {:?}", event.event);
    };
    assert_eq!(partial_path.as_deref(), Some(dest_str));

    let job = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Cancelled);
    assert_eq!(orchestrator.active_job_count(), 0);

    // A second cancel after the terminal state is a silent no-op.
    assert!(!orchestrator.cancel(job_id));

    // Cleanup runs after the terminal event; give it a moment.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while (dest.exists() || sibling.exists() || orphan_marker.exists())
        && tokio::time::Instant::now() < deadline
    {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!dest.exists(), "partial container should be swept");
    assert!(!sibling.exists(), "partial stream file should be swept");
    assert!(!orphan_marker.exists(), "orphaned marker should be swept");
    assert!(!orphan_target.exists(), "marker target should be swept");
    assert!(!orphan_stream.exists(), "marker target sibling should be swept");
}

#[tokio::test]
async fn test_tool_failure_reaches_failed_with_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let tool = write_tool(
        dir.path(),
        r#"echo "ERROR: [youtube] abc123: Video unavailable" >&2
exit 1
"#,
    );

    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator_with_tool(store.clone(), tool);
    let mut rx = orchestrator.subscribe();

    let job_id = orchestrator
        .submit("https://example.com/watch?v=abc123", JobOptions::default())
        .await
        .unwrap();

    let event = next_event(&mut rx).await;
    let ProgressEvent::Failed { message } = event.event else {
        panic!("expected Failed, got {:?}", event.event);
    };
    assert!(message.contains("exited with code 1"), "{message}");

    let job = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert!(job.error_message.is_some());
}
