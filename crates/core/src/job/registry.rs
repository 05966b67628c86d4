use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::debug;

use super::types::JobId;

/// Live state of one active job.
///
/// `pid` is `Some` exactly while an OS process is running for the job. The
/// cancellation flag is one-shot: once set it is never cleared for this id.
struct Entry {
    cancelled: bool,
    pid: Option<u32>,
    current_path: Option<PathBuf>,
    cancel_notify: Arc<Notify>,
}

/// What a lock-holding operation observed about an entry.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub cancelled: bool,
    pub pid: Option<u32>,
    pub current_path: Option<PathBuf>,
}

/// Concurrency-safe map of active jobs.
///
/// One entry per job for its active lifetime: created at job start, removed
/// under the same lock on the terminal transition. A cancellation request for
/// an id that is absent — never started, or already terminal — is a silent
/// no-op, which is how the cancel-after-completion race stays benign.
pub struct JobRegistry {
    entries: Mutex<HashMap<JobId, Entry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Creates the entry for a starting job and returns its cancel wakeup.
    ///
    /// Returns `None` when the job is already active — at most one process
    /// per job id.
    pub fn register(&self, job_id: JobId) -> Option<Arc<Notify>> {
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(&job_id) {
            return None;
        }
        let notify = Arc::new(Notify::new());
        entries.insert(
            job_id,
            Entry {
                cancelled: false,
                pid: None,
                current_path: None,
                cancel_notify: Arc::clone(&notify),
            },
        );
        Some(notify)
    }

    /// Records the spawned process id for the job.
    pub fn set_pid(&self, job_id: JobId, pid: u32) {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(&job_id) {
            entry.pid = Some(pid);
        }
    }

    /// Clears the process id once the process has been reaped.
    pub fn clear_pid(&self, job_id: JobId) {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(&job_id) {
            entry.pid = None;
        }
    }

    /// Records the destination the tool last announced for the job.
    pub fn set_current_path(&self, job_id: JobId, path: PathBuf) {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(&job_id) {
            entry.current_path = Some(path);
        }
    }

    pub fn is_cancelled(&self, job_id: JobId) -> bool {
        self.entries
            .lock()
            .unwrap()
            .get(&job_id)
            .is_some_and(|e| e.cancelled)
    }

    /// Sets the one-shot cancellation flag and wakes the job task.
    ///
    /// Returns what was known about the job, or `None` when the id is not
    /// active (late cancellation: no-op by design).
    pub fn request_cancel(&self, job_id: JobId) -> Option<RegistrySnapshot> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.get_mut(&job_id)?;
        entry.cancelled = true;
        // notify_one stores a permit, so the job task cannot miss a wakeup
        // that lands between its flag check and its await.
        entry.cancel_notify.notify_one();
        debug!(job_id, pid = entry.pid, "Cancellation requested");
        Some(RegistrySnapshot {
            cancelled: true,
            pid: entry.pid,
            current_path: entry.current_path.clone(),
        })
    }

    /// Removes the entry on a terminal transition.
    ///
    /// Runs under the same lock `request_cancel` takes, so a cancel request
    /// either observes the entry (and the job task will act on the flag) or
    /// finds it gone and no-ops. Exactly one of the two.
    pub fn remove(&self, job_id: JobId) -> Option<RegistrySnapshot> {
        let entry = self.entries.lock().unwrap().remove(&job_id)?;
        Some(RegistrySnapshot {
            cancelled: entry.cancelled,
            pid: entry.pid,
            current_path: entry.current_path,
        })
    }

    pub fn contains(&self, job_id: JobId) -> bool {
        self.entries.lock().unwrap().contains_key(&job_id)
    }

    pub fn active_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn active_ids(&self) -> Vec<JobId> {
        self.entries.lock().unwrap().keys().copied().collect()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
