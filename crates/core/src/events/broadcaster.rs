use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::types::JobEvent;

/// Bound on each observer's event queue. A consumer that falls this far
/// behind starts losing Downloading ticks rather than stalling job tasks.
const OBSERVER_QUEUE_DEPTH: usize = 256;

/// Fan-out of job events to all currently-connected observers.
///
/// Observers are bounded mpsc receivers. Publishing never blocks the
/// producing job task: a closed observer is pruned, a full one drops that
/// event. Per-job ordering is preserved because each job has a single
/// producing task.
pub struct EventBroadcaster {
    observers: Mutex<Vec<mpsc::Sender<JobEvent>>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Registers a new observer and returns its receiving end.
    pub fn subscribe(&self) -> mpsc::Receiver<JobEvent> {
        let (tx, rx) = mpsc::channel(OBSERVER_QUEUE_DEPTH);
        let mut observers = self.observers.lock().unwrap();
        observers.push(tx);
        debug!("Observer subscribed, {} connected", observers.len());
        rx
    }

    /// Delivers `event` to every observer, pruning the ones that are gone.
    pub fn publish(&self, event: JobEvent) {
        // Snapshot so delivery happens outside the lock.
        let senders: Vec<mpsc::Sender<JobEvent>> = {
            let observers = self.observers.lock().unwrap();
            observers.clone()
        };

        if senders.is_empty() {
            return;
        }

        let mut dead = Vec::new();
        for (idx, sender) in senders.iter().enumerate() {
            match sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Closed(_)) => dead.push(idx),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(job_id = event.job_id, "Observer queue full, dropping event");
                }
            }
        }

        if !dead.is_empty() {
            let mut observers = self.observers.lock().unwrap();
            observers.retain(|s| !s.is_closed());
            debug!("Pruned dead observers, {} remain", observers.len());
        }
    }

    /// Number of currently-connected observers.
    pub fn observer_count(&self) -> usize {
        self.observers.lock().unwrap().len()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
