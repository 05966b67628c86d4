//! Producer-side progress throttling.
//!
//! A fast tool can print dozens of progress lines per second. Forwarding each
//! one to every observer and the store would dominate the job's work, so
//! `Downloading` events are rate-limited here, before fan-out. Every other
//! event kind carries a state change and always passes.

use std::time::Duration;
use tokio::time::Instant;

use crate::events::ProgressEvent;

pub struct ProgressThrottle {
    min_interval: Duration,
    min_step: f32,
    last_forwarded_at: Option<Instant>,
    last_forwarded_percent: f32,
}

impl ProgressThrottle {
    pub fn new(min_interval: Duration, min_step: f32) -> Self {
        Self {
            min_interval,
            min_step,
            last_forwarded_at: None,
            last_forwarded_percent: -1.0,
        }
    }

    /// Whether `event` should be forwarded now.
    ///
    /// A `Downloading` event passes when enough wall time elapsed since the
    /// last forwarded one OR the percent advanced by the configured step.
    /// The first one always passes. Non-`Downloading` events always pass and
    /// reset the percent baseline, so the first `Downloading` after a
    /// `StreamReset` gets through immediately.
    pub fn admit(&mut self, event: &ProgressEvent) -> bool {
        let ProgressEvent::Downloading { percent, .. } = event else {
            self.last_forwarded_percent = -1.0;
            return true;
        };

        let now = Instant::now();
        let due_by_time = self
            .last_forwarded_at
            .is_none_or(|at| now.duration_since(at) >= self.min_interval);
        let due_by_step = *percent - self.last_forwarded_percent >= self.min_step;

        if due_by_time || due_by_step {
            self.last_forwarded_at = Some(now);
            self.last_forwarded_percent = *percent;
            true
        } else {
            false
        }
    }
}
