use serde::{Deserialize, Serialize};

use crate::job::JobId;

/// Structured progress for one job, distilled from the tool's text output.
///
/// Events are emitted in time order per job. Consumers must tolerate percent
/// going backward only when a `StreamReset` precedes it: a single job may
/// fetch several streams (video then audio) that each restart from 0%.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Active transfer progress.
    Downloading {
        percent: f32,
        speed: Option<String>,
        eta: Option<String>,
    },
    /// The tool started fetching another stream; progress restarts from 0.
    StreamReset,
    /// Post-processing phase with a human-readable step name.
    Processing { step: String },
    /// Terminal: download succeeded, file is at `path`.
    Finished { path: Option<String> },
    /// Terminal: cancelled by request; `partial_path` is what cleanup saw.
    Cancelled { partial_path: Option<String> },
    /// Terminal: job failed.
    Failed { message: String },
}

impl ProgressEvent {
    /// Whether this event ends the job's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished { .. } | Self::Cancelled { .. } | Self::Failed { .. }
        )
    }
}

/// A progress event tagged with the job it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: JobId,
    #[serde(flatten)]
    pub event: ProgressEvent,
}

impl JobEvent {
    pub fn new(job_id: JobId, event: ProgressEvent) -> Self {
        Self { job_id, event }
    }
}
