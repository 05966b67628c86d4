use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller-assigned job identifier, unique across the store.
pub type JobId = i64;

/// Lifecycle state of a download job.
///
/// `Queued → FetchingMetadata → Running → {Completed | Failed | Cancelled}`.
/// Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    FetchingMetadata,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Options a caller attaches to a job, encoded into the tool's command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOptions {
    /// Format selector, e.g. "best" or "bestvideo[height<=1080]+bestaudio".
    pub format: String,
    /// Desired output container ("mp4", "mp3", "original", ...).
    pub output_format: String,
    /// Output template with interpolation placeholders for channel, upload
    /// date, title and extension.
    pub output_template: String,
    pub subtitles: bool,
    pub subtitle_langs: Vec<String>,
    pub embed_thumbnail: bool,
    pub embed_metadata: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            format: "best".to_string(),
            output_format: "mp4".to_string(),
            output_template: "%(channel)s/%(upload_date)s_%(title)s.%(ext)s".to_string(),
            subtitles: false,
            subtitle_langs: vec!["en".to_string()],
            embed_thumbnail: false,
            embed_metadata: true,
        }
    }
}

/// One job record as held by the persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub url: String,
    /// Platform-specific item id, filled after metadata resolution.
    pub video_id: Option<String>,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub state: JobState,
    pub progress: f32,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub output_path: Option<String>,
    pub error_message: Option<String>,
    pub options: JobOptions,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(id: JobId, url: impl Into<String>, options: JobOptions) -> Self {
        Self {
            id,
            url: url.into(),
            video_id: None,
            title: None,
            thumbnail: None,
            state: JobState::Queued,
            progress: 0.0,
            speed: None,
            eta: None,
            output_path: None,
            error_message: None,
            options,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}
