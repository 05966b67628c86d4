use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// External download tool and job supervision settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetcherConfig {
    /// Path to the yt-dlp binary.
    #[serde(default = "default_tool_path")]
    pub tool_path: PathBuf,
    /// Directory downloaded files land in.
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,
    /// Netscape cookies file passed to the tool when it exists.
    #[serde(default = "default_cookies_path")]
    pub cookies_path: PathBuf,
    /// Bound on the metadata resolution call.
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_secs: u64,
    /// Grace period between SIGTERM and SIGKILL on cancellation.
    #[serde(default = "default_terminate_grace")]
    pub terminate_grace_secs: u64,
    /// Retry count handed to the tool.
    #[serde(default = "default_tool_retries")]
    pub tool_retries: u32,
    /// Minimum wall time between forwarded Downloading events.
    #[serde(default = "default_throttle_ms")]
    pub progress_throttle_ms: u64,
    /// Percent advance that forces a Downloading event through the throttle.
    #[serde(default = "default_throttle_step")]
    pub progress_throttle_step: f32,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            tool_path: default_tool_path(),
            downloads_dir: default_downloads_dir(),
            cookies_path: default_cookies_path(),
            metadata_timeout_secs: default_metadata_timeout(),
            terminate_grace_secs: default_terminate_grace(),
            tool_retries: default_tool_retries(),
            progress_throttle_ms: default_throttle_ms(),
            progress_throttle_step: default_throttle_step(),
        }
    }
}

fn default_tool_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_cookies_path() -> PathBuf {
    PathBuf::from("./data/cookies.txt")
}

fn default_metadata_timeout() -> u64 {
    120
}

fn default_terminate_grace() -> u64 {
    5
}

fn default_tool_retries() -> u32 {
    10
}

fn default_throttle_ms() -> u64 {
    500
}

fn default_throttle_step() -> f32 {
    2.0
}

/// Subscription scheduler settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Fixed period between scheduler cycles, independent of per-subscription
    /// check intervals.
    #[serde(default = "default_poll_secs")]
    pub poll_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_secs(),
        }
    }
}

fn default_poll_secs() -> u64 {
    300
}

/// Partial-download cleanup settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CleanupConfig {
    /// Delay before sweeping, letting a terminated process release handles.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Extension of the marker files the tool leaves next to interrupted
    /// transfers.
    #[serde(default = "default_marker_ext")]
    pub marker_extension: String,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            marker_extension: default_marker_ext(),
        }
    }
}

fn default_settle_ms() -> u64 {
    500
}

fn default_marker_ext() -> String {
    "ytdl".to_string()
}
