use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::types::{duration_string, FeedEntry, MediaInfo, MediaKind, ResolvedFeed};
use super::{MediaResolver, ResolverError};
use crate::config::FetcherConfig;

/// Resolver that shells out to the tool's single-JSON dump mode.
pub struct YtDlpResolver {
    tool_path: PathBuf,
    cookies_path: PathBuf,
}

/// Shape of the tool's `-J` dump, reduced to the fields we read.
#[derive(Deserialize)]
struct Dump {
    #[serde(rename = "_type")]
    dump_type: Option<String>,
    id: Option<String>,
    title: Option<String>,
    thumbnail: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    extractor: Option<String>,
    entries: Option<Vec<Option<DumpEntry>>>,
}

#[derive(Deserialize)]
struct DumpEntry {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    uploader: Option<String>,
    availability: Option<String>,
}

impl YtDlpResolver {
    pub fn new(config: &FetcherConfig) -> Self {
        Self {
            tool_path: config.tool_path.clone(),
            cookies_path: config.cookies_path.clone(),
        }
    }

    async fn dump(&self, url: &str) -> Result<Dump, ResolverError> {
        let mut cmd = Command::new(&self.tool_path);
        cmd.args([
            "--dump-single-json",
            "--flat-playlist",
            "--no-warnings",
            "--quiet",
        ]);
        if self.cookies_path.exists() {
            cmd.arg("--cookies").arg(&self.cookies_path);
        }
        cmd.arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(url, tool = %self.tool_path.display(), "Resolving metadata");

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ResolverError::ToolNotFound(self.tool_path.display().to_string())
            } else {
                ResolverError::Io(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolverError::ExtractionFailed(
                stderr.lines().last().unwrap_or("unknown error").to_string(),
            ));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ResolverError::ParseError(e.to_string()))
    }

    fn classify(dump: &Dump) -> MediaKind {
        if dump.entries.is_none() {
            return MediaKind::Video;
        }
        let extractor = dump.extractor.as_deref().unwrap_or_default();
        if extractor.to_lowercase().contains("channel")
            || dump.dump_type.as_deref() == Some("channel")
        {
            MediaKind::Channel
        } else {
            MediaKind::Playlist
        }
    }

    fn entry_to_feed(entry: DumpEntry) -> Option<FeedEntry> {
        let video_id = entry.id?;
        let title = entry.title.unwrap_or_else(|| "Unknown".to_string());

        // Flat dumps often omit thumbnails; the platform serves them by id.
        let thumbnail = entry.thumbnail.or_else(|| {
            Some(format!("https://i.ytimg.com/vi/{video_id}/mqdefault.jpg"))
        });

        let members_only = matches!(
            entry.availability.as_deref(),
            Some("subscriber_only") | Some("needs_premium")
        ) || {
            let lower = title.to_lowercase();
            lower.contains("(members only)") || lower.contains("[members only]")
        };

        let duration_secs = entry.duration.map(|d| d as u64);
        Some(FeedEntry {
            duration_string: duration_secs.map(duration_string),
            video_id,
            title,
            duration_secs,
            thumbnail,
            uploader: entry.uploader,
            members_only,
        })
    }
}

#[async_trait::async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, url: &str) -> Result<MediaInfo, ResolverError> {
        let dump = self.dump(url).await?;
        let kind = Self::classify(&dump);
        Ok(MediaInfo {
            kind,
            id: dump.id,
            title: dump.title.unwrap_or_else(|| "Unknown".to_string()),
            thumbnail: dump.thumbnail,
            uploader: dump.uploader.or(dump.channel),
            entry_count: dump.entries.as_ref().map(|e| e.len()),
        })
    }

    async fn feed(&self, url: &str) -> Result<ResolvedFeed, ResolverError> {
        let dump = self.dump(url).await?;
        let title = dump.title.unwrap_or_else(|| "Playlist".to_string());
        let entries = dump
            .entries
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .filter_map(Self::entry_to_feed)
            .collect();
        Ok(ResolvedFeed { title, entries })
    }
}
