use serde::{Deserialize, Serialize};

/// What kind of thing a URL resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Playlist,
    Channel,
}

/// Canonical metadata for a resolved URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub kind: MediaKind,
    pub id: Option<String>,
    pub title: String,
    pub thumbnail: Option<String>,
    pub uploader: Option<String>,
    /// Entry count for collections.
    pub entry_count: Option<usize>,
}

/// One item in a resolved feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    pub video_id: String,
    pub title: String,
    pub duration_secs: Option<u64>,
    /// Human-readable duration, "m:ss" or "h:mm:ss".
    pub duration_string: Option<String>,
    pub thumbnail: Option<String>,
    pub uploader: Option<String>,
    /// Requires channel membership; filtered by subscriptions that exclude
    /// members-only content.
    pub members_only: bool,
}

/// A feed listing in resolution order, newest first.
#[derive(Debug, Clone)]
pub struct ResolvedFeed {
    pub title: String,
    pub entries: Vec<FeedEntry>,
}

/// Formats a duration in seconds the way players display it.
pub(crate) fn duration_string(secs: u64) -> String {
    let (mins, secs) = (secs / 60, secs % 60);
    let (hours, mins) = (mins / 60, mins % 60);
    if hours > 0 {
        format!("{hours}:{mins:02}:{secs:02}")
    } else {
        format!("{mins}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_string() {
        assert_eq!(duration_string(0), "0:00");
        assert_eq!(duration_string(59), "0:59");
        assert_eq!(duration_string(630), "10:30");
        assert_eq!(duration_string(3661), "1:01:01");
    }
}
