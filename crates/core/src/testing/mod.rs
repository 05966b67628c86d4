//! Testing utilities and mock implementations.
//!
//! Mock implementations of the external collaborator traits, so supervisor
//! and scheduler behavior can be exercised without a real download tool.

mod mock_resolver;

pub use mock_resolver::MockResolver;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::resolver::{FeedEntry, MediaInfo, MediaKind, ResolvedFeed};

    /// Creates single-video metadata with reasonable defaults.
    pub fn video_info(id: &str, title: &str) -> MediaInfo {
        MediaInfo {
            kind: MediaKind::Video,
            id: Some(id.to_string()),
            title: title.to_string(),
            thumbnail: Some(format!("https://i.ytimg.com/vi/{id}/mqdefault.jpg")),
            uploader: Some("Test Channel".to_string()),
            entry_count: None,
        }
    }

    /// Creates a feed entry with reasonable defaults.
    pub fn feed_entry(video_id: &str, title: &str) -> FeedEntry {
        FeedEntry {
            video_id: video_id.to_string(),
            title: title.to_string(),
            duration_secs: Some(300),
            duration_string: Some("5:00".to_string()),
            thumbnail: None,
            uploader: Some("Test Channel".to_string()),
            members_only: false,
        }
    }

    /// Creates a members-only feed entry.
    pub fn members_entry(video_id: &str, title: &str) -> FeedEntry {
        FeedEntry {
            members_only: true,
            ..feed_entry(video_id, title)
        }
    }

    /// Creates a feed of numbered entries, newest first.
    pub fn numbered_feed(title: &str, count: usize) -> ResolvedFeed {
        ResolvedFeed {
            title: title.to_string(),
            entries: (1..=count)
                .map(|i| feed_entry(&format!("vid{i}"), &format!("Episode {i}")))
                .collect(),
        }
    }
}
