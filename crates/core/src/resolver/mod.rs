//! Canonical item metadata resolution.
//!
//! The core needs two lookups from the external tool before and around a
//! download: single-item metadata (id, title, thumbnail) and the flat item
//! list of a channel/playlist feed. Both shell out to the tool's JSON dump
//! mode; the tool's own extraction semantics are opaque to us.

mod types;
mod ytdlp;

use async_trait::async_trait;
use thiserror::Error;

pub use types::{FeedEntry, MediaInfo, MediaKind, ResolvedFeed};
pub use ytdlp::YtDlpResolver;

/// Errors raised while resolving metadata.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Download tool not found at path: {0}")]
    ToolNotFound(String),

    #[error("Metadata extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Failed to parse tool output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolves item metadata and feed listings for a source URL.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resolves canonical metadata for a single item or collection URL.
    async fn resolve(&self, url: &str) -> Result<MediaInfo, ResolverError>;

    /// Resolves the current item list of a channel/playlist feed.
    async fn feed(&self, url: &str) -> Result<ResolvedFeed, ResolverError>;
}
