//! Mock metadata resolver for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::resolver::{MediaInfo, MediaResolver, ResolvedFeed, ResolverError};
use crate::testing::fixtures;

/// Mock implementation of the `MediaResolver` trait.
///
/// `resolve` pops queued responses in FIFO order and fails once the queue is
/// empty. `feed` looks responses up by URL. Calls are recorded for
/// assertions.
#[derive(Default)]
pub struct MockResolver {
    resolve_queue: Mutex<VecDeque<Result<MediaInfo, String>>>,
    resolve_delay: Mutex<Option<Duration>>,
    feeds: Mutex<HashMap<String, ResolvedFeed>>,
    resolved_urls: Mutex<Vec<String>>,
    feed_urls: Mutex<Vec<String>>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful single-video resolution.
    pub fn push_video(&self, id: &str, title: &str) {
        self.resolve_queue
            .lock()
            .unwrap()
            .push_back(Ok(fixtures::video_info(id, title)));
    }

    /// Queues a successful resolution with caller-built metadata.
    pub fn push_media(&self, info: MediaInfo) {
        self.resolve_queue.lock().unwrap().push_back(Ok(info));
    }

    /// Queues a failed resolution.
    pub fn push_error(&self, message: &str) {
        self.resolve_queue
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    /// Makes every `resolve` call sleep first, for exercising timeouts.
    pub fn set_resolve_delay(&self, delay: Duration) {
        *self.resolve_delay.lock().unwrap() = Some(delay);
    }

    /// Sets the feed returned for `url`.
    pub fn set_feed(&self, url: &str, feed: ResolvedFeed) {
        self.feeds.lock().unwrap().insert(url.to_string(), feed);
    }

    /// URLs passed to `resolve`, in call order.
    pub fn resolved_urls(&self) -> Vec<String> {
        self.resolved_urls.lock().unwrap().clone()
    }

    /// URLs passed to `feed`, in call order.
    pub fn feed_urls(&self) -> Vec<String> {
        self.feed_urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaResolver for MockResolver {
    async fn resolve(&self, url: &str) -> Result<MediaInfo, ResolverError> {
        self.resolved_urls.lock().unwrap().push(url.to_string());
        let delay = *self.resolve_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.resolve_queue.lock().unwrap().pop_front() {
            Some(Ok(info)) => Ok(info),
            Some(Err(message)) => Err(ResolverError::ExtractionFailed(message)),
            None => Err(ResolverError::ExtractionFailed(format!(
                "no queued response for {url}"
            ))),
        }
    }

    async fn feed(&self, url: &str) -> Result<ResolvedFeed, ResolverError> {
        self.feed_urls.lock().unwrap().push(url.to_string());
        self.feeds
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| ResolverError::ExtractionFailed(format!("no feed configured for {url}")))
    }
}
