use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::JobOptions;

/// A monitored source (channel or playlist) checked periodically for new
/// items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub check_interval_hours: u32,
    pub enabled: bool,
    /// Options applied to every job this subscription enqueues.
    pub options: JobOptions,
    pub last_checked: Option<DateTime<Utc>>,
    /// Item count observed on the last completed check.
    pub last_item_count: usize,
    /// Only consider the newest N resolved items, when set.
    pub keep_last_n: Option<usize>,
    /// Whether members-only items are eligible.
    pub include_members: bool,
    /// Case-insensitive glob over item titles (`*` and `?`), when set.
    pub title_filter: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    pub fn new(id: i64, url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            name: name.into(),
            check_interval_hours: 24,
            enabled: true,
            options: JobOptions::default(),
            last_checked: None,
            last_item_count: 0,
            keep_last_n: None,
            include_members: true,
            title_filter: None,
            created_at: Utc::now(),
        }
    }

    /// Whether this subscription is due for a check at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_checked {
            None => true,
            Some(last) => now >= last + chrono::Duration::hours(self.check_interval_hours as i64),
        }
    }
}
