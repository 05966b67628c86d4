//! Feed entry selection for subscription checks.

use crate::resolver::FeedEntry;
use crate::store::SubscriptionRecord;

/// Case-insensitive glob match with `*` (any run) and `?` (any one char).
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let text: Vec<char> = text.to_lowercase().chars().collect();

    // Iterative matcher with single-star backtracking.
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            // Let the last `*` absorb one more character and retry.
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

/// Applies a subscription's filters to a resolved feed, preserving order.
///
/// Filter order matters: membership and title filters narrow the candidate
/// set before the newest-N truncation, so `keep_last_n` counts eligible
/// items, not raw feed positions.
pub fn select_entries(sub: &SubscriptionRecord, entries: Vec<FeedEntry>) -> Vec<FeedEntry> {
    let mut selected: Vec<FeedEntry> = entries
        .into_iter()
        .filter(|e| sub.include_members || !e.members_only)
        .filter(|e| {
            sub.title_filter
                .as_deref()
                .is_none_or(|pattern| glob_match(pattern, &e.title))
        })
        .collect();

    if let Some(n) = sub.keep_last_n {
        selected.truncate(n);
    }
    selected
}
