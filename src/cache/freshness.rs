//! Freshness policy for cached snapshots.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// A snapshot is fresh while its age is strictly inside the window.
///
/// Ages are wall-clock, consistent with how `cached_at` is recorded. If
/// the host clock moves backward, entries appear artificially fresh;
/// accepted for a client-side optimization layer rather than guarded
/// against.
pub fn is_fresh(cached_at: DateTime<Utc>, max_age: Duration, now: DateTime<Utc>) -> bool {
    match now.signed_duration_since(cached_at).to_std() {
        Ok(age) => age < max_age,
        // Negative age: cached_at is ahead of `now`.
        Err(_) => true,
    }
}

/// Short human-readable age for "showing cached data" banners.
pub fn age_display(cached_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - cached_at).num_minutes();
    if minutes < 1 {
        // Covers clock skew as well
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}
