//! Timestamp and ID utilities for Planboard
//!
//! Detail identifiers are time-based, matching what the planner UI generates
//! for custom details.

use chrono::Utc;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Generate a detail ID for a custom note attached to an item
///
/// Format: `{item_id}-detail-{timestamp_ms}`
/// Example: `action-0-1-detail-1738300800123`
pub fn generate_detail_id(item_id: &str) -> String {
    format!("{}-detail-{}", item_id, now_ms())
}
