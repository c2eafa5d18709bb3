//! Deterministic seed values
//!
//! When no usage data exists for an item yet, its counter starts from a stable
//! pseudo-random "popularity" derived from the id. The hash walks UTF-16 code
//! units so values match those produced by the planner UI.

use crate::domain::DurationBucket;

/// Item ids pre-populated on a fresh store.
pub const EXAMPLE_ITEM_IDS: [&str; 7] = [
    "action-0-1-detail-1",
    "action-0-1-detail-2",
    "deliv-0-1-detail-1",
    "ai-0-1-detail-1",
    "action-3-1-detail-1",
    "deliv-4-2-detail-1",
    "ai-6-1-detail-1",
];

const BASE_MIN: u32 = 10;
const BASE_SPAN: u32 = 25;

/// Base popularity for an id, always in `10..=34`.
pub fn base_for_id(id: &str) -> i64 {
    let hash = id
        .encode_utf16()
        .fold(0u32, |h, unit| h.wrapping_mul(31).wrapping_add(u32::from(unit)));
    i64::from(hash % BASE_SPAN + BASE_MIN)
}

/// Scale a base value for a bucket, flooring and clamping at zero.
pub fn vary_by_duration(base: i64, duration: DurationBucket) -> i64 {
    let scaled = (base as f64 * duration.seed_multiplier()).floor() as i64;
    scaled.max(0)
}

/// Seeded starting count for `(id, duration)`.
pub fn seed_value(id: &str, duration: DurationBucket) -> i64 {
    vary_by_duration(base_for_id(id), duration)
}

/// All `(item_id, duration, count)` triples written on first run.
pub fn example_seeds() -> Vec<(String, DurationBucket, i64)> {
    EXAMPLE_ITEM_IDS
        .iter()
        .flat_map(|id| {
            DurationBucket::ALL
                .into_iter()
                .map(move |d| (id.to_string(), d, seed_value(id, d)))
        })
        .collect()
}
