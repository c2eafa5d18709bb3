//! Storage trait definitions and backend kinds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Annotation, DurationBucket, NewAnnotation};
use crate::error::Result;

/// Which implementation is serving the storage contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Embedded SQLite database
    Sqlite,
    /// Two JSON files rewritten on every call
    Json,
}

impl BackendKind {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Sqlite => "sqlite",
            BackendKind::Json => "json",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Largest value a counter can hold; writes above it are clamped.
pub const MAX_COUNT: i64 = 1_000_000_000;

/// Clamp a count into `0..=MAX_COUNT`.
pub fn clamp_count(value: i64) -> i64 {
    value.clamp(0, MAX_COUNT)
}

/// Integer tallies keyed by `(item_id, duration)`.
///
/// Counts stay within `0..=MAX_COUNT`. Absent keys are omitted from reads rather
/// than reported as zero.
pub trait CounterStore {
    /// All recorded counts for one bucket.
    fn counts_for_duration(&self, duration: DurationBucket) -> Result<BTreeMap<String, i64>>;

    /// Apply a signed step, creating the counter at 0 first if needed.
    fn increment(&self, item_id: &str, duration: DurationBucket, delta: i64) -> Result<()>;

    /// Absolute set, clamped at zero.
    fn set_count(&self, item_id: &str, duration: DurationBucket, value: i64) -> Result<()>;

    /// Write the deterministic seed if the key has no value yet.
    fn ensure_seed(&self, item_id: &str, duration: DurationBucket) -> Result<()>;

    /// Number of counter rows across all buckets.
    fn counter_rows(&self) -> Result<usize>;

    /// Insert many counters in one write. Used for first-run seeding.
    fn insert_many(&self, entries: &[(String, DurationBucket, i64)]) -> Result<()>;
}

/// User notes keyed by `detail_id`.
pub trait AnnotationStore {
    /// Insert, or fully replace an existing row with the same `detail_id`.
    ///
    /// Input is assumed validated; the first `created_at` survives updates.
    fn upsert(&self, record: &NewAnnotation) -> Result<()>;

    /// Every row, newest `created_at` first, ties by `detail_id`.
    fn list_all(&self) -> Result<Vec<Annotation>>;
}

/// The full storage contract both backends satisfy.
pub trait Storage: CounterStore + AnnotationStore + Send + Sync {
    /// Which backend this is.
    fn backend(&self) -> BackendKind;
}

/// Order annotations newest first, breaking ties by id.
pub(crate) fn sort_newest_first(rows: &mut [Annotation]) {
    rows.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.detail_id.cmp(&b.detail_id))
    });
}
