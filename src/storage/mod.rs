//! Storage layer for Planboard.
//!
//! One facade over two interchangeable backends:
//! - **SQLite** (`sqlite` feature): two tables with primary-key upserts
//! - **JSON files**: read-modify-write on every call
//!
//! The backend is chosen once by [`open`] and callers only ever see
//! `Arc<dyn Storage>` afterwards.
//!
//! # Example
//!
//! ```ignore
//! use planboard::config::StorageConfig;
//! use planboard::domain::DurationBucket;
//! use planboard::storage;
//!
//! let storage = storage::open(&StorageConfig::default())?;
//! storage.ensure_seed("action-0-1-detail-1", DurationBucket::Medium)?;
//! storage.increment("action-0-1-detail-1", DurationBucket::Medium, 1)?;
//! let counts = storage.counts_for_duration(DurationBucket::Medium)?;
//! ```

mod json;
#[cfg(feature = "sqlite")]
mod sqlite;
mod traits;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::error::{PlanboardError, Result};
use crate::seed::example_seeds;

pub use json::{ANNOTATIONS_FILE, COUNTERS_FILE, JsonStorage};
#[cfg(feature = "sqlite")]
pub use sqlite::{DB_FILE, SqliteStorage};
pub use traits::{AnnotationStore, BackendKind, CounterStore, MAX_COUNT, Storage, clamp_count};

/// Environment flag; `USE_SQLITE=0` forces the JSON backend.
pub const USE_SQLITE_ENV: &str = "USE_SQLITE";

/// Decide which backend to try given the configured preference and the
/// value of `USE_SQLITE`, if set.
pub fn resolve_backend(preferred: BackendKind, use_sqlite_env: Option<&str>) -> BackendKind {
    match use_sqlite_env.map(str::trim) {
        Some("0") => BackendKind::Json,
        _ if cfg!(feature = "sqlite") => preferred,
        _ => BackendKind::Json,
    }
}

/// Open the storage facade described by `config`.
///
/// Reads `USE_SQLITE` from the process environment.
pub fn open(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    let env = std::env::var(USE_SQLITE_ENV).ok();
    let kind = resolve_backend(config.backend, env.as_deref());
    open_with_backend(&config.data_dir, kind)
}

/// Open the facade in `data_dir`, trying `preferred` first.
///
/// The directory is created if needed; failure there is fatal. If SQLite
/// cannot be opened the JSON backend is used instead. A store with no counter
/// rows gets the example seeds.
pub fn open_with_backend(data_dir: &Path, preferred: BackendKind) -> Result<Arc<dyn Storage>> {
    fs::create_dir_all(data_dir).map_err(|source| PlanboardError::StorageInit {
        path: data_dir.to_path_buf(),
        source,
    })?;

    let storage: Arc<dyn Storage> = match preferred {
        BackendKind::Sqlite => match open_sqlite(data_dir) {
            Ok(storage) => storage,
            Err(e) => {
                tracing::warn!(error = %e, "SQLite unavailable, falling back to JSON files");
                Arc::new(JsonStorage::open(data_dir)?)
            }
        },
        BackendKind::Json => Arc::new(JsonStorage::open(data_dir)?),
    };

    tracing::info!(backend = %storage.backend(), dir = %data_dir.display(), "Storage ready");
    seed_if_empty(storage.as_ref())?;
    Ok(storage)
}

#[cfg(feature = "sqlite")]
fn open_sqlite(data_dir: &Path) -> Result<Arc<dyn Storage>> {
    Ok(Arc::new(SqliteStorage::open(data_dir.join(DB_FILE))?))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_data_dir: &Path) -> Result<Arc<dyn Storage>> {
    Err(PlanboardError::Storage("built without the sqlite feature".to_string()))
}

/// Write example seeds when the store holds no counters. Returns rows written.
pub fn seed_if_empty(storage: &dyn Storage) -> Result<usize> {
    if storage.counter_rows()? > 0 {
        return Ok(0);
    }
    let seeds = example_seeds();
    storage.insert_many(&seeds)?;
    tracing::info!(rows = seeds.len(), "Seeded example counters");
    Ok(seeds.len())
}
