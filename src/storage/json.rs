//! JSON file storage backend.
//!
//! Two files under the data directory:
//! - `counters.json`: object mapping `"<duration>::<item_id>"` to a count
//! - `annotations.json`: array of annotation rows
//!
//! Every call re-reads the file it touches, so edits made by other tools are
//! picked up. Read-modify-write cycles are serialized by a process-wide mutex
//! and files are replaced by rename, so a failed write leaves the old file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Serialize, de::DeserializeOwned};

use super::traits::{AnnotationStore, BackendKind, CounterStore, Storage, clamp_count, sort_newest_first};
use crate::domain::{Annotation, DurationBucket, NewAnnotation};
use crate::error::{PlanboardError, Result};
use crate::id::now_ms;
use crate::seed::seed_value;

/// File holding the counter map.
pub const COUNTERS_FILE: &str = "counters.json";

/// File holding the annotation list.
pub const ANNOTATIONS_FILE: &str = "annotations.json";

/// Flat-file storage.
pub struct JsonStorage {
    counters_path: PathBuf,
    annotations_path: PathBuf,
    lock: Mutex<()>,
}

impl std::fmt::Debug for JsonStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStorage")
            .field("counters_path", &self.counters_path)
            .field("annotations_path", &self.annotations_path)
            .finish_non_exhaustive()
    }
}

impl JsonStorage {
    /// Open the store in `dir`, creating empty files if absent.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let counters_path = dir.join(COUNTERS_FILE);
        let annotations_path = dir.join(ANNOTATIONS_FILE);

        if !counters_path.exists() {
            write_atomic(&counters_path, b"{}")?;
        }
        if !annotations_path.exists() {
            write_atomic(&annotations_path, b"[]")?;
        }

        Ok(Self {
            counters_path,
            annotations_path,
            lock: Mutex::new(()),
        })
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock.lock().map_err(|e| PlanboardError::Storage(e.to_string()))
    }

    fn read_counters(&self) -> Result<BTreeMap<String, i64>> {
        read_json(&self.counters_path)
    }

    fn write_counters(&self, counters: &BTreeMap<String, i64>) -> Result<()> {
        write_json(&self.counters_path, counters)
    }

    fn read_annotations(&self) -> Result<Vec<Annotation>> {
        read_json(&self.annotations_path)
    }

    fn write_annotations(&self, rows: &[Annotation]) -> Result<()> {
        write_json(&self.annotations_path, rows)
    }
}

/// Composite key used in the counters file.
fn counter_key(item_id: &str, duration: DurationBucket) -> String {
    format!("{}::{}", duration.as_str(), item_id)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, &serde_json::to_vec(value)?)
}

/// Write to a sibling temp file then rename over the target.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl CounterStore for JsonStorage {
    fn counts_for_duration(&self, duration: DurationBucket) -> Result<BTreeMap<String, i64>> {
        let _guard = self.guard()?;
        let prefix = format!("{}::", duration.as_str());

        let counts = self
            .read_counters()?
            .into_iter()
            .filter_map(|(key, count)| key.strip_prefix(&prefix).map(|id| (id.to_string(), count)))
            .collect();
        Ok(counts)
    }

    fn increment(&self, item_id: &str, duration: DurationBucket, delta: i64) -> Result<()> {
        let _guard = self.guard()?;
        let mut counters = self.read_counters()?;

        // One unit per call regardless of magnitude
        let step = if delta > 0 { 1 } else { -1 };
        let entry = counters.entry(counter_key(item_id, duration)).or_insert(0);
        *entry = clamp_count(entry.saturating_add(step));

        self.write_counters(&counters)
    }

    fn set_count(&self, item_id: &str, duration: DurationBucket, value: i64) -> Result<()> {
        let _guard = self.guard()?;
        let mut counters = self.read_counters()?;
        counters.insert(counter_key(item_id, duration), clamp_count(value));
        self.write_counters(&counters)
    }

    fn ensure_seed(&self, item_id: &str, duration: DurationBucket) -> Result<()> {
        let _guard = self.guard()?;
        let mut counters = self.read_counters()?;
        let key = counter_key(item_id, duration);
        if counters.contains_key(&key) {
            return Ok(());
        }
        counters.insert(key, seed_value(item_id, duration));
        self.write_counters(&counters)
    }

    fn counter_rows(&self) -> Result<usize> {
        let _guard = self.guard()?;
        Ok(self.read_counters()?.len())
    }

    fn insert_many(&self, entries: &[(String, DurationBucket, i64)]) -> Result<()> {
        let _guard = self.guard()?;
        let mut counters = self.read_counters()?;
        for (item_id, duration, count) in entries {
            counters.insert(counter_key(item_id, *duration), clamp_count(*count));
        }
        self.write_counters(&counters)
    }
}

impl AnnotationStore for JsonStorage {
    fn upsert(&self, record: &NewAnnotation) -> Result<()> {
        let _guard = self.guard()?;
        let mut rows = self.read_annotations()?;

        match rows.iter_mut().find(|r| r.detail_id == record.detail_id) {
            Some(existing) => {
                let created_at = existing.created_at;
                *existing = record.clone().into_annotation(created_at);
            }
            None => rows.push(record.clone().into_annotation(now_ms())),
        }

        self.write_annotations(&rows)
    }

    fn list_all(&self) -> Result<Vec<Annotation>> {
        let _guard = self.guard()?;
        let mut rows = self.read_annotations()?;
        sort_newest_first(&mut rows);
        Ok(rows)
    }
}

impl Storage for JsonStorage {
    fn backend(&self) -> BackendKind {
        BackendKind::Json
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MAX_COUNT;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;
    use crate::domain::DurationBucket::*;

    fn create_test_storage() -> (JsonStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = JsonStorage::open(temp_dir.path()).unwrap();
        (storage, temp_dir)
    }

    fn note(id: &str, text: &str) -> NewAnnotation {
        NewAnnotation::new(id, "action-0-1", "actions", text).unwrap()
    }

    #[test]
    fn test_open_creates_empty_files() {
        let (_storage, temp) = create_test_storage();
        let counters = fs::read_to_string(temp.path().join(COUNTERS_FILE)).unwrap();
        let annotations = fs::read_to_string(temp.path().join(ANNOTATIONS_FILE)).unwrap();
        assert_eq!(counters, "{}");
        assert_eq!(annotations, "[]");
    }

    #[test]
    fn test_open_keeps_existing_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(COUNTERS_FILE), r#"{"4::x":3}"#).unwrap();
        let storage = JsonStorage::open(temp.path()).unwrap();
        assert_eq!(storage.counts_for_duration(Medium).unwrap().get("x"), Some(&3));
    }

    #[test]
    fn test_increment_is_unit_step() {
        let (storage, _temp) = create_test_storage();
        storage.increment("x", Medium, 5).unwrap();
        assert_eq!(storage.counts_for_duration(Medium).unwrap()["x"], 1);
        storage.increment("x", Medium, 1).unwrap();
        assert_eq!(storage.counts_for_duration(Medium).unwrap()["x"], 2);
        storage.increment("x", Medium, -7).unwrap();
        assert_eq!(storage.counts_for_duration(Medium).unwrap()["x"], 1);
    }

    #[test]
    fn test_zero_delta_counts_as_decrement() {
        let (storage, _temp) = create_test_storage();
        storage.set_count("x", Long, 3).unwrap();
        storage.increment("x", Long, 0).unwrap();
        assert_eq!(storage.counts_for_duration(Long).unwrap()["x"], 2);
    }

    #[test]
    fn test_decrement_never_below_zero() {
        let (storage, _temp) = create_test_storage();
        storage.increment("ghost", Short, -1).unwrap();
        assert_eq!(storage.counts_for_duration(Short).unwrap()["ghost"], 0);
        for _ in 0..3 {
            storage.increment("ghost", Short, -1).unwrap();
        }
        assert_eq!(storage.counts_for_duration(Short).unwrap()["ghost"], 0);
    }

    #[test]
    fn test_set_count_clamps() {
        let (storage, _temp) = create_test_storage();
        storage.set_count("x", VeryShort, -5).unwrap();
        assert_eq!(storage.counts_for_duration(VeryShort).unwrap()["x"], 0);
        storage.set_count("x", VeryShort, 9).unwrap();
        assert_eq!(storage.counts_for_duration(VeryShort).unwrap()["x"], 9);
    }

    #[test]
    fn test_increment_at_ceiling_stays_readable() {
        let (storage, _temp) = create_test_storage();
        storage.set_count("x", Long, i64::MAX).unwrap();
        assert_eq!(storage.counts_for_duration(Long).unwrap()["x"], MAX_COUNT);

        storage.increment("x", Long, 1).unwrap();
        assert_eq!(storage.counts_for_duration(Long).unwrap()["x"], MAX_COUNT);
        storage.increment("x", Long, -1).unwrap();
        assert_eq!(storage.counts_for_duration(Long).unwrap()["x"], MAX_COUNT - 1);

        // Lock still usable afterwards
        storage.upsert(&note("d1", "after")).unwrap();
    }

    #[test]
    fn test_oversized_value_on_disk_is_clamped() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(COUNTERS_FILE), format!(r#"{{"8::x":{}}}"#, i64::MAX)).unwrap();
        let storage = JsonStorage::open(temp.path()).unwrap();
        storage.increment("x", Long, 1).unwrap();
        assert_eq!(storage.counts_for_duration(Long).unwrap()["x"], MAX_COUNT);
    }

    #[test]
    fn test_counts_scoped_to_bucket() {
        let (storage, _temp) = create_test_storage();
        storage.set_count("a", Long, 1).unwrap();
        storage.set_count("b", Medium, 2).unwrap();
        storage.set_count("ns::c", Long, 3).unwrap();

        let long = storage.counts_for_duration(Long).unwrap();
        assert_eq!(long.len(), 2);
        assert_eq!(long["a"], 1);
        assert_eq!(long["ns::c"], 3);
        assert!(storage.counts_for_duration(TwoDay).unwrap().is_empty());
    }

    #[test]
    fn test_two_day_prefix_does_not_leak_into_short() {
        let (storage, _temp) = create_test_storage();
        storage.set_count("a", TwoDay, 4).unwrap();
        assert!(storage.counts_for_duration(Short).unwrap().is_empty());
    }

    #[test]
    fn test_ensure_seed_writes_once() {
        let (storage, _temp) = create_test_storage();
        storage.ensure_seed("x", Medium).unwrap();
        assert_eq!(storage.counts_for_duration(Medium).unwrap()["x"], 30);

        storage.set_count("x", Medium, 7).unwrap();
        storage.ensure_seed("x", Medium).unwrap();
        assert_eq!(storage.counts_for_duration(Medium).unwrap()["x"], 7);
    }

    #[test]
    fn test_insert_many_and_row_count() {
        let (storage, _temp) = create_test_storage();
        assert_eq!(storage.counter_rows().unwrap(), 0);
        storage
            .insert_many(&[("a".into(), Long, 1), ("a".into(), Medium, 2), ("b".into(), Long, 3)])
            .unwrap();
        assert_eq!(storage.counter_rows().unwrap(), 3);
    }

    #[test]
    fn test_upsert_overwrites_and_keeps_created_at() {
        let (storage, _temp) = create_test_storage();
        storage.upsert(&note("d1", "first")).unwrap();
        let created = storage.list_all().unwrap()[0].created_at;

        thread::sleep(Duration::from_millis(5));
        let update = note("d1", "second").with_author("kim");
        storage.upsert(&update).unwrap();

        let rows = storage.list_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "second");
        assert_eq!(rows[0].author.as_deref(), Some("kim"));
        assert_eq!(rows[0].created_at, created);
    }

    #[test]
    fn test_upsert_is_full_replace() {
        let (storage, _temp) = create_test_storage();
        storage.upsert(&note("d1", "first").with_author("kim")).unwrap();
        storage.upsert(&note("d1", "second")).unwrap();
        assert_eq!(storage.list_all().unwrap()[0].author, None);
    }

    #[test]
    fn test_list_all_newest_first() {
        let (storage, _temp) = create_test_storage();
        storage.upsert(&note("old", "a")).unwrap();
        thread::sleep(Duration::from_millis(5));
        storage.upsert(&note("new", "b")).unwrap();

        let ids: Vec<String> = storage.list_all().unwrap().into_iter().map(|r| r.detail_id).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn test_allowed_durations_round_trip() {
        let (storage, _temp) = create_test_storage();
        let durations = vec!["2days".to_string(), "8".to_string(), "1".to_string()];
        storage
            .upsert(&note("d1", "x").with_allowed_durations(durations.clone()))
            .unwrap();
        assert_eq!(storage.list_all().unwrap()[0].allowed_durations, Some(durations));
    }

    #[test]
    fn test_persistence_across_instances() {
        let temp_dir = TempDir::new().unwrap();

        {
            let storage = JsonStorage::open(temp_dir.path()).unwrap();
            storage.set_count("x", Long, 11).unwrap();
            storage.upsert(&note("d1", "kept")).unwrap();
        }

        {
            let storage = JsonStorage::open(temp_dir.path()).unwrap();
            assert_eq!(storage.counts_for_duration(Long).unwrap()["x"], 11);
            assert_eq!(storage.list_all().unwrap()[0].text, "kept");
        }
    }

    #[test]
    fn test_writes_leave_no_temp_files() {
        let (storage, temp) = create_test_storage();
        storage.set_count("x", Long, 1).unwrap();
        storage.upsert(&note("d1", "x")).unwrap();
        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let (storage, _temp) = create_test_storage();
        let storage = std::sync::Arc::new(storage);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let storage = storage.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        storage.increment("hot", Long, 1).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(storage.counts_for_duration(Long).unwrap()["hot"], 80);
    }

    #[test]
    fn test_corrupt_file_surfaces_error() {
        let (storage, temp) = create_test_storage();
        fs::write(temp.path().join(COUNTERS_FILE), "not json").unwrap();
        let err = storage.counts_for_duration(Long).unwrap_err();
        assert!(matches!(err, PlanboardError::Json(_)));
    }
}
