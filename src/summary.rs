//! Summary aggregation
//!
//! Joins annotations with their per-duration counts for the summary page, and
//! rolls counts up per owning item. Read-only: missing counters read as 0 and
//! nothing gets seeded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Annotation, DurationBucket};
use crate::error::Result;
use crate::storage::Storage;

/// Kind of checklist entry a detail hangs off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Action,
    Deliverable,
    AiBoost,
}

impl Category {
    /// Map a section tag as used by the planner ("actions", "deliverables", "aiBoosts").
    pub fn from_section(section: &str) -> Option<Self> {
        match section {
            "actions" => Some(Category::Action),
            "deliverables" => Some(Category::Deliverable),
            "aiBoosts" => Some(Category::AiBoost),
            _ => None,
        }
    }

    /// Infer from a detail id, falling back to the stored section.
    ///
    /// Built-in ids start with `action-`, `deliv-` or `ai-`; user-created ones
    /// look like `custom-<phase>-<section>-...`.
    pub fn infer(detail_id: &str, section: &str) -> Option<Self> {
        if detail_id.starts_with("action-") {
            return Some(Category::Action);
        }
        if detail_id.starts_with("deliv-") {
            return Some(Category::Deliverable);
        }
        if detail_id.starts_with("ai-") {
            return Some(Category::AiBoost);
        }
        if detail_id.starts_with("custom-") {
            if let Some(cat) = detail_id.split('-').nth(2).and_then(Self::from_section) {
                return Some(cat);
            }
        }
        Self::from_section(section)
    }
}

/// One annotation with its counts across buckets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub detail_id: String,
    pub item_id: String,
    pub text: String,
    pub category: Option<Category>,
    pub parent_title: Option<String>,
    pub phase_title: Option<String>,
    pub author: Option<String>,
    /// Duration label to count; `None` where the note doesn't apply
    pub per_duration: BTreeMap<String, Option<i64>>,
}

/// Counts summed over every annotation of one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemTotal {
    pub item_id: String,
    pub parent_title: Option<String>,
    pub per_duration: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub rows: Vec<SummaryRow>,
    pub items: Vec<ItemTotal>,
}

/// Build the summary from the current store contents.
pub fn build_summary(storage: &dyn Storage) -> Result<Summary> {
    let annotations = storage.list_all()?;

    let mut counts: BTreeMap<DurationBucket, BTreeMap<String, i64>> = BTreeMap::new();
    for d in DurationBucket::ALL {
        counts.insert(d, storage.counts_for_duration(d)?);
    }

    let rows: Vec<SummaryRow> = annotations.iter().map(|a| summarize(a, &counts)).collect();
    let items = roll_up(&annotations, &rows);

    Ok(Summary { rows, items })
}

fn summarize(annotation: &Annotation, counts: &BTreeMap<DurationBucket, BTreeMap<String, i64>>) -> SummaryRow {
    let per_duration = DurationBucket::ALL
        .iter()
        .map(|d| {
            let label = d.as_str();
            let value = annotation.applies_to(label).then(|| {
                counts
                    .get(d)
                    .and_then(|m| m.get(&annotation.detail_id))
                    .copied()
                    .unwrap_or(0)
            });
            (label.to_string(), value)
        })
        .collect();

    SummaryRow {
        detail_id: annotation.detail_id.clone(),
        item_id: annotation.item_id.clone(),
        text: annotation.text.clone(),
        category: Category::infer(&annotation.detail_id, &annotation.section),
        parent_title: annotation.parent_title.clone(),
        phase_title: annotation.phase_title.clone(),
        author: annotation.author.clone(),
        per_duration,
    }
}

fn roll_up(annotations: &[Annotation], rows: &[SummaryRow]) -> Vec<ItemTotal> {
    let mut totals: BTreeMap<String, ItemTotal> = BTreeMap::new();

    for (annotation, row) in annotations.iter().zip(rows) {
        let total = totals.entry(annotation.item_id.clone()).or_insert_with(|| ItemTotal {
            item_id: annotation.item_id.clone(),
            parent_title: None,
            per_duration: DurationBucket::ALL.iter().map(|d| (d.as_str().to_string(), 0)).collect(),
        });

        if total.parent_title.is_none() {
            total.parent_title = annotation.parent_title.clone().filter(|t| !t.is_empty());
        }
        for (label, value) in &row.per_duration {
            if let (Some(v), Some(sum)) = (value, total.per_duration.get_mut(label)) {
                *sum += v;
            }
        }
    }

    totals.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewAnnotation;
    use crate::storage::{AnnotationStore, CounterStore, JsonStorage};
    use tempfile::TempDir;

    #[test]
    fn test_category_inference() {
        assert_eq!(Category::infer("action-0-1-detail-1", ""), Some(Category::Action));
        assert_eq!(Category::infer("deliv-4-2-detail-1", ""), Some(Category::Deliverable));
        assert_eq!(Category::infer("ai-6-1-detail-1", ""), Some(Category::AiBoost));
        assert_eq!(
            Category::infer("custom-2-deliverables-1738300800123-detail-9", "actions"),
            Some(Category::Deliverable)
        );
        assert_eq!(Category::infer("custom-2-aiBoosts-1", ""), Some(Category::AiBoost));
        assert_eq!(Category::infer("note-17", "actions"), Some(Category::Action));
        assert_eq!(Category::infer("note-17", "misc"), None);
    }

    #[test]
    fn test_summary_rows_and_totals() {
        let temp = TempDir::new().unwrap();
        let storage = JsonStorage::open(temp.path()).unwrap();

        storage
            .upsert(
                &NewAnnotation::new("custom-1-actions-1-detail-1", "custom-1-actions-1", "actions", "first")
                    .unwrap()
                    .with_parent_title("Kickoff")
                    .with_allowed_durations(vec!["8".into(), "4".into()]),
            )
            .unwrap();
        storage
            .upsert(&NewAnnotation::new("custom-1-actions-1-detail-2", "custom-1-actions-1", "actions", "second").unwrap())
            .unwrap();

        storage.set_count("custom-1-actions-1-detail-1", DurationBucket::Long, 3).unwrap();
        storage.set_count("custom-1-actions-1-detail-1", DurationBucket::Short, 50).unwrap();
        storage.set_count("custom-1-actions-1-detail-2", DurationBucket::Long, 4).unwrap();
        storage.set_count("custom-1-actions-1-detail-2", DurationBucket::Short, 2).unwrap();

        let summary = build_summary(&storage).unwrap();
        assert_eq!(summary.rows.len(), 2);

        let first = summary
            .rows
            .iter()
            .find(|r| r.detail_id == "custom-1-actions-1-detail-1")
            .unwrap();
        assert_eq!(first.category, Some(Category::Action));
        assert_eq!(first.per_duration["8"], Some(3));
        assert_eq!(first.per_duration["4"], Some(0));
        assert_eq!(first.per_duration["2"], None);
        assert_eq!(first.per_duration["2days"], None);

        let second = summary
            .rows
            .iter()
            .find(|r| r.detail_id == "custom-1-actions-1-detail-2")
            .unwrap();
        assert_eq!(second.per_duration["2"], Some(2));
        assert_eq!(second.per_duration["1"], Some(0));

        assert_eq!(summary.items.len(), 1);
        let item = &summary.items[0];
        assert_eq!(item.item_id, "custom-1-actions-1");
        assert_eq!(item.parent_title.as_deref(), Some("Kickoff"));
        assert_eq!(item.per_duration["8"], 7);
        assert_eq!(item.per_duration["2"], 2);
        assert_eq!(item.per_duration["2days"], 0);
    }

    #[test]
    fn test_summary_does_not_seed() {
        let temp = TempDir::new().unwrap();
        let storage = JsonStorage::open(temp.path()).unwrap();
        storage
            .upsert(&NewAnnotation::new("d1", "item", "actions", "x").unwrap())
            .unwrap();

        let summary = build_summary(&storage).unwrap();
        assert!(summary.rows[0].per_duration.values().all(|v| *v == Some(0)));
        assert_eq!(storage.counter_rows().unwrap(), 0);
    }
}
