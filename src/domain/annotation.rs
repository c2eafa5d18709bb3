//! Annotation records
//!
//! An annotation is a free-text note a user attaches to a checklist item. It
//! carries denormalized display metadata (parent/phase titles) so the summary
//! page can render it without the static checklist catalog.

use serde::{Deserialize, Serialize};

use crate::error::{PlanboardError, Result};

/// A stored annotation row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    //=== Identity ===
    /// Caller-supplied unique key, typically time-based
    pub detail_id: String,

    //=== Ownership ===
    /// Checklist item this note belongs to
    pub item_id: String,

    /// Category tag, e.g. "actions", "deliverables", "aiBoosts"
    pub section: String,

    /// Display name of the owning item
    pub parent_title: Option<String>,

    /// Display name of the owning phase
    pub phase_title: Option<String>,

    /// Duration labels this note applies to (None means all), order preserved
    pub allowed_durations: Option<Vec<String>>,

    //=== Content ===
    pub text: String,
    pub author: Option<String>,

    /// Unix timestamp in milliseconds, set on first insert
    pub created_at: i64,
}

/// Validated input for an annotation upsert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAnnotation {
    pub detail_id: String,
    pub item_id: String,
    pub section: String,
    pub parent_title: Option<String>,
    pub phase_title: Option<String>,
    pub allowed_durations: Option<Vec<String>>,
    pub text: String,
    pub author: Option<String>,
}

impl NewAnnotation {
    /// Build an upsert input, rejecting empty required fields.
    pub fn new(
        detail_id: impl Into<String>,
        item_id: impl Into<String>,
        section: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<Self> {
        let draft = Self {
            detail_id: detail_id.into(),
            item_id: item_id.into(),
            section: section.into(),
            parent_title: None,
            phase_title: None,
            allowed_durations: None,
            text: text.into(),
            author: None,
        };
        draft.validate()?;
        Ok(draft)
    }

    pub fn with_parent_title(mut self, title: impl Into<String>) -> Self {
        self.parent_title = Some(title.into());
        self
    }

    pub fn with_phase_title(mut self, title: impl Into<String>) -> Self {
        self.phase_title = Some(title.into());
        self
    }

    pub fn with_allowed_durations(mut self, durations: Vec<String>) -> Self {
        self.allowed_durations = Some(durations);
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Check that every required field is present and non-empty.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("detail_id", &self.detail_id),
            ("item_id", &self.item_id),
            ("section", &self.section),
            ("text", &self.text),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, v)| v.is_empty())
            .map(|(name, _)| *name)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PlanboardError::InvalidInput(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )))
        }
    }

    /// Materialize the stored row with the given creation time.
    pub fn into_annotation(self, created_at: i64) -> Annotation {
        Annotation {
            detail_id: self.detail_id,
            item_id: self.item_id,
            section: self.section,
            parent_title: self.parent_title,
            phase_title: self.phase_title,
            allowed_durations: self.allowed_durations,
            text: self.text,
            author: self.author,
            created_at,
        }
    }
}

impl Annotation {
    /// Whether this note applies under the given duration label.
    pub fn applies_to(&self, label: &str) -> bool {
        match &self.allowed_durations {
            Some(allowed) => allowed.iter().any(|d| d == label),
            None => true,
        }
    }
}
