//! Duration buckets
//!
//! A bucket is the overall plan length the user picked. Counters are kept per
//! bucket, and the wire labels are the ones the planner UI already sends.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PlanboardError;

/// Plan length a counter applies to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DurationBucket {
    /// Eight weeks
    #[default]
    #[serde(rename = "8")]
    Long,
    /// Four weeks
    #[serde(rename = "4")]
    Medium,
    /// Two weeks
    #[serde(rename = "2")]
    Short,
    /// One week
    #[serde(rename = "1")]
    VeryShort,
    /// Two-day sprint
    #[serde(rename = "2days")]
    TwoDay,
}

impl DurationBucket {
    /// Every bucket, longest first.
    pub const ALL: [DurationBucket; 5] = [
        DurationBucket::Long,
        DurationBucket::Medium,
        DurationBucket::Short,
        DurationBucket::VeryShort,
        DurationBucket::TwoDay,
    ];

    /// Get the wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            DurationBucket::Long => "8",
            DurationBucket::Medium => "4",
            DurationBucket::Short => "2",
            DurationBucket::VeryShort => "1",
            DurationBucket::TwoDay => "2days",
        }
    }

    /// Multiplier applied to an item's base popularity when seeding.
    pub fn seed_multiplier(&self) -> f64 {
        match self {
            DurationBucket::Long => 1.2,
            DurationBucket::Medium => 1.0,
            DurationBucket::Short => 0.8,
            DurationBucket::VeryShort => 0.6,
            DurationBucket::TwoDay => 0.4,
        }
    }

    /// Descriptive alias accepted when parsing, e.g. "medium".
    pub fn alias(&self) -> &'static str {
        match self {
            DurationBucket::Long => "long",
            DurationBucket::Medium => "medium",
            DurationBucket::Short => "short",
            DurationBucket::VeryShort => "very-short",
            DurationBucket::TwoDay => "two-day",
        }
    }

    /// Human-readable column heading, e.g. "8 weeks" or "2 days".
    pub fn display_name(&self) -> &'static str {
        match self {
            DurationBucket::Long => "8 weeks",
            DurationBucket::Medium => "4 weeks",
            DurationBucket::Short => "2 weeks",
            DurationBucket::VeryShort => "1 week",
            DurationBucket::TwoDay => "2 days",
        }
    }
}

impl FromStr for DurationBucket {
    type Err = PlanboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DurationBucket::ALL
            .into_iter()
            .find(|d| d.as_str() == s || d.alias().eq_ignore_ascii_case(s))
            .ok_or_else(|| PlanboardError::UnknownDuration(s.to_string()))
    }
}

impl std::fmt::Display for DurationBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
