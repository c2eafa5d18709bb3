//! Domain types for Planboard
//!
//! - DurationBucket: the closed set of plan lengths counters are kept under
//! - Annotation / NewAnnotation: user-submitted notes on checklist items

pub mod annotation;
pub mod duration;

pub use annotation::{Annotation, NewAnnotation};
pub use duration::DurationBucket;
