//! Planboard - storage and HTTP backend for a design-process planner
//!
//! Keeps per-(item, duration) like counters and user notes on checklist
//! items, behind one storage facade that runs on SQLite or, when that is
//! unavailable, on plain JSON files.

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod id;
pub mod seed;
pub mod server;
pub mod storage;
pub mod summary;

pub use error::{PlanboardError, Result};
