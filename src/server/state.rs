//! Shared handler state.

use std::sync::Arc;

use crate::storage::{BackendKind, Storage};

/// Shared context for all HTTP handlers.
///
/// Built once at startup and handed to the router; the storage backend inside
/// never changes for the life of the process.
pub struct AppContext {
    /// Active storage facade
    pub storage: Arc<dyn Storage>,
}

impl AppContext {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Which backend the facade picked.
    pub fn backend(&self) -> BackendKind {
        self.storage.backend()
    }
}
