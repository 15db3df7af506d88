// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # SyncStats Value Object

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStats {
    pub files_processed: u64,
    pub chunks_added: u64,
    pub chunks_modified: u64,
    pub chunks_deleted: u64,
    pub duration_seconds: f64,
    pub errors: Vec<String>,
}

impl SyncStats {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}
