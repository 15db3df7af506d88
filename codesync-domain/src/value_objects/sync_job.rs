// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # SyncJob Value Object

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SyncPriority {
    /// Lower numeric value sorts first.
    Manual = 0,
    Auto = 1,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    pub operation_id: String,
    pub project_id: String,
    pub changed_files: Option<Vec<PathBuf>>,
    pub priority: SyncPriority,
    pub enqueued_at: DateTime<Utc>,
}
