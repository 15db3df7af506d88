// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # SyncOperation Value Object (analytics)
//!
//! An append-only record of one sync attempt, written regardless of outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Manual,
    GitHook,
    Scheduled,
    Realtime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperationStatus {
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOperationRecord {
    pub id: String,
    pub project_id: String,
    pub trigger: SyncTrigger,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: SyncOperationStatus,
    pub files_processed: u64,
    pub chunks_added: u64,
    pub chunks_modified: u64,
    pub chunks_deleted: u64,
    pub duration_seconds: Option<f64>,
    pub error_message: Option<String>,
}
