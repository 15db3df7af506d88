// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Checkpoint Value Object
//!
//! A durable record of work-in-progress used by `RecoveryService` to resume a
//! sync job after a worker crash. Exactly one `Active` checkpoint may exist
//! per project at a time; this invariant is enforced by the checkpoint store,
//! not by this type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    Active,
    Completed,
    Failed,
    RolledBack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub project_id: String,
    pub sync_job_id: String,
    pub files_processed: Vec<String>,
    pub files_remaining: Vec<String>,
    pub chunks_created: Vec<String>,
    pub status: CheckpointStatus,
    pub created_at: DateTime<Utc>,
}
