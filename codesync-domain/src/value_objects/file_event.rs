// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # FileEvent Value Object

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileEventKind {
    Created,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEvent {
    pub kind: FileEventKind,
    pub project_id: String,
    pub file_path: PathBuf,
    pub timestamp: DateTime<Utc>,
}

impl FileEvent {
    pub fn new(kind: FileEventKind, project_id: impl Into<String>, file_path: PathBuf, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            project_id: project_id.into(),
            file_path,
            timestamp,
        }
    }
}
