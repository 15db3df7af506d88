// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # CodebaseSource Entity
//!
//! The store-side container of chunks for exactly one project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodebaseSource {
    pub id: String,
    pub project_id: String,
    pub display_name: String,
    pub total_files: u64,
    pub total_chunks: u64,
    pub last_update: Option<DateTime<Utc>>,
}

impl CodebaseSource {
    pub fn new(id: impl Into<String>, project_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            display_name: display_name.into(),
            total_files: 0,
            total_chunks: 0,
            last_update: None,
        }
    }
}
