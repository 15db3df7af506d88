// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Project Entity
//!
//! A `Project` is a user-configured on-disk directory tracked by the sync
//! pipeline. It references its `CodebaseSource` only by id (see
//! `adr-001-no-back-references` in DESIGN.md) so the store, not the struct
//! graph, is the source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Manual,
    Realtime,
    Periodic,
    VcsHook,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    NeverSynced,
    Syncing,
    Synced,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub local_path: PathBuf,
    pub sync_mode: SyncMode,
    pub auto_sync_enabled: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_error: Option<String>,
    pub sync_status: SyncStatus,
    /// Id of this project's `CodebaseSource`, resolved through the store.
    /// Absent until the first sync creates the source.
    pub source_id: Option<String>,
}

impl Project {
    pub fn new(id: impl Into<String>, local_path: PathBuf, sync_mode: SyncMode) -> Self {
        Self {
            id: id.into(),
            local_path,
            sync_mode,
            auto_sync_enabled: false,
            last_sync_at: None,
            last_sync_error: None,
            sync_status: SyncStatus::NeverSynced,
            source_id: None,
        }
    }

    pub fn mark_syncing(&mut self) {
        self.sync_status = SyncStatus::Syncing;
    }

    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.sync_status = SyncStatus::Synced;
        self.last_sync_at = Some(at);
        self.last_sync_error = None;
    }

    pub fn mark_error(&mut self, at: DateTime<Utc>, error: impl Into<String>) {
        self.sync_status = SyncStatus::Error;
        self.last_sync_at = Some(at);
        self.last_sync_error = Some(error.into());
    }
}
