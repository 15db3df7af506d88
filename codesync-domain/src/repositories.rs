// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Ports
//!
//! Abstract contracts for the external collaborators named in §6 of the
//! specification: the knowledge store, the embedding provider, the
//! checkpoint store, and the analytics store. Infrastructure adapters
//! implement these traits; the domain and application layers depend only on
//! the trait.

use crate::entities::project::{Project, SyncStatus};
use crate::error::SyncError;
use crate::value_objects::checkpoint::{Checkpoint, CheckpointStatus};
use crate::value_objects::chunk::{Chunk, Embedding};
use crate::value_objects::sync_operation::SyncOperationRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A chunk projected down to the fields the diff algorithm needs, without
/// paying to deserialize the text or the embedding vector.
#[derive(Debug, Clone)]
pub struct ChunkHandle {
    pub id: String,
    pub metadata: crate::value_objects::chunk::ChunkMetadata,
}

/// The store that persists `CodebaseSource`s and their `Chunk`s.
///
/// Mirrors the shape of the Python `knowledge_store` collaborator: the core
/// never performs similarity search against it, only reconciliation.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn upsert_source(&self, project_id: &str, display_name: &str) -> Result<String, SyncError>;
    async fn delete_source(&self, source_id: &str) -> Result<(), SyncError>;

    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<(), SyncError>;
    async fn delete_chunks_by_ids(&self, ids: &[String]) -> Result<u64, SyncError>;
    async fn delete_chunks_by_file(&self, source_id: &str, file_path: &str) -> Result<u64, SyncError>;

    async fn select_chunks_by_file(&self, source_id: &str, file_path: &str) -> Result<Vec<Chunk>, SyncError>;
    async fn select_chunk_handles(&self, source_id: &str) -> Result<Vec<ChunkHandle>, SyncError>;

    async fn count_unique_files(&self, source_id: &str) -> Result<u64, SyncError>;
    async fn find_duplicate_chunk_hashes(&self, source_id: &str) -> Result<Vec<String>, SyncError>;
    async fn find_chunks_missing_embeddings(&self, source_id: &str) -> Result<Vec<String>, SyncError>;
}

/// The store of `Project` records themselves — configuration and sync-status
/// bookkeeping, distinct from the `KnowledgeStore`'s chunk/source data.
/// Mirrors the Python `project_service` collaborator the sync engine calls
/// to read project metadata and persist status transitions.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get(&self, project_id: &str) -> Result<Project, SyncError>;

    /// Inserts the project if `project.id` is new, otherwise replaces its
    /// `local_path`, `sync_mode`, and `auto_sync_enabled` fields — the
    /// subset the `PUT .../sync/config` trigger endpoint is allowed to
    /// change. Sync-status bookkeeping fields are left untouched on update.
    async fn upsert_project(&self, project: &Project) -> Result<(), SyncError>;

    async fn set_source_id(&self, project_id: &str, source_id: &str) -> Result<(), SyncError>;

    async fn update_sync_status(
        &self,
        project_id: &str,
        status: SyncStatus,
        at: DateTime<Utc>,
        error: Option<&str>,
    ) -> Result<(), SyncError>;

    async fn list_auto_sync_enabled(&self) -> Result<Vec<Project>, SyncError>;
}

/// One operation: embed a batch of texts in input order. A failed item in an
/// otherwise-successful batch call is represented as `None` at that index.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Option<Embedding>>, SyncError>;

    /// Per-request token budget, used by the `TokenAwareBatcher`.
    fn max_tokens_per_request(&self) -> usize;
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn create(&self, checkpoint: &Checkpoint) -> Result<(), SyncError>;
    async fn update_status(&self, id: &str, status: CheckpointStatus) -> Result<(), SyncError>;
    async fn active_for_project(&self, project_id: &str) -> Result<Option<Checkpoint>, SyncError>;
    async fn all_active(&self) -> Result<Vec<Checkpoint>, SyncError>;
}

#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn record(&self, op: &SyncOperationRecord) -> Result<(), SyncError>;
}

/// Injected clock so the engine and its tests share one notion of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> chrono::DateTime<chrono::Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now()
    }
}
