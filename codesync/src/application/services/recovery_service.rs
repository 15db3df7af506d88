// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Recovery Service
//!
//! Checkpoint-based resume after a crash, a read-only integrity audit, orphan
//! cleanup, and checkpoint rollback. Sits alongside [`SyncEngine`](super::sync_engine::SyncEngine)
//! rather than inside it: the engine produces checkpoints' raw ingredients,
//! this service persists and acts on them.

use codesync_domain::{Checkpoint, CheckpointStatus, CheckpointStore, KnowledgeStore, ProjectStore, SyncError};
use futures::future::try_join3;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::sync_engine::SyncEngine;

const DELETE_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct IntegrityCheckResult {
    pub valid: bool,
    pub issues: Vec<String>,
    pub orphaned_chunks: Vec<String>,
    pub duplicate_chunks: Vec<String>,
    pub missing_embeddings: Vec<String>,
}

pub struct RecoveryService {
    knowledge_store: Arc<dyn KnowledgeStore>,
    project_store: Arc<dyn ProjectStore>,
    checkpoint_store: Arc<dyn CheckpointStore>,
    sync_engine: Arc<SyncEngine>,
}

impl RecoveryService {
    pub fn new(
        knowledge_store: Arc<dyn KnowledgeStore>,
        project_store: Arc<dyn ProjectStore>,
        checkpoint_store: Arc<dyn CheckpointStore>,
        sync_engine: Arc<SyncEngine>,
    ) -> Self {
        Self { knowledge_store, project_store, checkpoint_store, sync_engine }
    }

    pub async fn create_checkpoint(
        &self,
        project_id: &str,
        sync_job_id: &str,
        files_processed: Vec<String>,
        files_remaining: Vec<String>,
        chunks_created: Vec<String>,
    ) -> Result<String, SyncError> {
        let checkpoint = Checkpoint {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            sync_job_id: sync_job_id.to_string(),
            files_processed: files_processed.clone(),
            files_remaining: files_remaining.clone(),
            chunks_created,
            status: CheckpointStatus::Active,
            created_at: chrono::Utc::now(),
        };
        self.checkpoint_store.create(&checkpoint).await?;
        info!(
            checkpoint_id = checkpoint.id,
            project_id,
            processed = files_processed.len(),
            remaining = files_remaining.len(),
            "checkpoint created"
        );
        Ok(checkpoint.id)
    }

    /// Resumes every project with an `active` checkpoint. Called once on
    /// worker start.
    pub async fn resume_all(&self) -> Result<usize, SyncError> {
        let checkpoints = self.checkpoint_store.all_active().await?;
        let mut resumed = 0;
        for checkpoint in checkpoints {
            if self.resume_checkpoint(&checkpoint).await {
                resumed += 1;
            }
        }
        Ok(resumed)
    }

    async fn resume_checkpoint(&self, checkpoint: &Checkpoint) -> bool {
        if checkpoint.files_remaining.is_empty() {
            info!(checkpoint_id = checkpoint.id, "no files remaining, marking complete");
            let _ = self.checkpoint_store.update_status(&checkpoint.id, CheckpointStatus::Completed).await;
            return true;
        }

        info!(
            checkpoint_id = checkpoint.id,
            project_id = checkpoint.project_id,
            remaining = checkpoint.files_remaining.len(),
            "resuming sync from checkpoint"
        );

        match self.sync_engine.sync_project(&checkpoint.project_id, Some(checkpoint.files_remaining.clone())).await {
            Ok(stats) => {
                let _ = self.checkpoint_store.update_status(&checkpoint.id, CheckpointStatus::Completed).await;
                info!(
                    checkpoint_id = checkpoint.id,
                    files_processed = stats.files_processed,
                    chunks_added = stats.chunks_added,
                    "resumed sync completed"
                );
                true
            }
            Err(err) => {
                error!(checkpoint_id = checkpoint.id, %err, "failed to resume sync from checkpoint");
                false
            }
        }
    }

    /// Read-only: orphaned chunks, duplicate hashes, and missing embeddings
    /// are all found in parallel.
    pub async fn verify_integrity(&self, project_id: &str) -> Result<IntegrityCheckResult, SyncError> {
        let project = self.project_store.get(project_id).await?;
        let Some(source_id) = project.source_id.clone() else {
            return Ok(IntegrityCheckResult {
                valid: false,
                issues: vec!["project has no codebase source".to_string()],
                orphaned_chunks: Vec::new(),
                duplicate_chunks: Vec::new(),
                missing_embeddings: Vec::new(),
            });
        };

        let (orphaned, duplicates, missing) = try_join3(
            self.find_orphaned_chunks(&project.local_path, &source_id),
            self.knowledge_store.find_duplicate_chunk_hashes(&source_id),
            self.knowledge_store.find_chunks_missing_embeddings(&source_id),
        )
        .await?;

        let mut issues = Vec::new();
        if !orphaned.is_empty() {
            issues.push(format!("found {} orphaned chunks", orphaned.len()));
        }
        if !duplicates.is_empty() {
            issues.push(format!("found {} duplicate chunk hashes", duplicates.len()));
        }
        if !missing.is_empty() {
            issues.push(format!("found {} chunks with missing embeddings", missing.len()));
        }
        let valid = issues.is_empty();

        if valid {
            info!(project_id, "integrity check passed");
        } else {
            warn!(project_id, ?issues, "integrity check found issues");
        }

        Ok(IntegrityCheckResult { valid, issues, orphaned_chunks: orphaned, duplicate_chunks: duplicates, missing_embeddings: missing })
    }

    async fn find_orphaned_chunks(&self, local_path: &std::path::Path, source_id: &str) -> Result<Vec<String>, SyncError> {
        let handles = self.knowledge_store.select_chunk_handles(source_id).await?;
        Ok(handles
            .into_iter()
            .filter(|h| {
                let path = local_path.join(&h.metadata.relative_path);
                !path.exists()
            })
            .map(|h| h.id)
            .collect())
    }

    /// Deletes orphaned chunks for a project's source, in batches. Returns
    /// the number deleted.
    pub async fn cleanup_orphaned_chunks(&self, project_id: &str) -> Result<u64, SyncError> {
        let project = self.project_store.get(project_id).await?;
        let Some(source_id) = project.source_id.clone() else {
            warn!(project_id, "cleanup skipped: project has no codebase source");
            return Ok(0);
        };

        let orphaned = self.find_orphaned_chunks(&project.local_path, &source_id).await?;
        let deleted = self.delete_in_batches(&orphaned).await?;
        if deleted > 0 {
            info!(project_id, deleted, "cleaned up orphaned chunks");
        }
        Ok(deleted)
    }

    /// Deletes every chunk the checkpoint created and marks it rolled back.
    pub async fn rollback(&self, checkpoint_id: &str, chunks_created: &[String]) -> Result<(), SyncError> {
        let deleted = self.delete_in_batches(chunks_created).await?;
        self.checkpoint_store.update_status(checkpoint_id, CheckpointStatus::RolledBack).await?;
        info!(checkpoint_id, deleted, "rolled back checkpoint");
        Ok(())
    }

    async fn delete_in_batches(&self, chunk_ids: &[String]) -> Result<u64, SyncError> {
        let mut deleted = 0;
        for batch in chunk_ids.chunks(DELETE_BATCH_SIZE) {
            deleted += self.knowledge_store.delete_chunks_by_ids(batch).await?;
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::batch_embedder::{BatchEmbedder, BatchEmbedderConfig};
    use crate::application::services::sync_engine::SyncEngineConfig;
    use codesync_domain::{
        Chunk, ChunkHandle, ChunkMetadata, Clock, Embedding, Project, SyncMode, SyncStatus, SystemClock,
    };
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::path::PathBuf;

    struct FakeEmbedder;
    #[async_trait::async_trait]
    impl codesync_domain::EmbeddingProvider for FakeEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Option<Embedding>>, SyncError> {
            Ok(texts.iter().map(|_| Some(vec![0.0_f32])).collect())
        }
        fn max_tokens_per_request(&self) -> usize {
            1000
        }
    }

    #[derive(Default)]
    struct FakeStore {
        chunks: Mutex<Vec<Chunk>>,
    }

    #[async_trait::async_trait]
    impl KnowledgeStore for FakeStore {
        async fn upsert_source(&self, _project_id: &str, _display_name: &str) -> Result<String, SyncError> {
            Ok("source-1".to_string())
        }
        async fn delete_source(&self, _source_id: &str) -> Result<(), SyncError> {
            Ok(())
        }
        async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<(), SyncError> {
            self.chunks.lock().extend_from_slice(chunks);
            Ok(())
        }
        async fn delete_chunks_by_ids(&self, ids: &[String]) -> Result<u64, SyncError> {
            let mut chunks = self.chunks.lock();
            let before = chunks.len();
            chunks.retain(|c| !ids.contains(&c.id.to_string()));
            Ok((before - chunks.len()) as u64)
        }
        async fn delete_chunks_by_file(&self, _source_id: &str, _file_path: &str) -> Result<u64, SyncError> {
            Ok(0)
        }
        async fn select_chunks_by_file(&self, _source_id: &str, _file_path: &str) -> Result<Vec<Chunk>, SyncError> {
            Ok(Vec::new())
        }
        async fn select_chunk_handles(&self, source_id: &str) -> Result<Vec<ChunkHandle>, SyncError> {
            Ok(self
                .chunks
                .lock()
                .iter()
                .filter(|c| c.source_id == source_id)
                .map(|c| ChunkHandle { id: c.id.to_string(), metadata: c.metadata.clone() })
                .collect())
        }
        async fn count_unique_files(&self, _source_id: &str) -> Result<u64, SyncError> {
            Ok(0)
        }
        async fn find_duplicate_chunk_hashes(&self, _source_id: &str) -> Result<Vec<String>, SyncError> {
            Ok(Vec::new())
        }
        async fn find_chunks_missing_embeddings(&self, _source_id: &str) -> Result<Vec<String>, SyncError> {
            Ok(Vec::new())
        }
    }

    struct FakeProjectStore {
        project: Mutex<Project>,
    }

    #[async_trait::async_trait]
    impl ProjectStore for FakeProjectStore {
        async fn get(&self, _project_id: &str) -> Result<Project, SyncError> {
            Ok(self.project.lock().clone())
        }
        async fn upsert_project(&self, project: &Project) -> Result<(), SyncError> {
            *self.project.lock() = project.clone();
            Ok(())
        }
        async fn set_source_id(&self, _project_id: &str, source_id: &str) -> Result<(), SyncError> {
            self.project.lock().source_id = Some(source_id.to_string());
            Ok(())
        }
        async fn update_sync_status(
            &self,
            _project_id: &str,
            status: SyncStatus,
            at: chrono::DateTime<chrono::Utc>,
            _error: Option<&str>,
        ) -> Result<(), SyncError> {
            let mut project = self.project.lock();
            project.sync_status = status;
            project.last_sync_at = Some(at);
            Ok(())
        }
        async fn list_auto_sync_enabled(&self) -> Result<Vec<Project>, SyncError> {
            Ok(vec![self.project.lock().clone()])
        }
    }

    #[derive(Default)]
    struct FakeCheckpointStore {
        checkpoints: Mutex<HashMap<String, Checkpoint>>,
    }

    #[async_trait::async_trait]
    impl CheckpointStore for FakeCheckpointStore {
        async fn create(&self, checkpoint: &Checkpoint) -> Result<(), SyncError> {
            self.checkpoints.lock().insert(checkpoint.id.clone(), checkpoint.clone());
            Ok(())
        }
        async fn update_status(&self, id: &str, status: CheckpointStatus) -> Result<(), SyncError> {
            if let Some(checkpoint) = self.checkpoints.lock().get_mut(id) {
                checkpoint.status = status;
            }
            Ok(())
        }
        async fn active_for_project(&self, project_id: &str) -> Result<Option<Checkpoint>, SyncError> {
            Ok(self
                .checkpoints
                .lock()
                .values()
                .find(|c| c.project_id == project_id && c.status == CheckpointStatus::Active)
                .cloned())
        }
        async fn all_active(&self) -> Result<Vec<Checkpoint>, SyncError> {
            Ok(self.checkpoints.lock().values().filter(|c| c.status == CheckpointStatus::Active).cloned().collect())
        }
    }

    fn test_service(
        local_path: PathBuf,
    ) -> (RecoveryService, Arc<FakeStore>, Arc<FakeProjectStore>, Arc<FakeCheckpointStore>) {
        let knowledge_store = Arc::new(FakeStore::default());
        let project_store = Arc::new(FakeProjectStore {
            project: Mutex::new(Project {
                source_id: Some("source-1".to_string()),
                ..Project::new("p1", local_path, SyncMode::Manual)
            }),
        });
        let checkpoint_store = Arc::new(FakeCheckpointStore::default());
        let rate_limiter = crate::infrastructure::runtime::rate_limiter::RateLimiter::new(Default::default());
        let embedder = Arc::new(BatchEmbedder::new(Arc::new(FakeEmbedder), rate_limiter, BatchEmbedderConfig::default()));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let engine = Arc::new(SyncEngine::new(
            knowledge_store.clone() as Arc<dyn KnowledgeStore>,
            project_store.clone() as Arc<dyn ProjectStore>,
            embedder,
            clock,
            SyncEngineConfig::default(),
        ));
        let service = RecoveryService::new(
            knowledge_store.clone() as Arc<dyn KnowledgeStore>,
            project_store.clone() as Arc<dyn ProjectStore>,
            checkpoint_store.clone() as Arc<dyn CheckpointStore>,
            engine,
        );
        (service, knowledge_store, project_store, checkpoint_store)
    }

    fn chunk(source_id: &str, relative_path: &str) -> Chunk {
        Chunk::new(
            source_id,
            "text",
            ChunkMetadata {
                file_path: relative_path.to_string(),
                relative_path: relative_path.to_string(),
                file_hash: "h".to_string(),
                chunk_hash: "c".to_string(),
                language: "rust".to_string(),
                chunk_index: 0,
                start_line: 1,
                end_line: 1,
                section_type: None,
                section_name: None,
            },
        )
        .with_embedding(vec![0.0])
    }

    #[tokio::test]
    async fn verify_integrity_flags_chunks_whose_file_was_deleted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("kept.rs"), "fn main() {}").unwrap();
        let (service, store, _projects, _checkpoints) = test_service(dir.path().to_path_buf());

        store.chunks.lock().push(chunk("source-1", "kept.rs"));
        store.chunks.lock().push(chunk("source-1", "gone.rs"));

        let result = service.verify_integrity("p1").await.unwrap();
        assert!(!result.valid);
        assert_eq!(result.orphaned_chunks.len(), 1);
    }

    #[tokio::test]
    async fn cleanup_orphaned_chunks_deletes_only_the_orphans() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("kept.rs"), "fn main() {}").unwrap();
        let (service, store, _projects, _checkpoints) = test_service(dir.path().to_path_buf());

        store.chunks.lock().push(chunk("source-1", "kept.rs"));
        store.chunks.lock().push(chunk("source-1", "gone.rs"));

        let deleted = service.cleanup_orphaned_chunks("p1").await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.chunks.lock().len(), 1);
        assert_eq!(store.chunks.lock()[0].metadata.relative_path, "kept.rs");
    }

    #[tokio::test]
    async fn rollback_deletes_checkpoint_chunks_and_marks_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let (service, store, _projects, checkpoints) = test_service(dir.path().to_path_buf());

        let a = chunk("source-1", "a.rs");
        let b = chunk("source-1", "b.rs");
        let ids = vec![a.id.to_string(), b.id.to_string()];
        store.chunks.lock().push(a);
        store.chunks.lock().push(b);

        let checkpoint_id =
            service.create_checkpoint("p1", "job-1", vec!["a.rs".to_string()], Vec::new(), ids.clone()).await.unwrap();

        service.rollback(&checkpoint_id, &ids).await.unwrap();

        assert!(store.chunks.lock().is_empty());
        let stored = checkpoints.checkpoints.lock().get(&checkpoint_id).cloned().unwrap();
        assert_eq!(stored.status, CheckpointStatus::RolledBack);
    }

    #[tokio::test]
    async fn resume_all_marks_an_empty_remaining_checkpoint_complete_without_calling_the_engine() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _store, _projects, checkpoints) = test_service(dir.path().to_path_buf());

        let checkpoint_id =
            service.create_checkpoint("p1", "job-1", vec!["a.rs".to_string()], Vec::new(), Vec::new()).await.unwrap();

        let resumed = service.resume_all().await.unwrap();
        assert_eq!(resumed, 1);
        let stored = checkpoints.checkpoints.lock().get(&checkpoint_id).cloned().unwrap();
        assert_eq!(stored.status, CheckpointStatus::Completed);
    }
}
