// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Store Adapter
//!
//! A single `SqlitePool`-backed adapter implementing every store port
//! (`KnowledgeStore`, `ProjectStore`, `CheckpointStore`, `AnalyticsStore`),
//! using parameterized queries, a shared pool, and a `sqlx::migrate!`-driven
//! schema. Built directly against this domain's concrete record shapes
//! rather than a generic JSON-blob entity, since each store here has a
//! fixed, well-known column set.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use codesync_domain::{
    AnalyticsStore, Checkpoint, CheckpointStatus, CheckpointStore, Chunk, ChunkHandle, ChunkMetadata, KnowledgeStore,
    Project, ProjectStore, SyncError, SyncMode, SyncOperationRecord, SyncOperationStatus, SyncStatus, SyncTrigger,
};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use crate::infrastructure::sync::error_classifier::classify_sqlx_error;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, SyncError> {
        let pool = SqlitePool::connect(database_url).await.map_err(classify_sqlx_error)?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self, SyncError> {
        Self::connect("sqlite::memory:").await
    }

    async fn migrate(&self) -> Result<(), SyncError> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| SyncError::Database(e.to_string()))
    }
}

fn parse_sync_mode(value: &str) -> SyncMode {
    match value {
        "realtime" => SyncMode::Realtime,
        "periodic" => SyncMode::Periodic,
        "vcs_hook" => SyncMode::VcsHook,
        _ => SyncMode::Manual,
    }
}

fn sync_mode_str(mode: SyncMode) -> &'static str {
    match mode {
        SyncMode::Manual => "manual",
        SyncMode::Realtime => "realtime",
        SyncMode::Periodic => "periodic",
        SyncMode::VcsHook => "vcs_hook",
    }
}

fn parse_sync_status(value: &str) -> SyncStatus {
    match value {
        "syncing" => SyncStatus::Syncing,
        "synced" => SyncStatus::Synced,
        "error" => SyncStatus::Error,
        _ => SyncStatus::NeverSynced,
    }
}

fn sync_status_str(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::NeverSynced => "never_synced",
        SyncStatus::Syncing => "syncing",
        SyncStatus::Synced => "synced",
        SyncStatus::Error => "error",
    }
}

fn checkpoint_status_str(status: CheckpointStatus) -> &'static str {
    match status {
        CheckpointStatus::Active => "active",
        CheckpointStatus::Completed => "completed",
        CheckpointStatus::Failed => "failed",
        CheckpointStatus::RolledBack => "rolled_back",
    }
}

fn parse_checkpoint_status(value: &str) -> CheckpointStatus {
    match value {
        "completed" => CheckpointStatus::Completed,
        "failed" => CheckpointStatus::Failed,
        "rolled_back" => CheckpointStatus::RolledBack,
        _ => CheckpointStatus::Active,
    }
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn upsert_source(&self, project_id: &str, display_name: &str) -> Result<String, SyncError> {
        if let Some(row) = sqlx::query("SELECT id FROM codebase_sources WHERE project_id = ?")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify_sqlx_error)?
        {
            return Ok(row.get::<String, _>("id"));
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO codebase_sources (id, project_id, display_name, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(project_id)
            .bind(display_name)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(id)
    }

    async fn delete_source(&self, source_id: &str) -> Result<(), SyncError> {
        sqlx::query("DELETE FROM knowledge_chunks WHERE source_id = ?")
            .bind(source_id)
            .execute(&self.pool)
            .await
            .map_err(classify_sqlx_error)?;
        sqlx::query("DELETE FROM codebase_sources WHERE id = ?")
            .bind(source_id)
            .execute(&self.pool)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(())
    }

    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<(), SyncError> {
        let mut tx = self.pool.begin().await.map_err(classify_sqlx_error)?;
        for chunk in chunks {
            let embedding = chunk.embedding.as_ref().map(|e| serde_json::to_string(e).unwrap_or_default());
            sqlx::query(
                "INSERT INTO knowledge_chunks
                 (id, source_id, text, embedding, file_path, relative_path, file_hash, chunk_hash, language,
                  chunk_index, start_line, end_line, section_type, section_name)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(chunk.id.to_string())
            .bind(&chunk.source_id)
            .bind(&chunk.text)
            .bind(embedding)
            .bind(&chunk.metadata.file_path)
            .bind(&chunk.metadata.relative_path)
            .bind(&chunk.metadata.file_hash)
            .bind(&chunk.metadata.chunk_hash)
            .bind(&chunk.metadata.language)
            .bind(chunk.metadata.chunk_index as i64)
            .bind(chunk.metadata.start_line as i64)
            .bind(chunk.metadata.end_line as i64)
            .bind(&chunk.metadata.section_type)
            .bind(&chunk.metadata.section_name)
            .execute(&mut *tx)
            .await
            .map_err(classify_sqlx_error)?;
        }
        tx.commit().await.map_err(classify_sqlx_error)?;
        Ok(())
    }

    async fn delete_chunks_by_ids(&self, ids: &[String]) -> Result<u64, SyncError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = std::iter::repeat_n("?", ids.len()).collect::<Vec<_>>().join(", ");
        let query = format!("DELETE FROM knowledge_chunks WHERE id IN ({placeholders})");
        let mut q = sqlx::query(&query);
        for id in ids {
            q = q.bind(id);
        }
        let result = q.execute(&self.pool).await.map_err(classify_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn delete_chunks_by_file(&self, source_id: &str, file_path: &str) -> Result<u64, SyncError> {
        let result = sqlx::query("DELETE FROM knowledge_chunks WHERE source_id = ? AND file_path = ?")
            .bind(source_id)
            .bind(file_path)
            .execute(&self.pool)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn select_chunks_by_file(&self, source_id: &str, file_path: &str) -> Result<Vec<Chunk>, SyncError> {
        let rows = sqlx::query(
            "SELECT id, source_id, text, embedding, file_path, relative_path, file_hash, chunk_hash, language,
                    chunk_index, start_line, end_line, section_type, section_name
             FROM knowledge_chunks WHERE source_id = ? AND file_path = ?",
        )
        .bind(source_id)
        .bind(file_path)
        .fetch_all(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;
        rows.into_iter().map(row_to_chunk).collect()
    }

    async fn select_chunk_handles(&self, source_id: &str) -> Result<Vec<ChunkHandle>, SyncError> {
        let rows = sqlx::query(
            "SELECT id, file_path, relative_path, file_hash, chunk_hash, language, chunk_index, start_line,
                    end_line, section_type, section_name
             FROM knowledge_chunks WHERE source_id = ?",
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| ChunkHandle {
                id: row.get("id"),
                metadata: ChunkMetadata {
                    file_path: row.get("file_path"),
                    relative_path: row.get("relative_path"),
                    file_hash: row.get("file_hash"),
                    chunk_hash: row.get("chunk_hash"),
                    language: row.get("language"),
                    chunk_index: row.get::<i64, _>("chunk_index") as usize,
                    start_line: row.get::<i64, _>("start_line") as usize,
                    end_line: row.get::<i64, _>("end_line") as usize,
                    section_type: row.get("section_type"),
                    section_name: row.get("section_name"),
                },
            })
            .collect())
    }

    async fn count_unique_files(&self, source_id: &str) -> Result<u64, SyncError> {
        let row = sqlx::query("SELECT COUNT(DISTINCT file_path) AS n FROM knowledge_chunks WHERE source_id = ?")
            .bind(source_id)
            .fetch_one(&self.pool)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(row.get::<i64, _>("n") as u64)
    }

    async fn find_duplicate_chunk_hashes(&self, source_id: &str) -> Result<Vec<String>, SyncError> {
        let rows = sqlx::query(
            "SELECT chunk_hash FROM knowledge_chunks WHERE source_id = ?
             GROUP BY chunk_hash HAVING COUNT(*) > 1",
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;
        Ok(rows.into_iter().map(|row| row.get("chunk_hash")).collect())
    }

    async fn find_chunks_missing_embeddings(&self, source_id: &str) -> Result<Vec<String>, SyncError> {
        let rows = sqlx::query("SELECT id FROM knowledge_chunks WHERE source_id = ? AND embedding IS NULL")
            .bind(source_id)
            .fetch_all(&self.pool)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(rows.into_iter().map(|row| row.get("id")).collect())
    }
}

fn row_to_chunk(row: sqlx::sqlite::SqliteRow) -> Result<Chunk, SyncError> {
    let id: String = row.get("id");
    let embedding: Option<String> = row.get("embedding");
    let embedding = embedding.map(|raw| serde_json::from_str(&raw)).transpose().map_err(|e| {
        SyncError::Database(format!("failed to deserialize embedding: {e}"))
    })?;

    Ok(Chunk {
        id: Uuid::from_str(&id).map_err(|e| SyncError::Database(format!("malformed chunk id: {e}")))?,
        source_id: row.get("source_id"),
        text: row.get("text"),
        embedding,
        metadata: ChunkMetadata {
            file_path: row.get("file_path"),
            relative_path: row.get("relative_path"),
            file_hash: row.get("file_hash"),
            chunk_hash: row.get("chunk_hash"),
            language: row.get("language"),
            chunk_index: row.get::<i64, _>("chunk_index") as usize,
            start_line: row.get::<i64, _>("start_line") as usize,
            end_line: row.get::<i64, _>("end_line") as usize,
            section_type: row.get("section_type"),
            section_name: row.get("section_name"),
        },
    })
}

#[async_trait]
impl ProjectStore for SqliteStore {
    async fn get(&self, project_id: &str) -> Result<Project, SyncError> {
        let row = sqlx::query(
            "SELECT id, local_path, sync_mode, auto_sync_enabled, last_sync_at, last_sync_error, sync_status, source_id
             FROM projects WHERE id = ?",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_sqlx_error)?
        .ok_or_else(|| SyncError::ProjectNotFound(project_id.to_string()))?;

        let last_sync_at: Option<String> = row.get("last_sync_at");
        Ok(Project {
            id: row.get("id"),
            local_path: std::path::PathBuf::from(row.get::<String, _>("local_path")),
            sync_mode: parse_sync_mode(&row.get::<String, _>("sync_mode")),
            auto_sync_enabled: row.get::<i64, _>("auto_sync_enabled") != 0,
            last_sync_at: last_sync_at.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|dt| dt.with_timezone(&Utc)),
            last_sync_error: row.get("last_sync_error"),
            sync_status: parse_sync_status(&row.get::<String, _>("sync_status")),
            source_id: row.get("source_id"),
        })
    }

    async fn upsert_project(&self, project: &Project) -> Result<(), SyncError> {
        let existing = sqlx::query("SELECT id FROM projects WHERE id = ?")
            .bind(&project.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify_sqlx_error)?;

        if existing.is_some() {
            sqlx::query("UPDATE projects SET local_path = ?, sync_mode = ?, auto_sync_enabled = ? WHERE id = ?")
                .bind(project.local_path.to_string_lossy().to_string())
                .bind(sync_mode_str(project.sync_mode))
                .bind(project.auto_sync_enabled as i64)
                .bind(&project.id)
                .execute(&self.pool)
                .await
                .map_err(classify_sqlx_error)?;
        } else {
            sqlx::query(
                "INSERT INTO projects (id, local_path, sync_mode, auto_sync_enabled, sync_status)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&project.id)
            .bind(project.local_path.to_string_lossy().to_string())
            .bind(sync_mode_str(project.sync_mode))
            .bind(project.auto_sync_enabled as i64)
            .bind(sync_status_str(project.sync_status))
            .execute(&self.pool)
            .await
            .map_err(classify_sqlx_error)?;
        }

        Ok(())
    }

    async fn set_source_id(&self, project_id: &str, source_id: &str) -> Result<(), SyncError> {
        sqlx::query("UPDATE projects SET source_id = ? WHERE id = ?")
            .bind(source_id)
            .bind(project_id)
            .execute(&self.pool)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(())
    }

    async fn update_sync_status(
        &self,
        project_id: &str,
        status: SyncStatus,
        at: DateTime<Utc>,
        error: Option<&str>,
    ) -> Result<(), SyncError> {
        sqlx::query("UPDATE projects SET sync_status = ?, last_sync_at = ?, last_sync_error = ? WHERE id = ?")
            .bind(sync_status_str(status))
            .bind(at.to_rfc3339())
            .bind(error)
            .bind(project_id)
            .execute(&self.pool)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(())
    }

    async fn list_auto_sync_enabled(&self) -> Result<Vec<Project>, SyncError> {
        let rows = sqlx::query(
            "SELECT id, local_path, sync_mode, auto_sync_enabled, last_sync_at, last_sync_error, sync_status, source_id
             FROM projects WHERE auto_sync_enabled = 1",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                let last_sync_at: Option<String> = row.get("last_sync_at");
                Ok(Project {
                    id: row.get("id"),
                    local_path: std::path::PathBuf::from(row.get::<String, _>("local_path")),
                    sync_mode: parse_sync_mode(&row.get::<String, _>("sync_mode")),
                    auto_sync_enabled: true,
                    last_sync_at: last_sync_at
                        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                        .map(|dt| dt.with_timezone(&Utc)),
                    last_sync_error: row.get("last_sync_error"),
                    sync_status: parse_sync_status(&row.get::<String, _>("sync_status")),
                    source_id: row.get("source_id"),
                })
            })
            .collect()
    }
}

#[async_trait]
impl CheckpointStore for SqliteStore {
    async fn create(&self, checkpoint: &Checkpoint) -> Result<(), SyncError> {
        sqlx::query(
            "INSERT INTO sync_checkpoints
             (id, project_id, sync_job_id, files_processed, files_remaining, chunks_created, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&checkpoint.id)
        .bind(&checkpoint.project_id)
        .bind(&checkpoint.sync_job_id)
        .bind(serde_json::to_string(&checkpoint.files_processed).unwrap_or_default())
        .bind(serde_json::to_string(&checkpoint.files_remaining).unwrap_or_default())
        .bind(serde_json::to_string(&checkpoint.chunks_created).unwrap_or_default())
        .bind(checkpoint_status_str(checkpoint.status))
        .bind(checkpoint.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;
        Ok(())
    }

    async fn update_status(&self, id: &str, status: CheckpointStatus) -> Result<(), SyncError> {
        sqlx::query("UPDATE sync_checkpoints SET status = ? WHERE id = ?")
            .bind(checkpoint_status_str(status))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(())
    }

    async fn active_for_project(&self, project_id: &str) -> Result<Option<Checkpoint>, SyncError> {
        let row = sqlx::query(
            "SELECT id, project_id, sync_job_id, files_processed, files_remaining, chunks_created, status, created_at
             FROM sync_checkpoints WHERE project_id = ? AND status = 'active'
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;
        row.map(row_to_checkpoint).transpose()
    }

    async fn all_active(&self) -> Result<Vec<Checkpoint>, SyncError> {
        let rows = sqlx::query(
            "SELECT id, project_id, sync_job_id, files_processed, files_remaining, chunks_created, status, created_at
             FROM sync_checkpoints WHERE status = 'active'",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;
        rows.into_iter().map(row_to_checkpoint).collect()
    }
}

fn row_to_checkpoint(row: sqlx::sqlite::SqliteRow) -> Result<Checkpoint, SyncError> {
    let created_at: String = row.get("created_at");
    let parse_list = |raw: String| -> Vec<String> { serde_json::from_str(&raw).unwrap_or_default() };
    Ok(Checkpoint {
        id: row.get("id"),
        project_id: row.get("project_id"),
        sync_job_id: row.get("sync_job_id"),
        files_processed: parse_list(row.get("files_processed")),
        files_remaining: parse_list(row.get("files_remaining")),
        chunks_created: parse_list(row.get("chunks_created")),
        status: parse_checkpoint_status(&row.get::<String, _>("status")),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| SyncError::Database(format!("malformed checkpoint timestamp: {e}")))?
            .with_timezone(&Utc),
    })
}

#[async_trait]
impl AnalyticsStore for SqliteStore {
    async fn record(&self, op: &SyncOperationRecord) -> Result<(), SyncError> {
        let trigger = match op.trigger {
            SyncTrigger::Manual => "manual",
            SyncTrigger::GitHook => "git_hook",
            SyncTrigger::Scheduled => "scheduled",
            SyncTrigger::Realtime => "realtime",
        };
        let status = match op.status {
            SyncOperationStatus::Running => "running",
            SyncOperationStatus::Completed => "completed",
            SyncOperationStatus::Error => "error",
        };
        sqlx::query(
            "INSERT INTO sync_operations
             (id, project_id, trigger, started_at, completed_at, status, files_processed, chunks_added,
              chunks_modified, chunks_deleted, duration_seconds, error_message)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&op.id)
        .bind(&op.project_id)
        .bind(trigger)
        .bind(op.started_at.to_rfc3339())
        .bind(op.completed_at.map(|dt| dt.to_rfc3339()))
        .bind(status)
        .bind(op.files_processed as i64)
        .bind(op.chunks_added as i64)
        .bind(op.chunks_modified as i64)
        .bind(op.chunks_deleted as i64)
        .bind(op.duration_seconds)
        .bind(&op.error_message)
        .execute(&self.pool)
        .await
        .map_err(classify_sqlx_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_project(store: &SqliteStore, id: &str, local_path: &str) {
        sqlx::query(
            "INSERT INTO projects (id, local_path, sync_mode, auto_sync_enabled, sync_status) VALUES (?, ?, 'manual', 1, 'never_synced')",
        )
        .bind(id)
        .bind(local_path)
        .execute(&store.pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn upsert_source_is_idempotent_per_project() {
        let store = SqliteStore::in_memory().await.unwrap();
        let a = store.upsert_source("p1", "proj-1").await.unwrap();
        let b = store.upsert_source("p1", "proj-1").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn insert_and_select_chunk_handles_round_trips_metadata() {
        let store = SqliteStore::in_memory().await.unwrap();
        let source_id = store.upsert_source("p1", "proj-1").await.unwrap();
        let chunk = Chunk::new(
            &source_id,
            "fn main() {}",
            ChunkMetadata {
                file_path: "/repo/main.rs".to_string(),
                relative_path: "main.rs".to_string(),
                file_hash: "filehash".to_string(),
                chunk_hash: "chunkhash".to_string(),
                language: "rust".to_string(),
                chunk_index: 0,
                start_line: 1,
                end_line: 1,
                section_type: None,
                section_name: None,
            },
        )
        .with_embedding(vec![0.1, 0.2]);

        store.insert_chunks(std::slice::from_ref(&chunk)).await.unwrap();

        let handles = store.select_chunk_handles(&source_id).await.unwrap();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].metadata.relative_path, "main.rs");

        let missing = store.find_chunks_missing_embeddings(&source_id).await.unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn delete_chunks_by_file_removes_only_that_files_chunks() {
        let store = SqliteStore::in_memory().await.unwrap();
        let source_id = store.upsert_source("p1", "proj-1").await.unwrap();
        let make = |path: &str| {
            Chunk::new(
                &source_id,
                "text",
                ChunkMetadata {
                    file_path: path.to_string(),
                    relative_path: path.to_string(),
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
        };
        store.insert_chunks(&[make("a.rs"), make("b.rs")]).await.unwrap();

        let deleted = store.delete_chunks_by_file(&source_id, "a.rs").await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count_unique_files(&source_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn project_store_round_trips_status_updates() {
        let store = SqliteStore::in_memory().await.unwrap();
        seed_project(&store, "p1", "/repo").await;

        store.update_sync_status("p1", SyncStatus::Synced, Utc::now(), None).await.unwrap();
        let project = store.get("p1").await.unwrap();
        assert_eq!(project.sync_status, SyncStatus::Synced);
        assert!(project.last_sync_at.is_some());

        let auto = store.list_auto_sync_enabled().await.unwrap();
        assert_eq!(auto.len(), 1);
    }

    #[tokio::test]
    async fn upsert_project_inserts_then_updates_config_fields() {
        let store = SqliteStore::in_memory().await.unwrap();

        let project = Project::new("p1", std::path::PathBuf::from("/repo"), SyncMode::Manual);
        store.upsert_project(&project).await.unwrap();
        let fetched = store.get("p1").await.unwrap();
        assert_eq!(fetched.local_path, std::path::PathBuf::from("/repo"));
        assert_eq!(fetched.sync_mode, SyncMode::Manual);
        assert!(!fetched.auto_sync_enabled);

        let mut updated = fetched.clone();
        updated.local_path = std::path::PathBuf::from("/repo2");
        updated.sync_mode = SyncMode::Realtime;
        updated.auto_sync_enabled = true;
        store.upsert_project(&updated).await.unwrap();

        let fetched = store.get("p1").await.unwrap();
        assert_eq!(fetched.local_path, std::path::PathBuf::from("/repo2"));
        assert_eq!(fetched.sync_mode, SyncMode::Realtime);
        assert!(fetched.auto_sync_enabled);
    }

    #[tokio::test]
    async fn checkpoint_store_tracks_active_checkpoints() {
        let store = SqliteStore::in_memory().await.unwrap();
        let checkpoint = Checkpoint {
            id: "ckpt-1".to_string(),
            project_id: "p1".to_string(),
            sync_job_id: "job-1".to_string(),
            files_processed: vec!["a.rs".to_string()],
            files_remaining: vec!["b.rs".to_string()],
            chunks_created: Vec::new(),
            status: CheckpointStatus::Active,
            created_at: Utc::now(),
        };
        store.create(&checkpoint).await.unwrap();

        let active = store.active_for_project("p1").await.unwrap().unwrap();
        assert_eq!(active.files_remaining, vec!["b.rs".to_string()]);

        store.update_status("ckpt-1", CheckpointStatus::Completed).await.unwrap();
        assert!(store.active_for_project("p1").await.unwrap().is_none());
    }
}
