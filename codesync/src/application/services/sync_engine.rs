// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Sync Engine
//!
//! The orchestrator: `sync_project` reconciles one project's on-disk state
//! against the knowledge store. Guarded per project by a [`CircuitBreaker`],
//! it categorizes candidate files into added/modified/deleted, fans work out
//! through the [`ParallelProcessor`](super::parallel_processor), and performs
//! a chunk-level diff by `chunk_hash` for modifications so unchanged chunks
//! are left untouched.

use crate::application::services::batch_embedder::BatchEmbedder;
use crate::application::services::parallel_processor::{process_files, ParallelProcessorConfig};
use crate::infrastructure::runtime::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::infrastructure::sync::chunker::{self, Language, DEFAULT_MAX_LINES, DEFAULT_OVERLAP_LINES};
use crate::infrastructure::sync::error_classifier::classify_io_error;
use crate::infrastructure::sync::hasher;
use codesync_domain::{
    Chunk, ChunkMetadata, Clock, KnowledgeStore, ProjectStore, SyncError, SyncStats, SyncStatus,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

const INCLUDE_EXTENSIONS: &[&str] = &[
    "py", "ts", "tsx", "js", "jsx", "md", "mdx", "rs", "go", "java", "cpp", "c", "cs", "rb", "php", "swift", "kt",
    "json", "yaml", "yml", "toml", "sql", "sh", "bash",
];

const EXCLUDE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    ".next",
    "target",
    ".pytest_cache",
    "coverage",
    ".nyc_output",
    "vendor",
];

#[derive(Debug, Clone, Copy)]
pub struct SyncEngineConfig {
    pub insert_batch_size: usize,
    pub max_workers: usize,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self { insert_batch_size: 50, max_workers: 5, circuit_breaker: CircuitBreakerConfig::default() }
    }
}

pub struct SyncEngine {
    knowledge_store: Arc<dyn KnowledgeStore>,
    project_store: Arc<dyn ProjectStore>,
    batch_embedder: Arc<BatchEmbedder>,
    clock: Arc<dyn Clock>,
    circuit_breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
    config: SyncEngineConfig,
}

impl SyncEngine {
    pub fn new(
        knowledge_store: Arc<dyn KnowledgeStore>,
        project_store: Arc<dyn ProjectStore>,
        batch_embedder: Arc<BatchEmbedder>,
        clock: Arc<dyn Clock>,
        config: SyncEngineConfig,
    ) -> Self {
        Self { knowledge_store, project_store, batch_embedder, clock, circuit_breakers: Mutex::new(HashMap::new()), config }
    }

    fn circuit_breaker_for(&self, project_id: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.circuit_breakers.lock();
        breakers
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(project_id, self.config.circuit_breaker)))
            .clone()
    }

    /// Guarded entry point. A rejected circuit breaker call fails the whole
    /// job without touching the store.
    pub async fn sync_project(
        &self,
        project_id: &str,
        changed_files: Option<Vec<String>>,
    ) -> Result<SyncStats, SyncError> {
        let breaker = self.circuit_breaker_for(project_id);
        let guard = breaker.try_acquire()?;

        match self.sync_project_internal(project_id, changed_files).await {
            Ok(stats) => {
                guard.on_success();
                Ok(stats)
            }
            Err(err) => {
                guard.on_failure();
                let now = self.clock.now();
                let _ = self.project_store.update_sync_status(project_id, SyncStatus::Error, now, Some(&err.user_message())).await;
                Err(err)
            }
        }
    }

    async fn sync_project_internal(
        &self,
        project_id: &str,
        changed_files: Option<Vec<String>>,
    ) -> Result<SyncStats, SyncError> {
        let start = Instant::now();
        let mut stats = SyncStats::default();
        let now = self.clock.now();

        self.project_store.update_sync_status(project_id, SyncStatus::Syncing, now, None).await?;

        let project = self.project_store.get(project_id).await?;
        if project.local_path.as_os_str().is_empty() {
            return Err(SyncError::InvalidPath(format!("project {project_id} has no local_path configured")));
        }

        let source_id = match &project.source_id {
            Some(id) => id.clone(),
            None => {
                let display_name = project.local_path.display().to_string();
                let id = self.knowledge_store.upsert_source(project_id, &display_name).await?;
                self.project_store.set_source_id(project_id, &id).await?;
                id
            }
        };

        let candidates = self.resolve_candidates(&source_id, &project.local_path, changed_files).await?;
        let (added, modified, deleted) = self.categorize(&source_id, candidates).await?;
        info!(project_id, added = added.len(), modified = modified.len(), deleted = deleted.len(), "changes detected");

        for file_path in &deleted {
            match self.knowledge_store.delete_chunks_by_file(&source_id, file_path).await {
                Ok(count) => stats.chunks_deleted += count,
                Err(err) => stats.record_error(format!("delete error ({file_path}): {}", err.user_message())),
            }
        }

        if !added.is_empty() {
            self.process_additions(&source_id, &project.local_path, added, &mut stats).await;
        }

        if !modified.is_empty() {
            self.process_modifications(&source_id, &project.local_path, modified, &mut stats).await;
        }

        let completion_time = self.clock.now();
        if stats.has_errors() {
            let message = stats.errors.iter().take(3).cloned().collect::<Vec<_>>().join("; ");
            self.project_store.update_sync_status(project_id, SyncStatus::Error, completion_time, Some(&message)).await?;
        } else {
            self.project_store.update_sync_status(project_id, SyncStatus::Synced, completion_time, None).await?;
        }

        stats.duration_seconds = start.elapsed().as_secs_f64();
        info!(
            project_id,
            files_processed = stats.files_processed,
            chunks_added = stats.chunks_added,
            chunks_modified = stats.chunks_modified,
            chunks_deleted = stats.chunks_deleted,
            duration_seconds = stats.duration_seconds,
            "sync complete"
        );
        Ok(stats)
    }

    /// When `changed_files` is absent, the candidate set is the union of a
    /// fresh directory scan (covers additions/modifications) and every
    /// `file_path` already known to the store for this source (covers
    /// deletions — a file removed from disk never appears in a scan).
    async fn resolve_candidates(
        &self,
        source_id: &str,
        local_path: &Path,
        changed_files: Option<Vec<String>>,
    ) -> Result<Vec<String>, SyncError> {
        if let Some(files) = changed_files {
            return Ok(files);
        }

        let scanned = scan_directory(local_path);
        let known = self.knowledge_store.select_chunk_handles(source_id).await?;
        let mut candidates: HashSet<String> = scanned.into_iter().collect();
        candidates.extend(known.into_iter().map(|handle| handle.metadata.file_path));
        info!(source_id, candidates = candidates.len(), "resolved candidate files from directory scan");
        Ok(candidates.into_iter().collect())
    }

    async fn categorize(
        &self,
        source_id: &str,
        candidates: Vec<String>,
    ) -> Result<(Vec<String>, Vec<String>, Vec<String>), SyncError> {
        let mut added = Vec::new();
        let mut modified = Vec::new();
        let mut deleted = Vec::new();

        for path in candidates {
            let existing = self.knowledge_store.select_chunks_by_file(source_id, &path).await?;
            if !Path::new(&path).exists() {
                if !existing.is_empty() {
                    deleted.push(path);
                }
                continue;
            }

            if existing.is_empty() {
                added.push(path);
                continue;
            }

            let current_hash = hasher::hash_file(Path::new(&path)).await?;
            if current_hash != existing[0].metadata.file_hash {
                modified.push(path);
            }
        }

        Ok((added, modified, deleted))
    }

    async fn process_additions(&self, source_id: &str, base_path: &Path, files: Vec<String>, stats: &mut SyncStats) {
        let embedder = Arc::clone(&self.batch_embedder);
        let source_id = source_id.to_string();
        let base_path = base_path.to_path_buf();

        let results = process_files(
            ParallelProcessorConfig { max_workers: self.config.max_workers },
            files,
            move |file_path| {
                let embedder = Arc::clone(&embedder);
                let source_id = source_id.clone();
                let base_path = base_path.clone();
                async move {
                    chunk_and_embed_file(&embedder, &file_path, &source_id, &base_path)
                        .await
                        .map_err(|e| e.user_message())
                }
            },
            |_progress| {},
        )
        .await;

        for result in results {
            match result.success {
                true => {
                    let chunks = result.result.unwrap_or_default();
                    if !chunks.is_empty() {
                        if let Err(err) = self.insert_chunks_batched(&chunks).await {
                            stats.record_error(format!("insert error ({}): {}", result.file_path, err.user_message()));
                            continue;
                        }
                        stats.chunks_added += chunks.len() as u64;
                    }
                    stats.files_processed += 1;
                }
                false => {
                    stats.record_error(format!(
                        "add error ({}): {}",
                        result.file_path,
                        result.error.unwrap_or_default()
                    ));
                }
            }
        }
    }

    async fn process_modifications(&self, source_id: &str, base_path: &Path, files: Vec<String>, stats: &mut SyncStats) {
        let embedder = Arc::clone(&self.batch_embedder);
        let store = Arc::clone(&self.knowledge_store);
        let source_id_owned = source_id.to_string();
        let base_path = base_path.to_path_buf();

        let results = process_files(
            ParallelProcessorConfig { max_workers: self.config.max_workers },
            files,
            move |file_path| {
                let embedder = Arc::clone(&embedder);
                let store = Arc::clone(&store);
                let source_id = source_id_owned.clone();
                let base_path = base_path.clone();
                async move {
                    let old_chunks = store
                        .select_chunks_by_file(&source_id, &file_path)
                        .await
                        .map_err(|e| e.user_message())?;
                    let new_chunks = chunk_and_embed_file(&embedder, &file_path, &source_id, &base_path)
                        .await
                        .map_err(|e| e.user_message())?;
                    Ok(compute_chunk_diff(&old_chunks, new_chunks))
                }
            },
            |_progress| {},
        )
        .await;

        for result in results {
            match result.success {
                true => {
                    let (to_delete, to_add) = result.result.unwrap_or_default();
                    if !to_delete.is_empty() {
                        if let Err(err) = self.knowledge_store.delete_chunks_by_ids(&to_delete).await {
                            stats.record_error(format!("delete error ({}): {}", result.file_path, err.user_message()));
                        } else {
                            stats.chunks_deleted += to_delete.len() as u64;
                        }
                    }
                    if !to_add.is_empty() {
                        if let Err(err) = self.insert_chunks_batched(&to_add).await {
                            stats.record_error(format!("insert error ({}): {}", result.file_path, err.user_message()));
                        } else {
                            stats.chunks_modified += to_add.len() as u64;
                        }
                    }
                    stats.files_processed += 1;
                }
                false => {
                    stats.record_error(format!(
                        "modify error ({}): {}",
                        result.file_path,
                        result.error.unwrap_or_default()
                    ));
                }
            }
        }
    }

    async fn insert_chunks_batched(&self, chunks: &[Chunk]) -> Result<(), SyncError> {
        for batch in chunks.chunks(self.config.insert_batch_size) {
            self.knowledge_store.insert_chunks(batch).await?;
        }
        Ok(())
    }
}

/// Recursively lists files under `root` whose extension is in the known
/// code/doc table, skipping the fixed set of vendored/build directories.
fn scan_directory(root: &Path) -> Vec<String> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            entry.file_type().is_file()
                || !entry
                    .file_name()
                    .to_str()
                    .map(|name| EXCLUDE_DIRS.contains(&name))
                    .unwrap_or(false)
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| INCLUDE_EXTENSIONS.contains(&ext))
                .unwrap_or(false)
        })
        .map(|entry| entry.path().to_string_lossy().into_owned())
        .collect()
}

/// Reads, hashes, chunks, and embeds one file. A UTF-8 decode failure is
/// treated as a binary file and skipped (empty result), not an error.
async fn chunk_and_embed_file(
    embedder: &BatchEmbedder,
    file_path: &str,
    source_id: &str,
    base_path: &Path,
) -> Result<Vec<Chunk>, SyncError> {
    let content = match tokio::fs::read(file_path).await {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => {
                warn!(file_path, "skipping binary file");
                return Ok(Vec::new());
            }
        },
        Err(err) => return Err(classify_io_error(err)),
    };

    let path = Path::new(file_path);
    let language = Language::detect(path);
    let file_hash = hasher::hash_content(&content);
    let bodies = chunker::chunk_file(&content, language, DEFAULT_MAX_LINES, DEFAULT_OVERLAP_LINES);
    if bodies.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = bodies.iter().map(|b| b.text.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).await;
    let relative_path = path.strip_prefix(base_path).unwrap_or(path).to_string_lossy().into_owned();

    let mut chunks = Vec::with_capacity(bodies.len());
    for (idx, (body, embedding)) in bodies.into_iter().zip(embeddings).enumerate() {
        let Some(embedding) = embedding else {
            warn!(file_path, chunk_index = idx, "skipping chunk: embedding failed");
            continue;
        };
        let chunk_hash = hasher::hash_content(&body.text);
        let metadata = ChunkMetadata {
            file_path: file_path.to_string(),
            relative_path: relative_path.clone(),
            file_hash: file_hash.clone(),
            chunk_hash,
            language: language.as_str().to_string(),
            chunk_index: idx,
            start_line: body.start_line,
            end_line: body.end_line,
            section_type: body.section_type,
            section_name: body.section_name,
        };
        chunks.push(Chunk::new(source_id, body.text, metadata).with_embedding(embedding));
    }
    Ok(chunks)
}

/// Minimal diff by `chunk_hash`: chunks whose hash survives in the new set
/// are left in place; everything else is a delete-then-add pair.
fn compute_chunk_diff(old_chunks: &[Chunk], new_chunks: Vec<Chunk>) -> (Vec<String>, Vec<Chunk>) {
    let new_hashes: HashSet<&str> = new_chunks.iter().map(|c| c.metadata.chunk_hash.as_str()).collect();
    let old_hashes: HashSet<&str> = old_chunks.iter().map(|c| c.metadata.chunk_hash.as_str()).collect();

    let to_delete = old_chunks
        .iter()
        .filter(|c| !new_hashes.contains(c.metadata.chunk_hash.as_str()))
        .map(|c| c.id.to_string())
        .collect();
    let to_add = new_chunks.into_iter().filter(|c| !old_hashes.contains(c.metadata.chunk_hash.as_str())).collect();

    (to_delete, to_add)
}
