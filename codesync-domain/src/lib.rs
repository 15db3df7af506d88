// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # codesync-domain
//!
//! Pure business logic for the incremental codebase sync pipeline: entities,
//! value objects, the error taxonomy, and the port traits implemented by
//! infrastructure adapters. Nothing in this crate touches a filesystem,
//! network socket, or database.

pub mod entities;
pub mod error;
pub mod repositories;
pub mod value_objects;

pub use entities::codebase_source::CodebaseSource;
pub use entities::project::{Project, SyncMode, SyncStatus};
pub use error::{ErrorCategory, SyncError};
pub use repositories::{
    AnalyticsStore, CheckpointStore, ChunkHandle, Clock, EmbeddingProvider, KnowledgeStore, ProjectStore, SystemClock,
};
pub use value_objects::checkpoint::{Checkpoint, CheckpointStatus};
pub use value_objects::chunk::{Chunk, ChunkBody, ChunkMetadata, Embedding};
pub use value_objects::file_event::{FileEvent, FileEventKind};
pub use value_objects::sync_job::{SyncJob, SyncPriority};
pub use value_objects::sync_operation::{SyncOperationRecord, SyncOperationStatus, SyncTrigger};
pub use value_objects::sync_stats::SyncStats;
