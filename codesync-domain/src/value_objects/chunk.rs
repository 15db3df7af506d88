// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Value Object
//!
//! An immutable unit of embedded content produced by the chunker and
//! reconciled against the knowledge store. Two chunks are equal when their
//! `chunk_hash` and metadata agree — the embedding vector itself is not part
//! of identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The embedding dimension is fixed per deployment; a chunk whose embedding
/// failed is represented with `embedding: None` rather than a zero vector so
/// callers cannot mistake "not yet embedded" for "embedded as zeros".
pub type Embedding = Vec<f32>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub file_path: String,
    pub relative_path: String,
    pub file_hash: String,
    pub chunk_hash: String,
    pub language: String,
    pub chunk_index: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub section_type: Option<String>,
    pub section_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub source_id: String,
    pub text: String,
    pub embedding: Option<Embedding>,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id: source_id.into(),
            text: text.into(),
            embedding: None,
            metadata,
        }
    }

    pub fn with_embedding(mut self, embedding: Embedding) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// The raw body of a chunk as produced by a `Chunker` strategy, before it is
/// assigned an id or embedded. Line numbers are 1-based and closed on both
/// ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkBody {
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
    pub section_type: Option<String>,
    pub section_name: Option<String>,
}
