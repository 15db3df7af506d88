// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Hasher
//!
//! SHA-256 content digests, hex-encoded. The same function computes both
//! `file_hash` and `chunk_hash` — there is nothing semantically different
//! between the two beyond what they are applied to.

use codesync_domain::SyncError;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

const STREAM_BLOCK_SIZE: usize = 8192;

/// Hashes a file by streaming fixed-size blocks, so a multi-gigabyte file
/// never needs to be fully resident in memory.
pub async fn hash_file(path: &Path) -> Result<String, SyncError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| SyncError::Network(format!("failed to open {}: {e}", path.display())))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; STREAM_BLOCK_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| SyncError::Network(format!("failed to read {}: {e}", path.display())))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hashes in-memory content. Used for `chunk_hash` and for tests against a
/// string without touching disk.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
