// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Error Classification
//!
//! Maps errors raised by external crates (`std::io`, `sqlx`, `reqwest`) onto
//! [`SyncError`]'s category taxonomy by keyword, so a raw I/O failure and a
//! raw HTTP failure that both mean "the network is down" land in the same
//! category and get the same retry/logging treatment.

use codesync_domain::{ErrorCategory, SyncError};
use tracing::{error, warn};

const NETWORK_KEYWORDS: &[&str] = &["connection", "timeout", "network", "unreachable", "refused"];
const PERMISSION_KEYWORDS: &[&str] = &["permission", "access denied", "forbidden", "unauthorized"];
const PARSING_KEYWORDS: &[&str] = &["decode", "encoding", "utf-8", "unicode", "syntax", "invalid"];
const EMBEDDING_KEYWORDS: &[&str] = &["embed", "cohere", "openai", "rate limit", "quota"];
const DATABASE_KEYWORDS: &[&str] = &["database", "sqlite", "postgres", "sql", "query", "constraint"];

fn classify_message(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();
    let any = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));
    if any(NETWORK_KEYWORDS) {
        ErrorCategory::Network
    } else if any(PERMISSION_KEYWORDS) {
        ErrorCategory::Permission
    } else if any(PARSING_KEYWORDS) {
        ErrorCategory::Parsing
    } else if any(EMBEDDING_KEYWORDS) {
        ErrorCategory::Embedding
    } else if any(DATABASE_KEYWORDS) {
        ErrorCategory::Database
    } else {
        ErrorCategory::Unknown
    }
}

/// Classifies a filesystem failure. `SyncError` cannot implement
/// `std::convert::From<std::io::Error>` directly (both types are foreign to
/// this crate under the orphan rule), so call sites convert explicitly via
/// `.map_err(classify_io_error)`.
pub fn classify_io_error(err: std::io::Error) -> SyncError {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::PermissionDenied => SyncError::Permission(err.to_string()),
        ErrorKind::NotFound => SyncError::InvalidPath(err.to_string()),
        _ => match classify_message(&err.to_string()) {
            ErrorCategory::Network => SyncError::Network(err.to_string()),
            ErrorCategory::Permission => SyncError::Permission(err.to_string()),
            _ => SyncError::Unknown(err.to_string()),
        },
    }
}

pub fn classify_reqwest_error(err: reqwest::Error) -> SyncError {
    if err.is_timeout() || err.is_connect() {
        return SyncError::Network(err.to_string());
    }
    SyncError::Embedding(err.to_string())
}

pub fn classify_sqlx_error(err: sqlx::Error) -> SyncError {
    SyncError::Database(err.to_string())
}

/// Logs `err` at a severity appropriate to its category (full trace for
/// unexpected errors, a terse warning for the common/expected ones) and
/// returns it unchanged, for use as `.map_err(|e| log_sync_error(e, "..."))`
/// at call sites that need side-effecting logging without altering the
/// error value.
pub fn log_sync_error(err: SyncError, context: &str) -> SyncError {
    let category = err.category();
    if category.should_log_full_trace() {
        error!(category = %category, context, "sync error: {err}");
    } else {
        warn!(category = %category, context, "sync error: {err}");
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_becomes_invalid_path() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let sync_err = classify_io_error(err);
        assert!(matches!(sync_err, SyncError::InvalidPath(_)));
    }

    #[test]
    fn io_permission_denied_is_permission_category() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let sync_err = classify_io_error(err);
        assert_eq!(sync_err.category(), ErrorCategory::Permission);
    }

    #[test]
    fn message_keyword_tables_classify_network_and_database() {
        assert_eq!(classify_message("Connection refused by host"), ErrorCategory::Network);
        assert_eq!(classify_message("sqlite constraint violation"), ErrorCategory::Database);
        assert_eq!(classify_message("totally novel failure"), ErrorCategory::Unknown);
    }
}
