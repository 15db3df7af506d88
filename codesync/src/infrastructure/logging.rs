// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Logging Initialization
//!
//! Installs the process-wide `tracing_subscriber`, selecting a JSON or
//! human-readable formatter from `WorkerSettings`.

use tracing_subscriber::{fmt, EnvFilter};

use crate::infrastructure::config::LoggingSettings;

/// Installs the global tracing subscriber. Call once, at process start.
///
/// The env-filter defaults to `settings.level` but is still overridable by
/// the standard `RUST_LOG` variable, which `EnvFilter` consults first.
pub fn init_logging(settings: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

    match settings.format.as_str() {
        "json" => {
            fmt().with_env_filter(filter).json().with_target(true).init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}
