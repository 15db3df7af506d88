// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # codesync-bootstrap
//!
//! Process-entry concerns for the sync worker: CLI parsing, local-path
//! safety validation, signal handling, graceful-shutdown coordination, and
//! exit-code mapping. Kept as a separate crate so the domain and
//! application crates never depend on process-lifecycle details.

pub mod cli;
pub mod exit_code;
pub mod logger;
pub mod path_safety;
pub mod shutdown;
pub mod signals;

pub use cli::{Cli, Commands};
pub use exit_code::{result_to_exit_code, ExitCode};
pub use logger::{BootstrapLogger, ConsoleLogger, NoOpLogger};
pub use path_safety::{validate_local_path, PathSafetyError};
pub use shutdown::{CancellationToken, ShutdownCoordinator};
pub use signals::{create_signal_handler, NoOpSignalHandler, ShutdownCallback, SystemSignals};
