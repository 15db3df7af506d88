// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface
//!
//! A clap-derive `Cli`/`Commands` pair with global flags plus subcommands,
//! scoped to the worker's own surface: start the long-running sync worker,
//! or validate a candidate project path before registering it.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::path_safety::{validate_local_path, PathSafetyError};

#[derive(Debug, Parser)]
#[command(name = "codesync-worker", about = "Incremental codebase sync worker", version)]
pub struct Cli {
    /// Path to a TOML configuration file; overridden by SYNC_* env vars.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the worker: file watching, debouncing, and sync processing.
    Run {
        /// Override the bind address for the HTTP trigger layer.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Validate that a local path is safe to register as a project root.
    ValidatePath {
        /// Candidate local path.
        path: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

/// Runs the `validate-path` subcommand, printing the canonical path on
/// success. Returns the validation error so callers can map it to an exit code.
pub fn run_validate_path(path: &PathBuf) -> Result<PathBuf, PathSafetyError> {
    validate_local_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_with_bind_override() {
        let cli = Cli::parse_from(["codesync-worker", "run", "--bind", "0.0.0.0:9000"]);
        match cli.command {
            Commands::Run { bind } => assert_eq!(bind.as_deref(), Some("0.0.0.0:9000")),
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn parses_validate_path_subcommand() {
        let cli = Cli::parse_from(["codesync-worker", "validate-path", "/tmp"]);
        match cli.command {
            Commands::ValidatePath { path } => assert_eq!(path, PathBuf::from("/tmp")),
            _ => panic!("expected ValidatePath command"),
        }
    }

    #[test]
    fn run_validate_path_accepts_an_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run_validate_path(&dir.path().to_path_buf()).is_ok());
    }

    #[test]
    fn run_validate_path_rejects_a_protected_directory() {
        let err = run_validate_path(&PathBuf::from("/etc")).unwrap_err();
        assert!(matches!(err, PathSafetyError::Protected(_)));
    }
}
