// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Code Mapping
//!
//! The worker binary's exit-code contract is narrow by design: `0` on a
//! normal stop (graceful shutdown completed), `1` on a fatal initialization
//! or unhandled error. No finer-grained codes are exposed to the caller —
//! the detail lives in the structured log line, not in the process exit
//! status.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ExitCode {
    #[default]
    Success = 0,
    Fatal = 1,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Success)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCode::Success => write!(f, "success (0)"),
            ExitCode::Fatal => write!(f, "fatal error (1)"),
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code.as_i32()
    }
}

/// Maps a top-level `Result` from `main` to the process exit code.
pub fn result_to_exit_code<T, E: fmt::Display>(result: Result<T, E>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::Success,
        Err(err) => {
            tracing::error!("fatal error: {err}");
            ExitCode::Fatal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_zero_and_fatal_is_one() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::Fatal.as_i32(), 1);
    }

    #[test]
    fn result_to_exit_code_maps_ok_and_err() {
        let ok: Result<(), String> = Ok(());
        let err: Result<(), String> = Err("boom".to_string());
        assert_eq!(result_to_exit_code(ok), ExitCode::Success);
        assert_eq!(result_to_exit_code(err), ExitCode::Fatal);
    }

    #[test]
    fn is_success_reflects_variant() {
        assert!(ExitCode::Success.is_success());
        assert!(!ExitCode::Fatal.is_success());
    }
}
