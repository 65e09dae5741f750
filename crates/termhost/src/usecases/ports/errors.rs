use std::path::PathBuf;

use termhost_common::error_codes::{self, ErrorCategory};
use thiserror::Error;

use crate::domain::SessionId;
use crate::domain::command_line::TokenizeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnErrorKind {
    NotFound,
    PermissionDenied,
    Other,
}

impl SpawnErrorKind {
    pub fn from_io(kind: std::io::ErrorKind) -> Self {
        match kind {
            std::io::ErrorKind::NotFound => SpawnErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => SpawnErrorKind::PermissionDenied,
            _ => SpawnErrorKind::Other,
        }
    }
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to spawn '{program}': {reason}")]
    Spawn {
        program: String,
        reason: String,
        kind: SpawnErrorKind,
    },
    #[error("Failed to wait for process {pid}: {reason}")]
    Wait { pid: u32, reason: String },
}

impl ProcessError {
    pub fn operation(&self) -> &'static str {
        match self {
            ProcessError::Spawn { .. } => "spawn",
            ProcessError::Wait { .. } => "wait",
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            ProcessError::Spawn { reason, .. } | ProcessError::Wait { reason, .. } => reason,
        }
    }

    pub fn spawn_kind(&self) -> Option<SpawnErrorKind> {
        match self {
            ProcessError::Spawn { kind, .. } => Some(*kind),
            ProcessError::Wait { .. } => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self.spawn_kind() {
            Some(SpawnErrorKind::NotFound) => error_codes::COMMAND_NOT_FOUND,
            Some(SpawnErrorKind::PermissionDenied) => error_codes::PERMISSION_DENIED,
            _ => error_codes::PROCESS_ERROR,
        }
    }
}

/// Why [`crate::usecases::ProcessSupervisor::run_command`] could not produce
/// an exit code of its own. Every variant maps to exit code 1.
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Session {0} already has a running process")]
    Busy(SessionId),
    #[error("Job for session {0} was cancelled")]
    Cancelled(SessionId),
    #[error("{0}")]
    Tokenize(#[from] TokenizeError),
    #[error("{0}")]
    Process(#[from] ProcessError),
}

impl SupervisorError {
    pub const EXIT_CODE: i32 = 1;
    /// Reported for jobs stopped by session close or shutdown, matching a
    /// SIGKILLed child.
    pub const CANCELLED_EXIT_CODE: i32 = 137;

    pub fn exit_code(&self) -> i32 {
        match self {
            SupervisorError::Cancelled(_) => Self::CANCELLED_EXIT_CODE,
            _ => Self::EXIT_CODE,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            SupervisorError::Busy(_) => error_codes::SESSION_BUSY,
            SupervisorError::Cancelled(_) => error_codes::SESSION_NOT_FOUND,
            SupervisorError::Tokenize(_) => error_codes::INVALID_PARAMS,
            SupervisorError::Process(err) => err.code(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),
    #[error("Session {0} is busy executing a command")]
    Busy(SessionId),
    #[error("Session limit reached: maximum {0} sessions allowed")]
    LimitReached(usize),
    #[error("Not a directory: {}", path.display())]
    InvalidDirectory { path: PathBuf },
}

impl SessionError {
    pub fn code(&self) -> i32 {
        match self {
            SessionError::NotFound(_) => error_codes::SESSION_NOT_FOUND,
            SessionError::Busy(_) => error_codes::SESSION_BUSY,
            SessionError::LimitReached(_) => error_codes::SESSION_LIMIT,
            SessionError::InvalidDirectory { .. } => error_codes::INVALID_DIRECTORY,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        error_codes::category_for_code(self.code())
    }

    pub fn suggestion(&self) -> String {
        match self {
            SessionError::NotFound(_) => {
                "Run 'list_sessions' to see open sessions, or 'open_session' to create one."
                    .to_string()
            }
            SessionError::Busy(_) => {
                "Wait for the close event, send input with 'write_stdin', or interrupt with 'kill_process'."
                    .to_string()
            }
            SessionError::LimitReached(max) => format!(
                "Close an existing session first (limit {max}, see TERMHOST_MAX_SESSIONS)."
            ),
            SessionError::InvalidDirectory { .. } => {
                "Pass an existing directory path.".to_string()
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::Busy(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_kind_from_io() {
        assert_eq!(
            SpawnErrorKind::from_io(std::io::ErrorKind::NotFound),
            SpawnErrorKind::NotFound
        );
        assert_eq!(
            SpawnErrorKind::from_io(std::io::ErrorKind::Interrupted),
            SpawnErrorKind::Other
        );
    }

    #[test]
    fn test_process_error_codes() {
        let err = ProcessError::Spawn {
            program: "nope".to_string(),
            reason: "No such file or directory".to_string(),
            kind: SpawnErrorKind::NotFound,
        };
        assert_eq!(err.code(), error_codes::COMMAND_NOT_FOUND);
        assert_eq!(err.operation(), "spawn");
        assert_eq!(err.reason(), "No such file or directory");
        assert_eq!(
            err.to_string(),
            "Failed to spawn 'nope': No such file or directory"
        );
    }

    #[test]
    fn test_supervisor_errors_exit_with_one() {
        let busy = SupervisorError::Busy(SessionId::new(1));
        assert_eq!(busy.exit_code(), 1);
        assert_eq!(busy.code(), error_codes::SESSION_BUSY);

        let cancelled = SupervisorError::Cancelled(SessionId::new(1));
        assert_eq!(cancelled.exit_code(), 137);
    }

    #[test]
    fn test_session_error_metadata() {
        let err = SessionError::Busy(SessionId::new(4));
        assert!(err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::Busy);
        assert!(err.suggestion().contains("kill_process"));
        assert!(!SessionError::LimitReached(2).is_retryable());
    }
}
