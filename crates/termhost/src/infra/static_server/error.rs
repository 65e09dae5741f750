use std::path::PathBuf;

use termhost_common::error_codes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StaticServerError {
    #[error("Server root is not a directory: {}", path.display())]
    InvalidRoot { path: PathBuf },
    #[error("Failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("Static server I/O error ({operation}): {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl StaticServerError {
    pub fn code(&self) -> i32 {
        match self {
            StaticServerError::InvalidRoot { .. } => error_codes::INVALID_DIRECTORY,
            StaticServerError::Bind { .. } | StaticServerError::Io { .. } => {
                error_codes::SERVER_ERROR
            }
        }
    }

    pub fn suggestion(&self) -> Option<String> {
        match self {
            StaticServerError::InvalidRoot { .. } => {
                Some("Point root_path at an existing directory.".to_string())
            }
            StaticServerError::Bind { .. } => {
                Some("Pick another port or check the host address.".to_string())
            }
            StaticServerError::Io { .. } => None,
        }
    }
}
