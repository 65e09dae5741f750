#![expect(clippy::print_stderr, reason = "Tracing not initialized yet")]

//! Tracing subscriber setup.
//!
//! Logs default to stderr: stdout carries the JSON-lines protocol when the
//! binary runs as a host.

use std::io::IsTerminal;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub const LOG_FILE_ENV: &str = "TERMHOST_LOG";
pub const LOG_FORMAT_ENV: &str = "TERMHOST_LOG_FORMAT";
pub const LOG_STREAM_ENV: &str = "TERMHOST_LOG_STREAM";

#[derive(Debug)]
pub struct TelemetryGuard {
    _guard: Option<WorkerGuard>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogStream {
    Stderr,
    Stdout,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSettings {
    pub file: Option<PathBuf>,
    pub format: LogFormat,
    pub stream: LogStream,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self {
            file: std::env::var(LOG_FILE_ENV)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from),
            format: match env_lowercase(LOG_FORMAT_ENV).as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            stream: match env_lowercase(LOG_STREAM_ENV).as_deref() {
                Some("stdout") => LogStream::Stdout,
                _ => LogStream::Stderr,
            },
        }
    }

    fn writer(&self) -> (BoxMakeWriter, Option<WorkerGuard>, bool) {
        if let Some(path) = &self.file {
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
            {
                Ok(file) => {
                    let (non_blocking, guard) = tracing_appender::non_blocking(file);
                    return (BoxMakeWriter::new(non_blocking), Some(guard), false);
                }
                Err(err) => {
                    eprintln!(
                        "Warning: failed to open log file {}: {}",
                        path.display(),
                        err
                    );
                }
            }
        }

        match self.stream {
            LogStream::Stdout => (
                BoxMakeWriter::new(std::io::stdout),
                None,
                std::io::stdout().is_terminal(),
            ),
            LogStream::Stderr => (
                BoxMakeWriter::new(std::io::stderr),
                None,
                std::io::stderr().is_terminal(),
            ),
        }
    }
}

fn env_lowercase(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_lowercase())
}

/// Installs the global subscriber. `RUST_LOG` overrides `default_level`.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process.
pub fn init_tracing(default_level: &str) -> TelemetryGuard {
    let settings = LogSettings::from_env();
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let (writer, guard, ansi) = settings.writer();

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = match settings.format {
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .json()
                .with_writer(writer)
                .finish(),
        ),
        LogFormat::Text => Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_thread_names(true)
                .with_ansi(ansi)
                .with_writer(writer)
                .finish(),
        ),
    };

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return TelemetryGuard { _guard: None };
    }

    TelemetryGuard { _guard: guard }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvGuard {
        key: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prev = std::env::var(key).ok();
            // SAFETY: Test-only environment override.
            unsafe {
                std::env::set_var(key, value);
            }
            Self { key, prev }
        }

        fn remove(key: &'static str) -> Self {
            let prev = std::env::var(key).ok();
            // SAFETY: Test-only environment override.
            unsafe {
                std::env::remove_var(key);
            }
            Self { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(prev) = self.prev.take() {
                // SAFETY: Test-only environment restoration.
                unsafe {
                    std::env::set_var(self.key, prev);
                }
            } else {
                // SAFETY: Test-only environment cleanup.
                unsafe {
                    std::env::remove_var(self.key);
                }
            }
        }
    }

    // One test touches all three variables so parallel tests never race on them.
    #[test]
    fn test_settings_from_env() {
        let _file = EnvGuard::remove(LOG_FILE_ENV);
        let _format = EnvGuard::remove(LOG_FORMAT_ENV);
        let _stream = EnvGuard::remove(LOG_STREAM_ENV);
        assert_eq!(
            LogSettings::from_env(),
            LogSettings {
                file: None,
                format: LogFormat::Text,
                stream: LogStream::Stderr,
            }
        );

        let _file = EnvGuard::set(LOG_FILE_ENV, "/tmp/termhost.log");
        let _format = EnvGuard::set(LOG_FORMAT_ENV, " JSON ");
        let _stream = EnvGuard::set(LOG_STREAM_ENV, "stdout");
        let settings = LogSettings::from_env();
        assert_eq!(settings.file, Some(PathBuf::from("/tmp/termhost.log")));
        assert_eq!(settings.format, LogFormat::Json);
        assert_eq!(settings.stream, LogStream::Stdout);

        let _format = EnvGuard::set(LOG_FORMAT_ENV, "yaml");
        assert_eq!(LogSettings::from_env().format, LogFormat::Text);
    }
}
