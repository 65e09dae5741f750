//! Core configuration from `TERMHOST_*` environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use crate::domain::TokenizerMode;
use crate::domain::history::DEFAULT_HISTORY_LIMIT;
use crate::infra::process::ShellConfig;
use crate::usecases::session_registry::DEFAULT_MAX_SESSIONS;

const DEFAULT_SERVER_HOST: &str = "127.0.0.1";
const DEFAULT_SERVER_PORT: u16 = 8080;
const DEFAULT_FILE: &str = "index.html";

#[derive(Debug, Clone)]
pub struct CoreConfig {
    max_sessions: usize,
    history_limit: usize,
    shell: ShellConfig,
    tokenizer: TokenizerMode,
    server_host: String,
    server_port: u16,
    default_file: String,
    property_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl CoreConfig {
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    pub fn shell(&self) -> &ShellConfig {
        &self.shell
    }

    pub fn tokenizer(&self) -> TokenizerMode {
        self.tokenizer
    }

    pub fn server_host(&self) -> &str {
        &self.server_host
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn default_file(&self) -> &str {
        &self.default_file
    }

    /// Where `<ext>.htpc` / `<ext>.htpr` property files are looked up.
    pub fn property_dir(&self) -> Option<&PathBuf> {
        self.property_dir.as_ref()
    }

    pub fn home_dir(&self) -> Option<&PathBuf> {
        self.home_dir.as_ref()
    }

    pub fn from_env() -> Self {
        Self {
            max_sessions: parse_env("TERMHOST_MAX_SESSIONS", DEFAULT_MAX_SESSIONS),
            history_limit: parse_env("TERMHOST_HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT),
            shell: env_string("TERMHOST_SHELL")
                .and_then(|value| ShellConfig::parse(&value))
                .unwrap_or_default(),
            tokenizer: parse_env("TERMHOST_TOKENIZER", TokenizerMode::default()),
            server_host: env_string("TERMHOST_SERVER_HOST")
                .unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string()),
            server_port: parse_env("TERMHOST_SERVER_PORT", DEFAULT_SERVER_PORT),
            default_file: env_string("TERMHOST_DEFAULT_FILE")
                .unwrap_or_else(|| DEFAULT_FILE.to_string()),
            property_dir: env_string("TERMHOST_PROPERTY_DIR").map(PathBuf::from),
            home_dir: env_string("HOME")
                .or_else(|| env_string("USERPROFILE"))
                .map(PathBuf::from),
        }
    }

    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_shell(mut self, shell: ShellConfig) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: TokenizerMode) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn with_server_port(mut self, port: u16) -> Self {
        self.server_port = port;
        self
    }

    pub fn with_default_file(mut self, file: impl Into<String>) -> Self {
        self.default_file = file.into();
        self
    }

    pub fn with_property_dir(mut self, dir: PathBuf) -> Self {
        self.property_dir = Some(dir);
        self
    }

    pub fn with_home_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.home_dir = dir;
        self
    }
}

fn env_string(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    let Some(value) = env_string(key) else {
        return default;
    };
    match value.parse::<T>() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!(value = %value, key, "Invalid config value; using default");
            default
        }
    }
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
            let prev = env::var(key).ok();
            // SAFETY: Test-only environment override.
            unsafe {
                env::set_var(key, value);
            }
            Self { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(prev) = self.prev.take() {
                // SAFETY: Test-only environment restoration.
                unsafe {
                    env::set_var(self.key, prev);
                }
            } else {
                // SAFETY: Test-only environment cleanup.
                unsafe {
                    env::remove_var(self.key);
                }
            }
        }
    }

    #[test]
    fn test_builder_pattern() {
        let config = CoreConfig::from_env()
            .with_max_sessions(4)
            .with_history_limit(10)
            .with_shell(ShellConfig::new("bash", "-lc"))
            .with_tokenizer(TokenizerMode::ShellWords)
            .with_server_port(9000)
            .with_default_file("home.html")
            .with_property_dir(PathBuf::from("/etc/termhost"))
            .with_home_dir(None);

        assert_eq!(config.max_sessions(), 4);
        assert_eq!(config.history_limit(), 10);
        assert_eq!(config.shell().program(), "bash");
        assert_eq!(config.tokenizer(), TokenizerMode::ShellWords);
        assert_eq!(config.server_port(), 9000);
        assert_eq!(config.default_file(), "home.html");
        assert_eq!(config.property_dir(), Some(&PathBuf::from("/etc/termhost")));
        assert_eq!(config.home_dir(), None);
    }

    #[test]
    fn test_invalid_env_uses_defaults() {
        let _max = EnvGuard::set("TERMHOST_MAX_SESSIONS", "many");
        let _history = EnvGuard::set("TERMHOST_HISTORY_LIMIT", "-1");
        let _port = EnvGuard::set("TERMHOST_SERVER_PORT", "70000");
        let _tokenizer = EnvGuard::set("TERMHOST_TOKENIZER", "fancy");

        let config = CoreConfig::from_env();
        assert_eq!(config.max_sessions(), DEFAULT_MAX_SESSIONS);
        assert_eq!(config.history_limit(), DEFAULT_HISTORY_LIMIT);
        assert_eq!(config.server_port(), DEFAULT_SERVER_PORT);
        assert_eq!(config.tokenizer(), TokenizerMode::Naive);
    }

    #[test]
    fn test_env_overrides() {
        let _shell = EnvGuard::set("TERMHOST_SHELL", "bash -lc");
        let _file = EnvGuard::set("TERMHOST_DEFAULT_FILE", "  main.html ");
        let _dir = EnvGuard::set("TERMHOST_PROPERTY_DIR", "/opt/props");

        let config = CoreConfig::from_env();
        assert_eq!(config.shell(), &ShellConfig::new("bash", "-lc"));
        assert_eq!(config.default_file(), "main.html");
        assert_eq!(config.property_dir(), Some(&PathBuf::from("/opt/props")));
    }
}
