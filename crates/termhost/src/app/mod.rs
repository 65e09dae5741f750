#![expect(clippy::print_stderr, reason = "CLI errors are emitted here")]

//! CLI application layer and composition root wiring.

use std::io;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use clap::CommandFactory;
use clap::Parser;
use clap_complete::generate;
use termhost_common::Colors;
use termhost_common::color_init;
use termhost_common::telemetry;
use tracing::debug;

pub mod commands;
pub mod container;
pub mod handlers;
pub mod host;

use crate::adapters::presenter::presenter_for;
use crate::app::commands::Cli;
use crate::app::commands::Commands;
use crate::app::container::Container;
use crate::infra::CoreConfig;
use crate::infra::static_server::StaticServerError;
use crate::usecases::ports::SessionError;

const PROGRAM_NAME: &str = "termhost";
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const UNAVAILABLE: i32 = 69;
    pub const SOFTWARE: i32 = 70;
}

pub struct Application;

impl Application {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self) -> Result<i32> {
        let exit_code = match self.execute() {
            Ok(code) => code,
            Err(e) => self.handle_error(e),
        };
        Ok(exit_code)
    }

    fn execute(&self) -> Result<i32> {
        let cli = Cli::parse();
        let _telemetry = telemetry::init_tracing(if cli.verbose { "debug" } else { "warn" });
        color_init(cli.no_color);
        let format = cli.effective_format();
        debug!(command = ?cli.command, format = ?format, "CLI command parsed");

        if let Commands::Completions { shell } = cli.command {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, PROGRAM_NAME, &mut io::stdout());
            return Ok(exit_codes::SUCCESS);
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to build async runtime")?;

        let container = Container::build(CoreConfig::from_env());
        #[cfg(unix)]
        let _signals = container
            .install_signal_handler()
            .context("failed to install signal handler")?;

        let presenter = presenter_for(format);
        let result = runtime.block_on(async {
            #[cfg(not(unix))]
            {
                let shutdown = std::sync::Arc::clone(&container.shutdown);
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        shutdown.send_replace(true);
                    }
                });
            }
            handlers::dispatch(&container, presenter.as_ref(), cli.command).await
        });
        runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
        result
    }

    fn handle_error(&self, e: anyhow::Error) -> i32 {
        eprintln!("{}: {} {:#}", PROGRAM_NAME, Colors::error("Error:"), e);

        if let Some(session_error) = e.downcast_ref::<SessionError>() {
            eprintln!("{} {}", Colors::dim("Suggestion:"), session_error.suggestion());
            return exit_codes::GENERAL_ERROR;
        }
        if let Some(server_error) = e.downcast_ref::<StaticServerError>() {
            if let Some(suggestion) = server_error.suggestion() {
                eprintln!("{} {}", Colors::dim("Suggestion:"), suggestion);
            }
            return exit_codes::UNAVAILABLE;
        }
        if e.downcast_ref::<io::Error>().is_some() {
            return exit_codes::SOFTWARE;
        }
        exit_codes::GENERAL_ERROR
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_error_maps_server_errors() {
        let app = Application::new();
        let err = anyhow::Error::new(StaticServerError::InvalidRoot {
            path: "/missing".into(),
        });
        assert_eq!(app.handle_error(err), exit_codes::UNAVAILABLE);

        let err = anyhow::anyhow!("plain failure");
        assert_eq!(app.handle_error(err), exit_codes::GENERAL_ERROR);
    }
}
