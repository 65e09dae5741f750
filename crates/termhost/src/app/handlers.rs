//! One-shot CLI commands run against a temporary session.

use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use tokio::sync::watch;
use tracing::debug;

use crate::adapters::presenter::Presenter;
use crate::app::commands::Commands;
use crate::app::container::Container;
use crate::app::host::serve_stdio;
use crate::domain::IoEvent;
use crate::domain::PropertyKind;
use crate::domain::SessionId;
use crate::infra::EventReceiver;
use crate::infra::static_server::ToggleOutcome;
use crate::infra::static_server::ToggleRequest;

/// Runs `command` and returns the process exit code.
pub async fn dispatch(
    container: &Container,
    presenter: &dyn Presenter,
    command: Commands,
) -> Result<i32> {
    match command {
        Commands::Host => {
            serve_stdio(container).await?;
            Ok(0)
        }
        Commands::Run { cwd, command } => {
            let cwd = resolve_cwd(cwd)?;
            handle_run(container, presenter, &cwd, &command.join(" ")).await
        }
        Commands::Sequence {
            target,
            property_file,
            kind,
            property_dir,
        } => {
            let cwd = resolve_cwd(None)?;
            let property_dir = property_dir.or_else(|| container.config.property_dir().cloned());
            handle_sequence(
                container,
                presenter,
                &cwd,
                &cwd.join(target),
                property_file,
                kind.into(),
                property_dir,
            )
            .await
        }
        Commands::Complete { partial, cwd } => {
            let cwd = resolve_cwd(cwd)?;
            handle_complete(container, presenter, &cwd, &partial)
        }
        Commands::Serve {
            root,
            port,
            default_file,
        } => {
            let root = resolve_cwd(None)?.join(root);
            let request = ToggleRequest {
                root_path: root,
                port: port.unwrap_or(container.config.server_port()),
                default_file: default_file
                    .unwrap_or_else(|| container.config.default_file().to_string()),
                session_id: SessionId::new(0),
            };
            handle_serve(container, presenter, request).await
        }
        Commands::Completions { .. } => Ok(0),
    }
}

fn resolve_cwd(cwd: Option<PathBuf>) -> Result<PathBuf> {
    let current = std::env::current_dir().context("failed to read current directory")?;
    Ok(match cwd {
        Some(cwd) => current.join(cwd),
        None => current,
    })
}

async fn handle_run(
    container: &Container,
    presenter: &dyn Presenter,
    cwd: &Path,
    command_line: &str,
) -> Result<i32> {
    let session = container
        .registry
        .open_session(cwd)
        .context("failed to open session")?;
    let mut events = container.bus.subscribe(session);
    container
        .registry
        .run_command(session, command_line, None)
        .context("failed to start command")?;

    let exit_code = pump_until_close(container, session, &mut events, presenter).await;
    container.registry.close_session(session)?;
    Ok(exit_code)
}

async fn handle_sequence(
    container: &Container,
    presenter: &dyn Presenter,
    cwd: &Path,
    target: &Path,
    property_file: Option<PathBuf>,
    kind: PropertyKind,
    property_dir: Option<PathBuf>,
) -> Result<i32> {
    let property_file = match (property_file, property_dir) {
        (Some(file), _) => cwd.join(file),
        (None, Some(dir)) => match kind.path_in(&dir, target) {
            Some(path) => path,
            None => bail!("{} has no extension to select a property file", target.display()),
        },
        (None, None) => bail!("pass --property-file or --property-dir (or set TERMHOST_PROPERTY_DIR)"),
    };
    let contents = tokio::fs::read_to_string(&property_file)
        .await
        .with_context(|| format!("failed to read {}", property_file.display()))?;
    debug!(property_file = %property_file.display(), "Loaded property file");

    let session = container.registry.open_session(cwd)?;
    let mut events = container.bus.subscribe(session);
    container
        .registry
        .run_property_file(session, &contents, target)
        .context("failed to start sequence")?;

    let exit_code = pump_until_close(container, session, &mut events, presenter).await;
    container.registry.close_session(session)?;
    Ok(exit_code)
}

fn handle_complete(
    container: &Container,
    presenter: &dyn Presenter,
    cwd: &Path,
    partial: &str,
) -> Result<i32> {
    let session = container.registry.open_session(cwd)?;
    let candidates = container.registry.autocomplete(session, partial, None)?;
    container.registry.close_session(session)?;
    presenter.present_candidates(&candidates);
    Ok(if candidates.is_empty() { 1 } else { 0 })
}

async fn handle_serve(
    container: &Container,
    presenter: &dyn Presenter,
    request: ToggleRequest,
) -> Result<i32> {
    let root = request.root_path.clone();
    let mut events = container.bus.subscribe(request.session_id);
    match container.server.toggle(request).await? {
        ToggleOutcome::Started { port } => presenter.present_info(&format!(
            "Serving {} at http://{}:{port}",
            root.display(),
            container.config.server_host()
        )),
        ToggleOutcome::Error { message } => bail!(message),
        ToggleOutcome::Stopped => return Ok(0),
    }

    let mut shutdown = container.shutdown_signal();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => presenter.present_event(&event),
                None => break,
            },
            _ = wait_for_shutdown(&mut shutdown) => break,
        }
    }
    container.server.shutdown().await;
    Ok(0)
}

/// Streams session events until the `close` event and returns its exit
/// code. A termination signal interrupts the running process once.
async fn pump_until_close(
    container: &Container,
    session: SessionId,
    events: &mut EventReceiver,
    presenter: &dyn Presenter,
) -> i32 {
    let mut shutdown = container.shutdown_signal();
    let mut interrupted = false;
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    return 1;
                };
                presenter.present_event(&event);
                if let IoEvent::Close { exit_code, .. } = event {
                    return exit_code;
                }
            }
            _ = wait_for_shutdown(&mut shutdown), if !interrupted => {
                interrupted = true;
                let _ = container.registry.kill_process(session);
            }
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
