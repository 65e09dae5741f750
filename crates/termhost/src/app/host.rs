//! JSON-lines host loop over stdin/stdout.

use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use termhost_common::error_codes;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::adapters::RpcRequest;
use crate::adapters::RpcResponse;
use crate::adapters::RpcRouter;
use crate::app::container::Container;
use crate::infra::EventReceiver;

/// How long killed processes get to report their `close` events before the
/// host exits.
const EXIT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);
const EXIT_DRAIN_POLL: Duration = Duration::from_millis(20);

/// Reads one request per stdin line and writes responses and events, one
/// JSON object per stdout line, through a single writer task. Returns on
/// stdin EOF, a `shutdown` request or a termination signal.
pub async fn serve_stdio(container: &Container) -> Result<()> {
    let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(write_lines(out_rx));

    let (stop_tx, stop_rx) = oneshot::channel();
    let forwarder = tokio::spawn(forward_events(
        container.bus.subscribe_all(),
        out_tx.clone(),
        stop_rx,
    ));

    let router = container.router();
    let mut shutdown = container.shutdown_signal();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("Host ready");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("Shutdown signalled");
                    break;
                }
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let response = handle_line(&router, &line).await;
                    match serde_json::to_string(&response) {
                        Ok(encoded) => {
                            if out_tx.send(encoded).is_err() {
                                warn!("Output writer stopped");
                                break;
                            }
                        }
                        Err(err) => warn!(error = %err, "Failed to encode response"),
                    }
                }
                Ok(None) => {
                    debug!("stdin closed");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "Failed to read stdin");
                    break;
                }
            },
        }
    }

    let killed = container.shutdown().await;
    if killed > 0 {
        wait_for_processes(container).await;
    }

    let _ = stop_tx.send(());
    if let Err(err) = forwarder.await {
        warn!(error = %err, "Event forwarder failed");
    }
    drop(out_tx);
    if let Err(err) = writer.await {
        warn!(error = %err, "Output writer failed");
    }
    info!(killed, "Host stopped");
    Ok(())
}

async fn wait_for_processes(container: &Container) {
    let deadline = tokio::time::Instant::now() + EXIT_DRAIN_TIMEOUT;
    while container.registry.live_process_count() > 0 {
        if tokio::time::Instant::now() >= deadline {
            warn!(
                live = container.registry.live_process_count(),
                "Processes still live at exit"
            );
            return;
        }
        tokio::time::sleep(EXIT_DRAIN_POLL).await;
    }
}

pub(crate) async fn handle_line(router: &RpcRouter, line: &str) -> RpcResponse {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => {
            return RpcResponse::error(0, error_codes::PARSE_ERROR, &format!("Parse error: {err}"));
        }
    };
    let id = value.get("id").and_then(Value::as_u64).unwrap_or(0);
    match serde_json::from_value::<RpcRequest>(value) {
        Ok(request) => router.route(request).await,
        Err(err) => RpcResponse::error(
            id,
            error_codes::INVALID_REQUEST,
            &format!("Invalid request: {err}"),
        ),
    }
}

async fn forward_events(
    mut events: EventReceiver,
    out: mpsc::UnboundedSender<String>,
    mut stop: oneshot::Receiver<()>,
) {
    let send = |event: crate::domain::IoEvent| match serde_json::to_string(&event) {
        Ok(line) => out.send(line).is_ok(),
        Err(err) => {
            warn!(error = %err, "Failed to encode event");
            true
        }
    };

    loop {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Some(event) => {
                    if !send(event) {
                        return;
                    }
                }
                None => return,
            },
            _ = &mut stop => {
                while let Ok(event) = events.try_recv() {
                    if !send(event) {
                        return;
                    }
                }
                return;
            }
        }
    }
}

async fn write_lines(mut lines: mpsc::UnboundedReceiver<String>) {
    let mut stdout = tokio::io::stdout();
    while let Some(mut line) = lines.recv().await {
        line.push('\n');
        if let Err(err) = stdout.write_all(line.as_bytes()).await {
            warn!(error = %err, "stdout closed");
            return;
        }
        if let Err(err) = stdout.flush().await {
            warn!(error = %err, "stdout flush failed");
            return;
        }
    }
}
