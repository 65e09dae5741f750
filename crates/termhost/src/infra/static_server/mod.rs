//! Toggleable static file server whose request log is emitted as session
//! events.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use axum::Router;
use axum::extract::Request;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::middleware;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Deserialize;
use serde::Serialize;
use termhost_common::Tint;
use termhost_common::tint;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::domain::IoEvent;
use crate::domain::SessionId;
use crate::usecases::ports::EventSinkHandle;

mod error;

pub use error::StaticServerError;

const SERVER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToggleRequest {
    pub root_path: PathBuf,
    pub port: u16,
    pub default_file: String,
    pub session_id: SessionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToggleOutcome {
    Started { port: u16 },
    Stopped,
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub port: u16,
    pub root_path: PathBuf,
    pub default_file: String,
}

struct ServerInstance {
    info: ServerInfo,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ServerInstance {
    async fn stop(self) {
        let ServerInstance {
            info,
            shutdown_tx,
            mut task,
        } = self;
        let _ = shutdown_tx.send(true);
        match tokio::time::timeout(SERVER_SHUTDOWN_TIMEOUT, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(port = info.port, error = %err, "Static server task failed"),
            Err(_) => {
                warn!(
                    port = info.port,
                    timeout_ms = SERVER_SHUTDOWN_TIMEOUT.as_millis(),
                    "Static server shutdown timed out; aborting"
                );
                task.abort();
            }
        }
        info!(port = info.port, "Static server stopped");
    }
}

struct ServeState {
    root: PathBuf,
    default_file: String,
    session_id: SessionId,
    events: EventSinkHandle,
}

/// At most one server runs at a time; toggling while it listens stops it.
pub struct StaticServerToggle {
    host: String,
    events: EventSinkHandle,
    instance: Mutex<Option<ServerInstance>>,
}

impl StaticServerToggle {
    pub fn new(host: impl Into<String>, events: EventSinkHandle) -> Self {
        Self {
            host: host.into(),
            events,
            instance: Mutex::new(None),
        }
    }

    #[tracing::instrument(skip(self, request), fields(session = %request.session_id, port = request.port))]
    pub async fn toggle(&self, request: ToggleRequest) -> Result<ToggleOutcome, StaticServerError> {
        let mut instance = self.instance.lock().await;
        if let Some(running) = instance.take() {
            running.stop().await;
            return Ok(ToggleOutcome::Stopped);
        }

        if !request.root_path.is_dir() {
            return Err(StaticServerError::InvalidRoot {
                path: request.root_path,
            });
        }

        let listener = match TcpListener::bind((self.host.as_str(), request.port)).await {
            Ok(listener) => listener,
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                warn!(port = request.port, "Port already in use");
                return Ok(ToggleOutcome::Error {
                    message: format!("Port {} is already in use.", request.port),
                });
            }
            Err(source) => {
                return Err(StaticServerError::Bind {
                    port: request.port,
                    source,
                });
            }
        };
        let port = listener
            .local_addr()
            .map_err(|source| StaticServerError::Io {
                operation: "read local address",
                source,
            })?
            .port();

        let state = Arc::new(ServeState {
            root: request.root_path.clone(),
            default_file: request.default_file.clone(),
            session_id: request.session_id,
            events: Arc::clone(&self.events),
        });
        let router = build_router(state);

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let server = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        });
        let task = tokio::spawn(async move {
            if let Err(err) = server.await {
                error!(port, error = %err, "Static server failed");
            }
        });

        info!(port, root = %request.root_path.display(), "Static server listening");
        *instance = Some(ServerInstance {
            info: ServerInfo {
                port,
                root_path: request.root_path,
                default_file: request.default_file,
            },
            shutdown_tx,
            task,
        });
        Ok(ToggleOutcome::Started { port })
    }

    pub async fn is_listening(&self) -> bool {
        self.instance.lock().await.is_some()
    }

    pub async fn info(&self) -> Option<ServerInfo> {
        self.instance
            .lock()
            .await
            .as_ref()
            .map(|instance| instance.info.clone())
    }

    /// Stops the server if it is running. Returns whether it was.
    pub async fn shutdown(&self) -> bool {
        match self.instance.lock().await.take() {
            Some(running) => {
                running.stop().await;
                true
            }
            None => false,
        }
    }
}

fn build_router(state: Arc<ServeState>) -> Router {
    let files = ServeDir::new(&state.root).append_index_html_on_directories(false);
    Router::new()
        .fallback_service(files)
        .layer(middleware::from_fn_with_state(state.clone(), guard_path))
        .layer(middleware::from_fn_with_state(state, log_request))
}

async fn log_request(State(state): State<Arc<ServeState>>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let status = response.status();
    let message = format!(
        "{method} {path} {} {}ms",
        tint(status.as_str(), status_tint(status)),
        started.elapsed().as_millis()
    );
    state.events.emit(IoEvent::ServerLog {
        session_id: state.session_id,
        message,
    });
    response
}

fn status_tint(status: StatusCode) -> Tint {
    if status.is_success() {
        Tint::Green
    } else if status.is_client_error() || status.is_server_error() {
        Tint::Red
    } else {
        Tint::Yellow
    }
}

/// Refuses paths that leave the root and points directory requests at the
/// default file before `ServeDir` sees them.
async fn guard_path(
    State(state): State<Arc<ServeState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match route_request(&state.root, &state.default_file, request.uri()) {
        Ok(Some(uri)) => *request.uri_mut() = uri,
        Ok(None) => {}
        Err(status) => return status.into_response(),
    }
    next.run(request).await
}

/// `Err` with 400 for undecodable paths and 403 for any `..` segment;
/// `Ok(Some(uri))` when the request names a directory under `root`.
fn route_request(root: &Path, default_file: &str, uri: &Uri) -> Result<Option<Uri>, StatusCode> {
    let decoded = urlencoding::decode(uri.path()).map_err(|_| StatusCode::BAD_REQUEST)?;
    if decoded.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(StatusCode::FORBIDDEN);
    }

    let relative = decoded.trim_start_matches(['/', '\\']);
    if !root.join(relative).is_dir() {
        return Ok(None);
    }

    let path = format!(
        "{}/{}",
        uri.path().trim_end_matches('/'),
        urlencoding::encode(default_file)
    );
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse().map_err(|_| StatusCode::BAD_REQUEST)?);
    Uri::from_parts(parts)
        .map(Some)
        .map_err(|_| StatusCode::BAD_REQUEST)
}
