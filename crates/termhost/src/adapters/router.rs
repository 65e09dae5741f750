use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use termhost_common::error_codes;
use tokio::sync::watch;
use tracing::info;

use crate::adapters::error::server_error_response;
use crate::adapters::error::session_error_response;
use crate::adapters::rpc::*;
use crate::domain::Key;
use crate::infra::static_server::StaticServerToggle;
use crate::infra::static_server::ToggleRequest;
use crate::usecases::DispatchOutcome;
use crate::usecases::TerminalSessionRegistry;

#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub property_dir: Option<PathBuf>,
    pub server_port: u16,
    pub default_file: String,
}

/// Routes host protocol requests onto the session registry and the static
/// server. Jobs started here run detached; their completion arrives as a
/// `close` event.
pub struct RpcRouter {
    registry: Arc<TerminalSessionRegistry>,
    server: Arc<StaticServerToggle>,
    options: RouterOptions,
    shutdown: Arc<watch::Sender<bool>>,
}

macro_rules! try_params {
    ($request:expr, $ty:ty) => {
        match $request.parse_params::<$ty>() {
            Ok(params) => params,
            Err(response) => return response,
        }
    };
}

macro_rules! try_session {
    ($request:expr, $result:expr) => {
        match $result {
            Ok(value) => value,
            Err(err) => return session_error_response($request.id, &err),
        }
    };
}

impl RpcRouter {
    pub fn new(
        registry: Arc<TerminalSessionRegistry>,
        server: Arc<StaticServerToggle>,
        options: RouterOptions,
        shutdown: Arc<watch::Sender<bool>>,
    ) -> Self {
        Self {
            registry,
            server,
            options,
            shutdown,
        }
    }

    pub async fn route(&self, request: RpcRequest) -> RpcResponse {
        match request.method.as_str() {
            "ping" => RpcResponse::success(request.id, json!({ "pong": true })),
            "open_session" => self.open_session(&request),
            "close_session" => self.close_session(&request),
            "list_sessions" => RpcResponse::success(
                request.id,
                json!({ "sessions": self.registry.list_sessions() }),
            ),
            "history" => self.history(&request),
            "change_directory" => self.change_directory(&request),
            "run_command" => self.run_command(&request),
            "run_sequence" => self.run_sequence(&request),
            "run_property_file" => self.run_property_file(&request).await,
            "write_stdin" => self.write_stdin(&request),
            "kill_process" => self.kill_process(&request),
            "autocomplete" => self.autocomplete(&request),
            "dispatch" => self.dispatch(&request),
            "key" => self.key(&request),
            "server_toggle" => self.server_toggle(&request).await,
            "server_status" => {
                let info = self.server.info().await;
                RpcResponse::success(
                    request.id,
                    json!({ "listening": info.is_some(), "server": info }),
                )
            }
            "shutdown" => self.shutdown(&request).await,
            _ => RpcResponse::error(
                request.id,
                error_codes::METHOD_NOT_FOUND,
                &format!("Method not found: {}", request.method),
            ),
        }
    }

    fn open_session(&self, request: &RpcRequest) -> RpcResponse {
        let params = try_params!(request, OpenSessionParams);
        let session_id = try_session!(request, self.registry.open_session(&params.cwd));
        let info = try_session!(request, self.registry.session_info(session_id));
        RpcResponse::success_json(request.id, &info)
    }

    fn close_session(&self, request: &RpcRequest) -> RpcResponse {
        let params = try_params!(request, SessionParams);
        try_session!(request, self.registry.close_session(params.session_id));
        RpcResponse::action_success(request.id)
    }

    fn history(&self, request: &RpcRequest) -> RpcResponse {
        let params = try_params!(request, SessionParams);
        let entries = try_session!(request, self.registry.history(params.session_id));
        RpcResponse::success(request.id, json!({ "entries": entries }))
    }

    fn change_directory(&self, request: &RpcRequest) -> RpcResponse {
        let params = try_params!(request, ChangeDirectoryParams);
        let cwd = try_session!(
            request,
            self.registry.change_directory(params.session_id, &params.path)
        );
        RpcResponse::success(request.id, json!({ "cwd": cwd }))
    }

    fn run_command(&self, request: &RpcRequest) -> RpcResponse {
        let params = try_params!(request, RunCommandParams);
        let job = try_session!(
            request,
            self.registry
                .run_command(params.session_id, &params.command_line, params.cwd)
        );
        RpcResponse::success(request.id, json!({ "session_id": job.session_id(), "started": true }))
    }

    fn run_sequence(&self, request: &RpcRequest) -> RpcResponse {
        let params = try_params!(request, RunSequenceParams);
        let steps = params.commands.len();
        let job = try_session!(
            request,
            self.registry
                .run_sequence(params.session_id, params.commands, params.cwd)
        );
        RpcResponse::success(
            request.id,
            json!({ "session_id": job.session_id(), "started": true, "steps": steps }),
        )
    }

    async fn run_property_file(&self, request: &RpcRequest) -> RpcResponse {
        let params = try_params!(request, PropertyFileParams);
        let info = try_session!(request, self.registry.session_info(params.session_id));
        let target = info.cwd.join(&params.target);

        let property_file = match params.property_file {
            Some(path) => Some(info.cwd.join(path)),
            None => self
                .options
                .property_dir
                .as_ref()
                .and_then(|dir| params.kind.path_in(dir, &target)),
        };
        let Some(property_file) = property_file else {
            return RpcResponse::error(
                request.id,
                error_codes::INVALID_PARAMS,
                "No property file: pass 'property_file' or set TERMHOST_PROPERTY_DIR and use a target with an extension",
            );
        };
        let contents = match tokio::fs::read_to_string(&property_file).await {
            Ok(contents) => contents,
            Err(err) => {
                return RpcResponse::error(
                    request.id,
                    error_codes::INVALID_PARAMS,
                    &format!("Cannot read {}: {err}", property_file.display()),
                );
            }
        };

        let job = try_session!(
            request,
            self.registry
                .run_property_file(params.session_id, &contents, &target)
        );
        RpcResponse::success(
            request.id,
            json!({
                "session_id": job.session_id(),
                "started": true,
                "property_file": property_file,
            }),
        )
    }

    fn write_stdin(&self, request: &RpcRequest) -> RpcResponse {
        let params = try_params!(request, WriteStdinParams);
        let delivered = try_session!(
            request,
            self.registry.write_stdin(params.session_id, &params.data)
        );
        RpcResponse::success(request.id, json!({ "delivered": delivered }))
    }

    fn kill_process(&self, request: &RpcRequest) -> RpcResponse {
        let params = try_params!(request, SessionParams);
        let delivered = try_session!(request, self.registry.kill_process(params.session_id));
        RpcResponse::success(request.id, json!({ "delivered": delivered }))
    }

    fn autocomplete(&self, request: &RpcRequest) -> RpcResponse {
        let params = try_params!(request, AutocompleteParams);
        let candidates = try_session!(
            request,
            self.registry
                .autocomplete(params.session_id, &params.partial, params.cwd)
        );
        RpcResponse::success(request.id, json!({ "candidates": candidates }))
    }

    fn dispatch(&self, request: &RpcRequest) -> RpcResponse {
        let params = try_params!(request, DispatchParams);
        let outcome = try_session!(
            request,
            self.registry.dispatch(params.session_id, &params.line)
        );
        let result = match outcome {
            DispatchOutcome::Ignored => json!({ "outcome": "ignored" }),
            DispatchOutcome::Forwarded { delivered } => {
                json!({ "outcome": "forwarded", "delivered": delivered })
            }
            DispatchOutcome::Started(_) => json!({ "outcome": "started" }),
        };
        RpcResponse::success(request.id, result)
    }

    fn key(&self, request: &RpcRequest) -> RpcResponse {
        let params = try_params!(request, KeyParams);
        let key = match params.key.parse::<Key>() {
            Ok(key) => key,
            Err(err) => {
                return RpcResponse::error(
                    request.id,
                    error_codes::INVALID_PARAMS,
                    &err.to_string(),
                );
            }
        };
        let outcome = try_session!(request, self.registry.handle_key(params.session_id, key));
        RpcResponse::success_json(request.id, &outcome)
    }

    async fn server_toggle(&self, request: &RpcRequest) -> RpcResponse {
        let params = try_params!(request, ServerToggleParams);
        let toggle = ToggleRequest {
            root_path: params.root_path,
            port: params.port.unwrap_or(self.options.server_port),
            default_file: params
                .default_file
                .unwrap_or_else(|| self.options.default_file.clone()),
            session_id: params.session_id,
        };
        match self.server.toggle(toggle).await {
            Ok(outcome) => RpcResponse::success_json(request.id, &outcome),
            Err(err) => server_error_response(request.id, &err),
        }
    }

    async fn shutdown(&self, request: &RpcRequest) -> RpcResponse {
        let killed = self.registry.shutdown();
        let server_stopped = self.server.shutdown().await;
        self.shutdown.send_replace(true);
        info!(killed, server_stopped, "Shutdown requested");
        RpcResponse::success(
            request.id,
            json!({ "killed": killed, "server_stopped": server_stopped }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::ProcessSupervisor;
    use crate::usecases::RegistryOptions;
    use crate::usecases::SupervisorOptions;
    use crate::usecases::ports::test_support::{MockProcessController, RecordingSink};

    fn router() -> (RpcRouter, watch::Receiver<bool>, tempfile::TempDir) {
        let sink = Arc::new(RecordingSink::default());
        let supervisor = Arc::new(ProcessSupervisor::new(
            Arc::new(MockProcessController::new()),
            sink.clone(),
            SupervisorOptions::default(),
        ));
        let registry = Arc::new(TerminalSessionRegistry::new(
            supervisor,
            sink.clone(),
            RegistryOptions::default(),
        ));
        let server = Arc::new(StaticServerToggle::new("127.0.0.1", sink));
        let (tx, rx) = watch::channel(false);
        let options = RouterOptions {
            property_dir: None,
            server_port: 0,
            default_file: "index.html".to_string(),
        };
        (
            RpcRouter::new(registry, server, options, Arc::new(tx)),
            rx,
            tempfile::tempdir().unwrap(),
        )
    }

    async fn call(router: &RpcRouter, method: &str, params: serde_json::Value) -> serde_json::Value {
        let response = router.route(RpcRequest::new(1, method, Some(params))).await;
        serde_json::to_value(&response).unwrap()
    }

    #[tokio::test]
    async fn test_open_and_list_sessions() {
        let (router, _rx, dir) = router();
        let opened = call(&router, "open_session", json!({ "cwd": dir.path() })).await;
        assert_eq!(opened["result"]["id"], 1);
        assert_eq!(opened["result"]["state"], "idle");

        let listed = call(&router, "list_sessions", json!({})).await;
        assert_eq!(listed["result"]["sessions"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_session_maps_to_not_found() {
        let (router, _rx, _dir) = router();
        let response = call(&router, "kill_process", json!({ "session_id": 42 })).await;
        assert_eq!(response["error"]["code"], error_codes::SESSION_NOT_FOUND);
        assert_eq!(response["error"]["data"]["category"], "not_found");
    }

    #[tokio::test]
    async fn test_invalid_params_and_unknown_method() {
        let (router, _rx, _dir) = router();
        let response = call(&router, "run_command", json!({ "session_id": "x" })).await;
        assert_eq!(response["error"]["code"], error_codes::INVALID_PARAMS);

        let response = call(&router, "resize", json!({})).await;
        assert_eq!(response["error"]["code"], error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_key_requests_return_editor_state() {
        let (router, _rx, dir) = router();
        call(&router, "open_session", json!({ "cwd": dir.path() })).await;

        call(&router, "key", json!({ "session_id": 1, "key": "l" })).await;
        let response = call(&router, "key", json!({ "session_id": 1, "key": "s" })).await;
        assert_eq!(
            response["result"],
            json!({ "outcome": "redraw", "line": "ls", "cursor": 2 })
        );

        let response = call(&router, "key", json!({ "session_id": 1, "key": "F13" })).await;
        assert_eq!(response["error"]["code"], error_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_property_file_needs_a_source() {
        let (router, _rx, dir) = router();
        call(&router, "open_session", json!({ "cwd": dir.path() })).await;
        let response = call(
            &router,
            "run_property_file",
            json!({ "session_id": 1, "target": "main.c" }),
        )
        .await;
        assert_eq!(response["error"]["code"], error_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_shutdown_signals_host() {
        let (router, rx, _dir) = router();
        let response = call(&router, "shutdown", json!({})).await;
        assert_eq!(response["result"]["killed"], 0);
        assert_eq!(response["result"]["server_stopped"], false);
        assert!(*rx.borrow());
    }
}
