//! Maps use-case and infra errors onto protocol error responses.

use serde_json::Value;
use serde_json::json;
use termhost_common::error_codes;

use crate::adapters::rpc::ErrorData;
use crate::adapters::rpc::RpcResponse;
use crate::infra::static_server::StaticServerError;
use crate::usecases::ports::SessionError;

pub fn session_error_context(err: &SessionError) -> Value {
    match err {
        SessionError::NotFound(id) | SessionError::Busy(id) => json!({ "session_id": id }),
        SessionError::LimitReached(max) => json!({ "max_sessions": max }),
        SessionError::InvalidDirectory { path } => json!({ "path": path }),
    }
}

pub fn session_error_response(id: u64, err: &SessionError) -> RpcResponse {
    RpcResponse::error_with_data(
        id,
        err.code(),
        &err.to_string(),
        ErrorData {
            category: err.category().to_string(),
            retryable: err.is_retryable(),
            context: Some(session_error_context(err)),
            suggestion: Some(err.suggestion()),
        },
    )
}

pub fn server_error_response(id: u64, err: &StaticServerError) -> RpcResponse {
    let context = match err {
        StaticServerError::InvalidRoot { path } => json!({ "root_path": path }),
        StaticServerError::Bind { port, source } => {
            json!({ "port": port, "reason": source.to_string() })
        }
        StaticServerError::Io { operation, source } => {
            json!({ "operation": operation, "reason": source.to_string() })
        }
    };
    RpcResponse::error_with_data(
        id,
        err.code(),
        &err.to_string(),
        ErrorData {
            category: error_codes::category_for_code(err.code()).to_string(),
            retryable: false,
            context: Some(context),
            suggestion: err.suggestion(),
        },
    )
}
