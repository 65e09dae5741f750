use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::json;
use termhost_common::error_codes;

/// One request line. `jsonrpc` is accepted but not required.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(rename = "jsonrpc", default)]
    _jsonrpc: Option<String>,
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            _jsonrpc: None,
            id,
            method: method.into(),
            params,
        }
    }

    /// Deserializes `params` into `T`; a missing object counts as `{}`.
    #[allow(clippy::result_large_err)]
    pub fn parse_params<T: DeserializeOwned>(&self) -> Result<T, RpcResponse> {
        let params = self.params.clone().unwrap_or_else(|| json!({}));
        serde_json::from_value(params).map_err(|err| {
            RpcResponse::error(
                self.id,
                error_codes::INVALID_PARAMS,
                &format!("Invalid params for '{}': {err}", self.method),
            )
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    #[serde(rename = "jsonrpc")]
    _jsonrpc: &'static str,
    id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcServerError>,
}

#[derive(Debug, Serialize)]
pub struct RpcServerError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ErrorData {
    pub category: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl RpcResponse {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            _jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn success_json<T: Serialize>(id: u64, result: &T) -> Self {
        let value = serde_json::to_value(result).unwrap_or_else(|_| json!({}));
        Self::success(id, value)
    }

    pub fn action_success(id: u64) -> Self {
        Self::success(id, json!({ "success": true }))
    }

    pub fn error(id: u64, code: i32, message: &str) -> Self {
        Self {
            _jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcServerError {
                code,
                message: message.to_string(),
                data: None,
            }),
        }
    }

    pub fn error_with_data(id: u64, code: i32, message: &str, error_data: ErrorData) -> Self {
        Self {
            _jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcServerError {
                code,
                message: message.to_string(),
                data: Some(serde_json::to_value(error_data).unwrap_or_else(|_| json!({}))),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error_code(&self) -> Option<i32> {
        self.error.as_ref().map(|err| err.code)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|err| err.message.as_str())
    }
}
