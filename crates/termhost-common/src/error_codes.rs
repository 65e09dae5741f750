//! Numeric error codes carried in host protocol error responses.
//!
//! The values follow the JSON-RPC convention of reserving the -32000 range
//! for application errors.

pub const GENERIC_ERROR: i32 = -32000;
pub const SESSION_NOT_FOUND: i32 = -32001;
pub const SESSION_BUSY: i32 = -32002;
pub const SESSION_LIMIT: i32 = -32003;
pub const INVALID_DIRECTORY: i32 = -32004;
pub const COMMAND_NOT_FOUND: i32 = -32005;
pub const PERMISSION_DENIED: i32 = -32006;
pub const PROCESS_ERROR: i32 = -32007;
pub const SERVER_ERROR: i32 = -32008;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    InvalidInput,
    Busy,
    External,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::InvalidInput => "invalid_input",
            ErrorCategory::Busy => "busy",
            ErrorCategory::External => "external",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn category_for_code(code: i32) -> ErrorCategory {
    match code {
        SESSION_NOT_FOUND | COMMAND_NOT_FOUND => ErrorCategory::NotFound,
        INVALID_DIRECTORY | PARSE_ERROR | INVALID_REQUEST | METHOD_NOT_FOUND | INVALID_PARAMS => {
            ErrorCategory::InvalidInput
        }
        SESSION_BUSY | SESSION_LIMIT => ErrorCategory::Busy,
        PERMISSION_DENIED | PROCESS_ERROR | SERVER_ERROR => ErrorCategory::External,
        _ => ErrorCategory::Internal,
    }
}
