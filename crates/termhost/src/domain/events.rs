use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::domain::session_types::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Everything a front-end needs to render a session. Events for one session
/// are delivered in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IoEvent {
    Output {
        session_id: SessionId,
        stream: OutputStream,
        data: String,
    },
    Error {
        session_id: SessionId,
        message: String,
    },
    Close {
        session_id: SessionId,
        exit_code: i32,
    },
    CwdChanged {
        session_id: SessionId,
        new_path: PathBuf,
    },
    ServerLog {
        session_id: SessionId,
        message: String,
    },
}

impl IoEvent {
    pub fn output(session_id: SessionId, stream: OutputStream, data: impl Into<String>) -> Self {
        IoEvent::Output {
            session_id,
            stream,
            data: data.into(),
        }
    }

    pub fn error(session_id: SessionId, message: impl Into<String>) -> Self {
        IoEvent::Error {
            session_id,
            message: message.into(),
        }
    }

    pub fn close(session_id: SessionId, exit_code: i32) -> Self {
        IoEvent::Close {
            session_id,
            exit_code,
        }
    }

    pub fn session_id(&self) -> SessionId {
        match self {
            IoEvent::Output { session_id, .. }
            | IoEvent::Error { session_id, .. }
            | IoEvent::Close { session_id, .. }
            | IoEvent::CwdChanged { session_id, .. }
            | IoEvent::ServerLog { session_id, .. } => *session_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            IoEvent::Output { .. } => "output",
            IoEvent::Error { .. } => "error",
            IoEvent::Close { .. } => "close",
            IoEvent::CwdChanged { .. } => "cwd_changed",
            IoEvent::ServerLog { .. } => "server_log",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_event_wire_shape() {
        let event = IoEvent::output(SessionId::new(3), OutputStream::Stderr, "oops\n");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"event": "output", "session_id": 3, "stream": "stderr", "data": "oops\n"})
        );
    }

    #[test]
    fn test_kind_matches_serialized_tag() {
        let events = [
            IoEvent::error(SessionId::new(1), "x"),
            IoEvent::close(SessionId::new(1), 0),
            IoEvent::CwdChanged {
                session_id: SessionId::new(1),
                new_path: PathBuf::from("/tmp"),
            },
            IoEvent::ServerLog {
                session_id: SessionId::new(1),
                message: "GET / 200 1ms".to_string(),
            },
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["event"], event.kind());
            assert_eq!(event.session_id(), SessionId::new(1));
        }
    }
}
