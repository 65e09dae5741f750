use std::sync::Mutex;

use crate::domain::IoEvent;
use crate::domain::SessionId;
use crate::usecases::ports::EventSink;

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<IoEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<IoEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn output_for(&self, session_id: SessionId) -> String {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                IoEvent::Output {
                    session_id: id,
                    data,
                    ..
                } if id == session_id => Some(data),
                _ => None,
            })
            .collect()
    }

    pub fn close_codes(&self, session_id: SessionId) -> Vec<i32> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                IoEvent::Close {
                    session_id: id,
                    exit_code,
                } if id == session_id => Some(exit_code),
                _ => None,
            })
            .collect()
    }

    pub fn errors_for(&self, session_id: SessionId) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                IoEvent::Error {
                    session_id: id,
                    message,
                } if id == session_id => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: IoEvent) {
        self.events.lock().unwrap().push(event);
    }
}
