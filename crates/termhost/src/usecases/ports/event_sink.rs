use std::sync::Arc;

use crate::domain::IoEvent;

/// Destination for session events. Emitting never blocks and never fails;
/// events for receivers that have gone away are dropped.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: IoEvent);
}

pub type EventSinkHandle = Arc<dyn EventSink>;
