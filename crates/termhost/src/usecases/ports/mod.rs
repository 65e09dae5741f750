pub mod errors;
pub mod event_sink;
pub mod process_controller;
#[cfg(test)]
pub(crate) mod test_support;

pub use errors::{ProcessError, SessionError, SpawnErrorKind, SupervisorError};
pub use event_sink::{EventSink, EventSinkHandle};
pub use process_controller::{
    ExitFuture, ManagedProcess, ProcessController, ProcessControllerHandle, ProcessReader,
    ProcessWriter, SignalKind, SignalOutcome, SpawnRequest,
};
