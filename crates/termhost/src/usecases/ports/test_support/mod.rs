mod mock_controller;
mod recording_sink;

pub use mock_controller::MockProcessController;
pub use mock_controller::MockScript;
pub use recording_sink::RecordingSink;
