//! Pure session types and line-editing rules. Nothing in here performs I/O.

pub mod command_line;
pub mod completion;
pub mod events;
pub mod history;
pub mod line_editor;
pub mod sequence;
pub mod session;
pub mod session_types;

pub use command_line::ParsedCommand;
pub use command_line::TokenizerMode;
pub use completion::CompletionAction;
pub use events::IoEvent;
pub use events::OutputStream;
pub use history::CommandHistory;
pub use history::Recall;
pub use line_editor::Key;
pub use line_editor::LineEditor;
pub use sequence::CommandSequence;
pub use sequence::PropertyKind;
pub use session::TerminalSession;
pub use session_types::ExecutionState;
pub use session_types::SessionId;
pub use session_types::SessionInfo;
