use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;

use crate::domain::history::CommandHistory;
use crate::domain::line_editor::LineEditor;
use crate::domain::session_types::ExecutionState;
use crate::domain::session_types::SessionId;
use crate::domain::session_types::SessionInfo;

/// Mutable per-session state. Process ownership lives in the supervisor;
/// this record only tracks whether a job is in flight.
#[derive(Debug, Clone)]
pub struct TerminalSession {
    id: SessionId,
    cwd: PathBuf,
    state: ExecutionState,
    pending_input: String,
    editor: LineEditor,
    history: CommandHistory,
    opened_at: DateTime<Utc>,
}

impl TerminalSession {
    pub fn new(id: SessionId, cwd: PathBuf, history_limit: usize) -> Self {
        Self {
            id,
            cwd,
            state: ExecutionState::Idle,
            pending_input: String::new(),
            editor: LineEditor::default(),
            history: CommandHistory::new(history_limit),
            opened_at: Utc::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn set_cwd(&mut self, cwd: PathBuf) {
        self.cwd = cwd;
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Moves to `Executing`. Returns false if a job is already in flight.
    pub fn begin_job(&mut self) -> bool {
        if self.state.is_executing() {
            return false;
        }
        self.state = ExecutionState::Executing;
        self.pending_input.clear();
        true
    }

    pub fn finish_job(&mut self) {
        self.state = ExecutionState::Idle;
        self.pending_input.clear();
    }

    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    pub fn pending_input_mut(&mut self) -> &mut String {
        &mut self.pending_input
    }

    pub fn editor(&self) -> &LineEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut LineEditor {
        &mut self.editor
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut CommandHistory {
        &mut self.history
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            cwd: self.cwd.clone(),
            state: self.state,
            history_len: self.history.len(),
            opened_at: self.opened_at,
        }
    }
}
