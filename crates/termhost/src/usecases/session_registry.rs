//! Owns every terminal session and routes input to the supervisor.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Serialize;
use termhost_common::mutex_lock_or_recover;
use termhost_common::rwlock_read_or_recover;
use termhost_common::rwlock_write_or_recover;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::domain::CommandSequence;
use crate::domain::CompletionAction;
use crate::domain::ExecutionState;
use crate::domain::IoEvent;
use crate::domain::Key;
use crate::domain::Recall;
use crate::domain::SessionId;
use crate::domain::SessionInfo;
use crate::domain::TerminalSession;
use crate::domain::command_line::normalize_lexically;
use crate::domain::completion::apply_completions;
use crate::domain::completion::word_before_cursor;
use crate::domain::history::DEFAULT_HISTORY_LIMIT;
use crate::usecases::autocomplete::AutocompleteResolver;
use crate::usecases::ports::EventSinkHandle;
use crate::usecases::ports::SessionError;
use crate::usecases::ports::SignalKind;
use crate::usecases::ports::SupervisorError;
use crate::usecases::sequence_runner::SequenceRunner;
use crate::usecases::supervisor::ProcessSupervisor;

pub const DEFAULT_MAX_SESSIONS: usize = 16;

type SessionCell = Arc<Mutex<TerminalSession>>;

/// A session plus the token that stops its queued and future jobs.
#[derive(Clone)]
struct SessionEntry {
    cell: SessionCell,
    cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryOptions {
    pub max_sessions: usize,
    pub history_limit: usize,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// A command or sequence running in the background. Dropping the handle
/// detaches the job; completion is still reported as a `Close` event.
pub struct JobHandle {
    session_id: SessionId,
    handle: JoinHandle<i32>,
}

impl JobHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub async fn wait(self) -> i32 {
        match self.handle.await {
            Ok(code) => code,
            Err(err) => {
                warn!(session = %self.session_id, error = %err, "Job task failed");
                SupervisorError::EXIT_CODE
            }
        }
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("session_id", &self.session_id)
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

#[derive(Debug)]
pub enum DispatchOutcome {
    /// Blank line while idle.
    Ignored,
    /// The session was busy; the line went to the running process.
    Forwarded { delivered: bool },
    Started(JobHandle),
}

/// What the front-end should render after a key press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum KeyOutcome {
    Redraw { line: String, cursor: usize },
    /// Show a fresh prompt on a new line.
    Prompt,
    Submitted { command: String },
    Candidates {
        names: Vec<String>,
        line: String,
        cursor: usize,
    },
    /// Input buffered for the running process.
    Pending { buffer: String },
    Forwarded { data: String, delivered: bool },
    Interrupted { delivered: bool },
    Ignored,
}

pub struct TerminalSessionRegistry {
    sessions: RwLock<BTreeMap<SessionId, SessionEntry>>,
    /// Parent of every session token; cancelled on shutdown.
    jobs: CancellationToken,
    next_id: AtomicU64,
    supervisor: Arc<ProcessSupervisor>,
    sequences: Arc<SequenceRunner>,
    autocomplete: AutocompleteResolver,
    events: EventSinkHandle,
    options: RegistryOptions,
}

impl TerminalSessionRegistry {
    pub fn new(
        supervisor: Arc<ProcessSupervisor>,
        events: EventSinkHandle,
        options: RegistryOptions,
    ) -> Self {
        let sequences = Arc::new(SequenceRunner::new(
            Arc::clone(&supervisor),
            Arc::clone(&events),
        ));
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            jobs: CancellationToken::new(),
            next_id: AtomicU64::new(1),
            supervisor,
            sequences,
            autocomplete: AutocompleteResolver,
            events,
            options,
        }
    }

    fn get(&self, session_id: SessionId) -> Result<SessionCell, SessionError> {
        self.entry(session_id).map(|entry| entry.cell)
    }

    fn entry(&self, session_id: SessionId) -> Result<SessionEntry, SessionError> {
        rwlock_read_or_recover(&self.sessions)
            .get(&session_id)
            .cloned()
            .ok_or(SessionError::NotFound(session_id))
    }

    fn absolute_dir(path: &Path) -> Result<PathBuf, SessionError> {
        let invalid = || SessionError::InvalidDirectory {
            path: path.to_path_buf(),
        };
        let absolute = std::path::absolute(path).map_err(|_| invalid())?;
        let absolute = normalize_lexically(&absolute);
        if !absolute.is_dir() {
            return Err(invalid());
        }
        Ok(absolute)
    }

    #[tracing::instrument(skip(self))]
    pub fn open_session(&self, cwd: &Path) -> Result<SessionId, SessionError> {
        let cwd = Self::absolute_dir(cwd)?;
        let mut sessions = rwlock_write_or_recover(&self.sessions);
        if sessions.len() >= self.options.max_sessions {
            return Err(SessionError::LimitReached(self.options.max_sessions));
        }
        let session_id = SessionId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let session = TerminalSession::new(session_id, cwd, self.options.history_limit);
        sessions.insert(
            session_id,
            SessionEntry {
                cell: Arc::new(Mutex::new(session)),
                cancel: self.jobs.child_token(),
            },
        );
        info!(session = %session_id, "Session opened");
        Ok(session_id)
    }

    /// Removes the session. Jobs that have not spawned yet never will; a
    /// live process is force-killed.
    #[tracing::instrument(skip(self), fields(session = %session_id))]
    pub fn close_session(&self, session_id: SessionId) -> Result<(), SessionError> {
        let entry = rwlock_write_or_recover(&self.sessions)
            .remove(&session_id)
            .ok_or(SessionError::NotFound(session_id))?;
        entry.cancel.cancel();
        if self.supervisor.kill(session_id, SignalKind::Kill) {
            debug!("Killed live process on close");
        }
        info!("Session closed");
        Ok(())
    }

    pub fn session_info(&self, session_id: SessionId) -> Result<SessionInfo, SessionError> {
        let session = self.get(session_id)?;
        let info = mutex_lock_or_recover(&session).info();
        Ok(info)
    }

    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        let cells: Vec<SessionCell> = rwlock_read_or_recover(&self.sessions)
            .values()
            .map(|entry| entry.cell.clone())
            .collect();
        cells
            .iter()
            .map(|cell| mutex_lock_or_recover(cell).info())
            .collect()
    }

    pub fn state(&self, session_id: SessionId) -> Result<ExecutionState, SessionError> {
        let session = self.get(session_id)?;
        let state = mutex_lock_or_recover(&session).state();
        Ok(state)
    }

    pub fn history(&self, session_id: SessionId) -> Result<Vec<String>, SessionError> {
        let session = self.get(session_id)?;
        let entries = mutex_lock_or_recover(&session).history().entries().to_vec();
        Ok(entries)
    }

    pub fn has_live_process(&self, session_id: SessionId) -> bool {
        self.supervisor.has_live_process(session_id)
    }

    pub fn live_process_count(&self) -> usize {
        self.supervisor.live_count()
    }

    /// Explicit directory change from the front-end; refused while a job
    /// is in flight.
    #[tracing::instrument(skip(self), fields(session = %session_id))]
    pub fn change_directory(
        &self,
        session_id: SessionId,
        path: &Path,
    ) -> Result<PathBuf, SessionError> {
        let session = self.get(session_id)?;
        let mut session = mutex_lock_or_recover(&session);
        if session.state().is_executing() {
            return Err(SessionError::Busy(session_id));
        }
        let resolved = Self::absolute_dir(&session.cwd().join(path))?;
        session.set_cwd(resolved.clone());
        drop(session);
        self.events.emit(IoEvent::CwdChanged {
            session_id,
            new_path: resolved.clone(),
        });
        Ok(resolved)
    }

    fn begin_job(
        &self,
        session_id: SessionId,
        cwd: Option<PathBuf>,
    ) -> Result<(SessionEntry, PathBuf), SessionError> {
        let entry = self.entry(session_id)?;
        let work_dir = {
            let mut session = mutex_lock_or_recover(&entry.cell);
            if !session.begin_job() {
                return Err(SessionError::Busy(session_id));
            }
            cwd.unwrap_or_else(|| session.cwd().to_path_buf())
        };
        Ok((entry, work_dir))
    }

    /// Starts `command_line` in the background. `cwd` overrides the session
    /// directory for this command only; a successful `cd` still updates the
    /// session.
    #[tracing::instrument(skip(self, cwd), fields(session = %session_id))]
    pub fn run_command(
        &self,
        session_id: SessionId,
        command_line: &str,
        cwd: Option<PathBuf>,
    ) -> Result<JobHandle, SessionError> {
        let (SessionEntry { cell, cancel }, work_dir) = self.begin_job(session_id, cwd)?;
        let supervisor = Arc::clone(&self.supervisor);
        let events = Arc::clone(&self.events);
        let command_line = command_line.to_string();

        let handle = tokio::spawn(async move {
            let exit_code = match supervisor
                .run_cancellable(session_id, &command_line, &work_dir, &cancel)
                .await
            {
                Ok(outcome) => {
                    if let Some(next) = outcome.cwd {
                        mutex_lock_or_recover(&cell).set_cwd(next);
                    }
                    outcome.exit_code
                }
                Err(err) => {
                    debug!(session = %session_id, error = %err, "Command did not run");
                    err.exit_code()
                }
            };
            mutex_lock_or_recover(&cell).finish_job();
            events.emit(IoEvent::close(session_id, exit_code));
            exit_code
        });

        Ok(JobHandle { session_id, handle })
    }

    #[tracing::instrument(skip(self, commands, cwd), fields(session = %session_id, steps = commands.len()))]
    pub fn run_sequence(
        &self,
        session_id: SessionId,
        commands: Vec<String>,
        cwd: Option<PathBuf>,
    ) -> Result<JobHandle, SessionError> {
        let (entry, work_dir) = self.begin_job(session_id, cwd)?;
        let sequence = CommandSequence::new(session_id, commands, work_dir);
        Ok(self.spawn_sequence(entry, sequence))
    }

    /// Runs the commands of a property file against `target`, in the
    /// target's directory.
    #[tracing::instrument(skip(self, contents), fields(session = %session_id))]
    pub fn run_property_file(
        &self,
        session_id: SessionId,
        contents: &str,
        target: &Path,
    ) -> Result<JobHandle, SessionError> {
        let (entry, _) = self.begin_job(session_id, None)?;
        let sequence = CommandSequence::from_property_file(session_id, contents, target);
        Ok(self.spawn_sequence(entry, sequence))
    }

    fn spawn_sequence(&self, entry: SessionEntry, sequence: CommandSequence) -> JobHandle {
        let SessionEntry { cell, cancel } = entry;
        let session_id = sequence.session_id();
        let runner = Arc::clone(&self.sequences);
        let events = Arc::clone(&self.events);

        let handle = tokio::spawn(async move {
            let outcome = runner.run_steps(&sequence, &cancel).await;
            {
                let mut session = mutex_lock_or_recover(&cell);
                if outcome.cwd != sequence.cwd() {
                    session.set_cwd(outcome.cwd.clone());
                }
                session.finish_job();
            }
            events.emit(IoEvent::close(session_id, outcome.exit_code));
            outcome.exit_code
        });

        JobHandle { session_id, handle }
    }

    /// Submits a line as if typed at the prompt: forwarded to the running
    /// process when busy, otherwise recorded in history and started.
    #[tracing::instrument(skip(self, line), fields(session = %session_id))]
    pub fn dispatch(&self, session_id: SessionId, line: &str) -> Result<DispatchOutcome, SessionError> {
        let cell = self.get(session_id)?;
        {
            let mut session = mutex_lock_or_recover(&cell);
            if session.state().is_executing() {
                drop(session);
                let data = format!("{line}\n");
                let delivered = self.supervisor.write_stdin(session_id, data.as_bytes());
                return Ok(DispatchOutcome::Forwarded { delivered });
            }
            if line.trim().is_empty() {
                return Ok(DispatchOutcome::Ignored);
            }
            session.history_mut().record(line);
        }
        self.run_command(session_id, line, None)
            .map(DispatchOutcome::Started)
    }

    pub fn write_stdin(&self, session_id: SessionId, data: &str) -> Result<bool, SessionError> {
        self.get(session_id)?;
        Ok(self.supervisor.write_stdin(session_id, data.as_bytes()))
    }

    /// Sends an interrupt to the session's process. A no-op when idle.
    #[tracing::instrument(skip(self), fields(session = %session_id))]
    pub fn kill_process(&self, session_id: SessionId) -> Result<bool, SessionError> {
        self.get(session_id)?;
        Ok(self.supervisor.kill(session_id, SignalKind::Interrupt))
    }

    pub fn autocomplete(
        &self,
        session_id: SessionId,
        partial: &str,
        cwd: Option<PathBuf>,
    ) -> Result<Vec<String>, SessionError> {
        let cell = self.get(session_id)?;
        let cwd = cwd.unwrap_or_else(|| mutex_lock_or_recover(&cell).cwd().to_path_buf());
        Ok(self.autocomplete.complete(session_id, partial, &cwd))
    }

    /// Applies one key press to the session's line editor, or to its pending
    /// input while a job runs.
    pub fn handle_key(&self, session_id: SessionId, key: Key) -> Result<KeyOutcome, SessionError> {
        let cell = self.get(session_id)?;
        let mut session = mutex_lock_or_recover(&cell);

        if session.state().is_executing() {
            return Ok(match key {
                Key::Char(ch) => {
                    session.pending_input_mut().push(ch);
                    KeyOutcome::Pending {
                        buffer: session.pending_input().to_string(),
                    }
                }
                Key::Backspace => {
                    session.pending_input_mut().pop();
                    KeyOutcome::Pending {
                        buffer: session.pending_input().to_string(),
                    }
                }
                Key::Enter => {
                    let data = format!("{}\n", std::mem::take(session.pending_input_mut()));
                    drop(session);
                    let delivered = self.supervisor.write_stdin(session_id, data.as_bytes());
                    KeyOutcome::Forwarded { data, delivered }
                }
                Key::CtrlC => {
                    drop(session);
                    KeyOutcome::Interrupted {
                        delivered: self.supervisor.kill(session_id, SignalKind::Interrupt),
                    }
                }
                _ => KeyOutcome::Ignored,
            });
        }

        match key {
            Key::Char(ch) => session.editor_mut().insert(ch),
            Key::Backspace => {
                session.editor_mut().backspace();
            }
            Key::Left => {
                session.editor_mut().move_left();
            }
            Key::Right => {
                session.editor_mut().move_right();
            }
            Key::Up | Key::Down => {
                let recall = if key == Key::Up {
                    session.history_mut().older()
                } else {
                    session.history_mut().newer()
                };
                match recall {
                    Recall::Entry(entry) => session.editor_mut().set_line(entry),
                    Recall::Cleared => session.editor_mut().clear(),
                    Recall::Unchanged => return Ok(KeyOutcome::Ignored),
                }
            }
            Key::Tab => {
                let Some(word) = word_before_cursor(session.editor().before_cursor()) else {
                    return Ok(KeyOutcome::Ignored);
                };
                let candidates =
                    self.autocomplete
                        .complete(session_id, &word.partial, session.cwd());
                match apply_completions(&word.partial, &candidates) {
                    CompletionAction::Replace(text) => {
                        session.editor_mut().replace_before_cursor(word.start, &text);
                    }
                    CompletionAction::List(names) => {
                        return Ok(KeyOutcome::Candidates {
                            names,
                            line: session.editor().line().to_string(),
                            cursor: session.editor().cursor(),
                        });
                    }
                    CompletionAction::Nothing => return Ok(KeyOutcome::Ignored),
                }
            }
            Key::Enter => {
                let line = session.editor_mut().take_line();
                session.history_mut().reset_cursor();
                drop(session);
                return match self.dispatch(session_id, &line)? {
                    DispatchOutcome::Started(_) => Ok(KeyOutcome::Submitted { command: line }),
                    DispatchOutcome::Ignored | DispatchOutcome::Forwarded { .. } => {
                        Ok(KeyOutcome::Prompt)
                    }
                };
            }
            Key::CtrlC => {
                session.editor_mut().clear();
                session.history_mut().reset_cursor();
                return Ok(KeyOutcome::Prompt);
            }
        }

        Ok(KeyOutcome::Redraw {
            line: session.editor().line().to_string(),
            cursor: session.editor().cursor(),
        })
    }

    /// Stops every job, force-kills every live process and forgets all
    /// sessions. Jobs started afterwards are refused before they spawn.
    pub fn shutdown(&self) -> usize {
        self.jobs.cancel();
        let killed = self.supervisor.kill_all();
        rwlock_write_or_recover(&self.sessions).clear();
        info!(killed, "Session registry shut down");
        killed
    }
}
