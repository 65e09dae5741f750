//! Runs one command per session and streams its output as events.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use termhost_common::mutex_lock_or_recover;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::domain::IoEvent;
use crate::domain::OutputStream;
use crate::domain::ParsedCommand;
use crate::domain::SessionId;
use crate::domain::TokenizerMode;
use crate::domain::command_line::parse_command;
use crate::domain::command_line::resolve_cd_target;
use crate::usecases::ports::EventSinkHandle;
use crate::usecases::ports::ManagedProcess;
use crate::usecases::ports::ProcessControllerHandle;
use crate::usecases::ports::ProcessReader;
use crate::usecases::ports::ProcessWriter;
use crate::usecases::ports::SignalKind;
use crate::usecases::ports::SpawnRequest;
use crate::usecases::ports::SupervisorError;

const READ_CHUNK_SIZE: usize = 8192;
/// How long output readers may keep going after the process exited, e.g.
/// while a backgrounded grandchild still holds the pipe.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    pub exit_code: i32,
    /// Set when the command was a successful `cd`.
    pub cwd: Option<PathBuf>,
}

impl CommandOutcome {
    pub fn exited(exit_code: i32) -> Self {
        Self {
            exit_code,
            cwd: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SupervisorOptions {
    pub tokenizer: TokenizerMode,
    pub home_dir: Option<PathBuf>,
}

struct LiveProcess {
    pid: u32,
    stdin: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

/// Owns the session -> live process map. An entry exists from the moment
/// the child is spawned until its exit has been observed and its output
/// drained.
pub struct ProcessSupervisor {
    controller: ProcessControllerHandle,
    events: EventSinkHandle,
    options: SupervisorOptions,
    processes: Mutex<HashMap<SessionId, LiveProcess>>,
}

impl ProcessSupervisor {
    pub fn new(
        controller: ProcessControllerHandle,
        events: EventSinkHandle,
        options: SupervisorOptions,
    ) -> Self {
        Self {
            controller,
            events,
            options,
            processes: Mutex::new(HashMap::new()),
        }
    }

    pub async fn run_command(
        &self,
        session_id: SessionId,
        command_line: &str,
        cwd: &Path,
    ) -> Result<CommandOutcome, SupervisorError> {
        self.run_cancellable(session_id, command_line, cwd, &CancellationToken::new())
            .await
    }

    /// Like [`Self::run_command`], but nothing is spawned once `cancel` has
    /// fired. The token is checked under the process-map lock, so a
    /// `cancel()` followed by [`Self::kill`] either prevents the spawn or
    /// reaches the spawned process.
    #[tracing::instrument(skip(self, cwd, cancel), fields(session = %session_id))]
    pub async fn run_cancellable(
        &self,
        session_id: SessionId,
        command_line: &str,
        cwd: &Path,
        cancel: &CancellationToken,
    ) -> Result<CommandOutcome, SupervisorError> {
        if cancel.is_cancelled() {
            debug!("Job cancelled before start");
            return Err(SupervisorError::Cancelled(session_id));
        }
        let parsed = match parse_command(command_line, self.options.tokenizer) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.events.emit(IoEvent::error(session_id, err.to_string()));
                return Err(err.into());
            }
        };

        match parsed {
            ParsedCommand::Empty => Ok(CommandOutcome::exited(0)),
            ParsedCommand::ChangeDirectory { target } => {
                Ok(self.change_directory(session_id, &target, cwd))
            }
            ParsedCommand::Program {
                program,
                args,
                command_line,
            } => {
                let request = SpawnRequest {
                    program,
                    args,
                    command_line,
                    cwd: cwd.to_path_buf(),
                };
                self.spawn_and_wait(session_id, &request, cancel)
                    .await
                    .map(CommandOutcome::exited)
            }
        }
    }

    fn change_directory(&self, session_id: SessionId, target: &str, cwd: &Path) -> CommandOutcome {
        let resolved = resolve_cd_target(target, cwd, self.options.home_dir.as_deref());
        let shown = if target.is_empty() { "~" } else { target };
        match std::fs::metadata(&resolved) {
            Ok(meta) if meta.is_dir() => {
                debug!(session = %session_id, path = %resolved.display(), "Directory changed");
                self.events.emit(IoEvent::CwdChanged {
                    session_id,
                    new_path: resolved.clone(),
                });
                CommandOutcome {
                    exit_code: 0,
                    cwd: Some(resolved),
                }
            }
            Ok(_) => {
                self.events.emit(IoEvent::error(
                    session_id,
                    format!("cd: not a directory: {shown}"),
                ));
                CommandOutcome::exited(0)
            }
            Err(_) => {
                self.events.emit(IoEvent::error(
                    session_id,
                    format!("cd: no such file or directory: {shown}"),
                ));
                CommandOutcome::exited(0)
            }
        }
    }

    async fn spawn_and_wait(
        &self,
        session_id: SessionId,
        request: &SpawnRequest,
        cancel: &CancellationToken,
    ) -> Result<i32, SupervisorError> {
        let mut process = match self.register(session_id, request, cancel) {
            Ok(process) => process,
            Err(err) => {
                if let SupervisorError::Process(process_err) = &err {
                    warn!(
                        session = %session_id,
                        program = %request.program,
                        error = %process_err,
                        "Failed to spawn process"
                    );
                    self.events.emit(IoEvent::error(session_id, process_err.to_string()));
                }
                return Err(err);
            }
        };

        let pid = process.pid();
        debug!(session = %session_id, pid, command = %request.command_line, "Process spawned");

        let readers: Vec<JoinHandle<()>> = [
            (process.take_stdout(), OutputStream::Stdout),
            (process.take_stderr(), OutputStream::Stderr),
        ]
        .into_iter()
        .filter_map(|(reader, stream)| {
            reader.map(|reader| {
                tokio::spawn(pump_output(
                    reader,
                    session_id,
                    stream,
                    Arc::clone(&self.events),
                ))
            })
        })
        .collect();

        let exit = process.wait().await;
        drain_readers(readers).await;
        self.deregister(session_id, pid);

        match exit {
            Ok(code) => {
                debug!(session = %session_id, pid, exit_code = code, "Process exited");
                Ok(code)
            }
            Err(err) => {
                warn!(session = %session_id, pid, error = %err, "Failed to observe process exit");
                self.events.emit(IoEvent::error(session_id, err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Spawns and registers under one lock so no output can be read before
    /// the session owns the process.
    fn register(
        &self,
        session_id: SessionId,
        request: &SpawnRequest,
        cancel: &CancellationToken,
    ) -> Result<ManagedProcess, SupervisorError> {
        let mut processes = mutex_lock_or_recover(&self.processes);
        if cancel.is_cancelled() {
            debug!(session = %session_id, program = %request.program, "Spawn skipped; job cancelled");
            return Err(SupervisorError::Cancelled(session_id));
        }
        if processes.contains_key(&session_id) {
            return Err(SupervisorError::Busy(session_id));
        }
        let mut process = self.controller.spawn(request)?;
        let stdin = process.take_stdin().map(spawn_stdin_forwarder);
        processes.insert(
            session_id,
            LiveProcess {
                pid: process.pid(),
                stdin,
            },
        );
        Ok(process)
    }

    fn deregister(&self, session_id: SessionId, pid: u32) {
        let mut processes = mutex_lock_or_recover(&self.processes);
        if processes.get(&session_id).is_some_and(|live| live.pid == pid) {
            processes.remove(&session_id);
        }
    }

    /// Queues `data` for the session's process. Returns false when there is
    /// no live process with an open stdin.
    pub fn write_stdin(&self, session_id: SessionId, data: &[u8]) -> bool {
        let processes = mutex_lock_or_recover(&self.processes);
        processes
            .get(&session_id)
            .and_then(|live| live.stdin.as_ref())
            .is_some_and(|stdin| stdin.send(data.to_vec()).is_ok())
    }

    /// Signals the session's process. Returns false when nothing is live or
    /// the signal could not be delivered.
    #[tracing::instrument(skip(self), fields(session = %session_id))]
    pub fn kill(&self, session_id: SessionId, kind: SignalKind) -> bool {
        let Some(pid) = self.live_pid(session_id) else {
            debug!("No live process to signal");
            return false;
        };
        self.controller.signal(pid, kind).delivered()
    }

    /// Force-kills every live process. Returns how many were reached.
    pub fn kill_all(&self) -> usize {
        let targets: Vec<(SessionId, u32)> = mutex_lock_or_recover(&self.processes)
            .iter()
            .map(|(session_id, live)| (*session_id, live.pid))
            .collect();

        let mut reached = 0;
        for (session_id, pid) in targets {
            if self.controller.force_kill(pid).delivered() {
                reached += 1;
            } else {
                warn!(session = %session_id, pid, "Could not terminate process during shutdown");
            }
        }
        reached
    }

    pub fn has_live_process(&self, session_id: SessionId) -> bool {
        mutex_lock_or_recover(&self.processes).contains_key(&session_id)
    }

    pub fn live_pid(&self, session_id: SessionId) -> Option<u32> {
        mutex_lock_or_recover(&self.processes)
            .get(&session_id)
            .map(|live| live.pid)
    }

    pub fn live_count(&self) -> usize {
        mutex_lock_or_recover(&self.processes).len()
    }
}

fn spawn_stdin_forwarder(mut writer: ProcessWriter) -> mpsc::UnboundedSender<Vec<u8>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    tokio::spawn(async move {
        while let Some(bytes) = rx.recv().await {
            if let Err(err) = writer.write_all(&bytes).await {
                debug!(error = %err, "Child stdin closed");
                return;
            }
            if writer.flush().await.is_err() {
                return;
            }
        }
        let _ = writer.shutdown().await;
    });
    tx
}

async fn pump_output(
    mut reader: ProcessReader,
    session_id: SessionId,
    stream: OutputStream,
    events: EventSinkHandle,
) {
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    let mut decoder = Utf8Chunker::default();
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let text = decoder.push(&buf[..n]);
                if !text.is_empty() {
                    events.emit(IoEvent::output(session_id, stream, text));
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!(session = %session_id, ?stream, error = %err, "Output read failed");
                break;
            }
        }
    }
    let rest = decoder.finish();
    if !rest.is_empty() {
        events.emit(IoEvent::output(session_id, stream, rest));
    }
}

async fn drain_readers(readers: Vec<JoinHandle<()>>) {
    let deadline = tokio::time::Instant::now() + OUTPUT_DRAIN_TIMEOUT;
    for mut reader in readers {
        if tokio::time::timeout_at(deadline, &mut reader).await.is_err() {
            debug!("Output still open after exit; detaching reader");
            reader.abort();
        }
    }
}

/// Decodes a byte stream chunk by chunk without splitting multi-byte
/// characters across events.
#[derive(Debug, Default)]
struct Utf8Chunker {
    pending: Vec<u8>,
}

impl Utf8Chunker {
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let split = incomplete_tail_start(&self.pending);
        let text = String::from_utf8_lossy(&self.pending[..split]).into_owned();
        self.pending.drain(..split);
        text
    }

    fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

fn incomplete_tail_start(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(3) {
        let byte = bytes[len - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let needed = match byte {
            0xF0..=0xFF => 4,
            0xE0..=0xEF => 3,
            0xC0..=0xDF => 2,
            _ => 1,
        };
        return if needed > back { len - back } else { len };
    }
    len
}
