use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;

use crate::usecases::ports::errors::ProcessError;

pub type ProcessReader = Box<dyn AsyncRead + Send + Unpin>;
pub type ProcessWriter = Box<dyn AsyncWrite + Send + Unpin>;
/// Resolves with the exit code once the process has terminated.
pub type ExitFuture = Pin<Box<dyn Future<Output = Result<i32, ProcessError>> + Send>>;

/// A command line to run through the platform shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    pub program: String,
    pub args: Vec<String>,
    pub command_line: String,
    pub cwd: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// User interrupt (Ctrl+C): SIGINT on POSIX.
    Interrupt,
    /// Forced termination for shutdown and session close.
    Kill,
}

/// How far a signal got. Failures are already logged by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// Delivered to the whole process group.
    Group,
    /// Group delivery failed; delivered to the process alone.
    Process,
    /// Process tree terminated (Windows).
    Tree,
    Failed,
}

impl SignalOutcome {
    pub fn delivered(self) -> bool {
        !matches!(self, SignalOutcome::Failed)
    }
}

/// A spawned child: its pid, piped stdio and a future for its exit code.
/// The supervisor takes the pipes before awaiting the exit.
pub struct ManagedProcess {
    pid: u32,
    stdin: Option<ProcessWriter>,
    stdout: Option<ProcessReader>,
    stderr: Option<ProcessReader>,
    exit: ExitFuture,
}

impl ManagedProcess {
    pub fn new(pid: u32, exit: ExitFuture) -> Self {
        Self {
            pid,
            stdin: None,
            stdout: None,
            stderr: None,
            exit,
        }
    }

    pub fn with_stdin(mut self, stdin: ProcessWriter) -> Self {
        self.stdin = Some(stdin);
        self
    }

    pub fn with_stdout(mut self, stdout: ProcessReader) -> Self {
        self.stdout = Some(stdout);
        self
    }

    pub fn with_stderr(mut self, stderr: ProcessReader) -> Self {
        self.stderr = Some(stderr);
        self
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn take_stdin(&mut self) -> Option<ProcessWriter> {
        self.stdin.take()
    }

    pub fn take_stdout(&mut self) -> Option<ProcessReader> {
        self.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ProcessReader> {
        self.stderr.take()
    }

    pub async fn wait(self) -> Result<i32, ProcessError> {
        self.exit.await
    }
}

impl fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("pid", &self.pid)
            .field("stdin", &self.stdin.is_some())
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .finish_non_exhaustive()
    }
}

/// Per-OS strategy for starting and signalling children.
pub trait ProcessController: Send + Sync {
    fn spawn(&self, request: &SpawnRequest) -> Result<ManagedProcess, ProcessError>;

    /// Never fails: fallbacks are attempted and a final failure is logged.
    fn signal(&self, pid: u32, kind: SignalKind) -> SignalOutcome;

    fn force_kill(&self, pid: u32) -> SignalOutcome {
        self.signal(pid, SignalKind::Kill)
    }
}

pub type ProcessControllerHandle = Arc<dyn ProcessController>;
