//! Native [`ProcessController`] backed by `tokio::process`.

use std::process::ExitStatus;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::usecases::ports::ManagedProcess;
use crate::usecases::ports::ProcessController;
use crate::usecases::ports::ProcessError;
use crate::usecases::ports::SignalKind;
use crate::usecases::ports::SignalOutcome;
use crate::usecases::ports::SpawnErrorKind;
use crate::usecases::ports::SpawnRequest;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

/// The shell that interprets command lines, e.g. `sh -c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    program: String,
    flag: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        if cfg!(windows) {
            Self::new("cmd", "/C")
        } else {
            Self::new("sh", "-c")
        }
    }
}

impl ShellConfig {
    pub fn new(program: impl Into<String>, flag: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            flag: flag.into(),
        }
    }

    /// Accepts `sh`, `bash -lc`, `cmd /C` and similar. A bare program gets
    /// the platform's default flag.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split_whitespace();
        let program = parts.next()?;
        let flag = match parts.next() {
            Some(flag) => flag.to_string(),
            None => Self::default().flag,
        };
        Some(Self::new(program, flag))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn flag(&self) -> &str {
        &self.flag
    }
}

#[derive(Debug, Clone, Default)]
pub struct NativeProcessController {
    shell: ShellConfig,
}

impl NativeProcessController {
    pub fn new(shell: ShellConfig) -> Self {
        Self { shell }
    }

    fn command(&self, request: &SpawnRequest) -> Command {
        let mut command = Command::new(&self.shell.program);
        command
            .arg(&self.shell.flag)
            .arg(&request.command_line)
            .current_dir(&request.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        command.process_group(0);
        command
    }
}

impl ProcessController for NativeProcessController {
    #[tracing::instrument(skip(self, request), fields(program = %request.program))]
    fn spawn(&self, request: &SpawnRequest) -> Result<ManagedProcess, ProcessError> {
        let mut child = self
            .command(request)
            .spawn()
            .map_err(|err| ProcessError::Spawn {
                program: request.program.clone(),
                reason: err.to_string(),
                kind: SpawnErrorKind::from_io(err.kind()),
            })?;

        let pid = child.id().ok_or_else(|| ProcessError::Spawn {
            program: request.program.clone(),
            reason: "process exited before its pid was read".to_string(),
            kind: SpawnErrorKind::Other,
        })?;
        debug!(pid, cwd = %request.cwd.display(), "Spawned child");

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let exit = Box::pin(async move {
            child
                .wait()
                .await
                .map(exit_code_from_status)
                .map_err(|err| ProcessError::Wait {
                    pid,
                    reason: err.to_string(),
                })
        });

        let mut process = ManagedProcess::new(pid, exit);
        if let Some(stdin) = stdin {
            process = process.with_stdin(Box::new(stdin));
        }
        if let Some(stdout) = stdout {
            process = process.with_stdout(Box::new(stdout));
        }
        if let Some(stderr) = stderr {
            process = process.with_stderr(Box::new(stderr));
        }
        Ok(process)
    }

    fn signal(&self, pid: u32, kind: SignalKind) -> SignalOutcome {
        #[cfg(unix)]
        {
            unix::signal(pid, kind)
        }
        #[cfg(windows)]
        {
            windows::signal(pid, kind)
        }
        #[cfg(not(any(unix, windows)))]
        {
            tracing::warn!(pid, ?kind, "Signals are not supported on this platform");
            SignalOutcome::Failed
        }
    }
}

/// Exit code of a finished child; POSIX children killed by a signal report
/// `128 + signal`.
pub fn exit_code_from_status(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
