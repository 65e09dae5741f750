//! Scripted process controller for supervisor and registry tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use tokio::io::DuplexStream;
use tokio::sync::oneshot;

use crate::usecases::ports::ManagedProcess;
use crate::usecases::ports::ProcessController;
use crate::usecases::ports::ProcessError;
use crate::usecases::ports::SignalKind;
use crate::usecases::ports::SignalOutcome;
use crate::usecases::ports::SpawnErrorKind;
use crate::usecases::ports::SpawnRequest;

/// Behaviour of one mocked program.
#[derive(Debug, Clone, Default)]
pub struct MockScript {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: i32,
    wait_for_signal: bool,
    spawn_error: Option<SpawnErrorKind>,
}

impl MockScript {
    pub fn exits(code: i32) -> Self {
        Self {
            exit_code: code,
            ..Self::default()
        }
    }

    /// Runs until signalled, then exits with `128 + signal`.
    pub fn hangs() -> Self {
        Self {
            wait_for_signal: true,
            ..Self::default()
        }
    }

    pub fn fails_to_spawn(kind: SpawnErrorKind) -> Self {
        Self {
            spawn_error: Some(kind),
            ..Self::default()
        }
    }

    pub fn with_stdout(mut self, data: &str) -> Self {
        self.stdout = data.as_bytes().to_vec();
        self
    }

    pub fn with_stderr(mut self, data: &str) -> Self {
        self.stderr = data.as_bytes().to_vec();
        self
    }
}

pub struct MockProcessController {
    scripts: Mutex<HashMap<String, MockScript>>,
    next_pid: AtomicU32,
    spawned: Mutex<Vec<SpawnRequest>>,
    signals: Mutex<Vec<(u32, SignalKind)>>,
    running: Mutex<HashMap<u32, oneshot::Sender<i32>>>,
    stdin: Mutex<HashMap<u32, DuplexStream>>,
}

impl Default for MockProcessController {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProcessController {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            next_pid: AtomicU32::new(1000),
            spawned: Mutex::new(Vec::new()),
            signals: Mutex::new(Vec::new()),
            running: Mutex::new(HashMap::new()),
            stdin: Mutex::new(HashMap::new()),
        }
    }

    /// Unscripted programs exit 0 without output.
    pub fn script(self, program: &str, script: MockScript) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(program.to_string(), script);
        self
    }

    pub fn spawned(&self) -> Vec<SpawnRequest> {
        self.spawned.lock().unwrap().clone()
    }

    pub fn signals(&self) -> Vec<(u32, SignalKind)> {
        self.signals.lock().unwrap().clone()
    }

    /// The read end of the child's stdin pipe.
    pub fn take_stdin(&self, pid: u32) -> Option<DuplexStream> {
        self.stdin.lock().unwrap().remove(&pid)
    }
}

impl ProcessController for MockProcessController {
    fn spawn(&self, request: &SpawnRequest) -> Result<ManagedProcess, ProcessError> {
        self.spawned.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&request.program)
            .cloned()
            .unwrap_or_default();

        if let Some(kind) = script.spawn_error {
            return Err(ProcessError::Spawn {
                program: request.program.clone(),
                reason: "mock spawn failure".to_string(),
                kind,
            });
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let (child_end, test_end) = tokio::io::duplex(4096);
        self.stdin.lock().unwrap().insert(pid, test_end);

        let exit_code = script.exit_code;
        let exit: crate::usecases::ports::ExitFuture = if script.wait_for_signal {
            let (tx, rx) = oneshot::channel();
            self.running.lock().unwrap().insert(pid, tx);
            Box::pin(async move { Ok(rx.await.unwrap_or(137)) })
        } else {
            Box::pin(async move { Ok(exit_code) })
        };

        Ok(ManagedProcess::new(pid, exit)
            .with_stdin(Box::new(child_end))
            .with_stdout(Box::new(std::io::Cursor::new(script.stdout)))
            .with_stderr(Box::new(std::io::Cursor::new(script.stderr))))
    }

    fn signal(&self, pid: u32, kind: SignalKind) -> SignalOutcome {
        self.signals.lock().unwrap().push((pid, kind));
        let signal_number = match kind {
            SignalKind::Interrupt => 2,
            SignalKind::Kill => 9,
        };
        match self.running.lock().unwrap().remove(&pid) {
            Some(tx) => {
                let _ = tx.send(128 + signal_number);
                SignalOutcome::Group
            }
            None => SignalOutcome::Failed,
        }
    }
}
