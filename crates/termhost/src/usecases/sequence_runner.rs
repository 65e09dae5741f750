use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use termhost_common::Tint;
use termhost_common::tint;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::domain::CommandSequence;
use crate::domain::IoEvent;
use crate::domain::OutputStream;
use crate::usecases::ports::EventSinkHandle;
use crate::usecases::ports::SupervisorError;
use crate::usecases::supervisor::ProcessSupervisor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceOutcome {
    pub exit_code: i32,
    /// Steps that ran and exited 0.
    pub completed: usize,
    pub total: usize,
    /// Working directory after the last step, including any `cd`.
    pub cwd: PathBuf,
}

/// Runs a [`CommandSequence`] step by step and stops at the first failure.
pub struct SequenceRunner {
    supervisor: Arc<ProcessSupervisor>,
    events: EventSinkHandle,
}

impl SequenceRunner {
    pub fn new(supervisor: Arc<ProcessSupervisor>, events: EventSinkHandle) -> Self {
        Self { supervisor, events }
    }

    /// Emits exactly one `Close` event carrying the final exit code: 0 when
    /// every step succeeded, otherwise the code of the failing step (1 when
    /// it could not be started).
    pub async fn run_sequence(&self, sequence: &CommandSequence) -> SequenceOutcome {
        let outcome = self.run_steps(sequence, &CancellationToken::new()).await;
        self.events
            .emit(IoEvent::close(sequence.session_id(), outcome.exit_code));
        outcome
    }

    /// Like [`Self::run_sequence`] but leaves the `Close` event to the
    /// caller, which may need to update session state first. No step starts
    /// after `cancel` fires.
    #[tracing::instrument(
        skip(self, sequence, cancel),
        fields(session = %sequence.session_id(), steps = sequence.len())
    )]
    pub async fn run_steps(
        &self,
        sequence: &CommandSequence,
        cancel: &CancellationToken,
    ) -> SequenceOutcome {
        let session_id = sequence.session_id();
        let mut cwd = sequence.cwd().to_path_buf();
        let mut exit_code = 0;
        let mut completed = 0;

        for command in sequence.commands() {
            if cancel.is_cancelled() {
                debug!(session = %session_id, remaining = sequence.len() - completed, "Sequence cancelled");
                exit_code = SupervisorError::CANCELLED_EXIT_CODE;
                break;
            }
            if sequence.echo_commands() {
                self.events.emit(IoEvent::output(
                    session_id,
                    OutputStream::Stdout,
                    format!("{}\r\n", tint(&format!("> {command}"), Tint::Cyan)),
                ));
            }

            match self
                .supervisor
                .run_cancellable(session_id, command, &cwd, cancel)
                .await
            {
                Ok(outcome) => {
                    if let Some(next) = outcome.cwd {
                        cwd = next;
                    }
                    exit_code = outcome.exit_code;
                }
                Err(err) => {
                    warn!(session = %session_id, command = %command, error = %err, "Sequence step failed to run");
                    exit_code = err.exit_code();
                }
            }

            if exit_code != 0 {
                info!(
                    session = %session_id,
                    step = completed + 1,
                    exit_code,
                    "Sequence aborted"
                );
                break;
            }
            completed += 1;
        }

        SequenceOutcome {
            exit_code,
            completed,
            total: sequence.len(),
            cwd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SessionId;
    use crate::usecases::ports::SpawnErrorKind;
    use crate::usecases::ports::test_support::{MockProcessController, MockScript, RecordingSink};
    use crate::usecases::supervisor::SupervisorOptions;

    fn runner_with(
        controller: MockProcessController,
    ) -> (SequenceRunner, Arc<MockProcessController>, Arc<RecordingSink>) {
        let controller = Arc::new(controller);
        let sink = Arc::new(RecordingSink::default());
        let supervisor = Arc::new(ProcessSupervisor::new(
            controller.clone(),
            sink.clone(),
            SupervisorOptions::default(),
        ));
        (SequenceRunner::new(supervisor, sink.clone()), controller, sink)
    }

    fn sequence(commands: &[&str]) -> CommandSequence {
        CommandSequence::new(
            SessionId::new(1),
            commands.iter().map(|c| c.to_string()).collect(),
            PathBuf::from("/"),
        )
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let controller = MockProcessController::new().script("false", MockScript::exits(1));
        let (runner, controller, sink) = runner_with(controller);

        let outcome = runner.run_sequence(&sequence(&["true", "false", "true"])).await;

        assert_eq!(outcome.exit_code, 1);
        assert_eq!(outcome.completed, 1);
        assert_eq!(outcome.total, 3);
        let programs: Vec<String> = controller.spawned().into_iter().map(|r| r.program).collect();
        assert_eq!(programs, vec!["true", "false"]);
        assert_eq!(sink.close_codes(SessionId::new(1)), vec![1]);
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let (runner, controller, sink) = runner_with(MockProcessController::new());

        let outcome = runner.run_sequence(&sequence(&["a", "b"])).await;

        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.completed, 2);
        assert_eq!(controller.spawned().len(), 2);
        assert_eq!(sink.close_codes(SessionId::new(1)), vec![0]);
    }

    #[tokio::test]
    async fn test_spawn_error_maps_to_exit_code_one() {
        let controller = MockProcessController::new()
            .script("broken", MockScript::fails_to_spawn(SpawnErrorKind::PermissionDenied));
        let (runner, controller, sink) = runner_with(controller);

        let outcome = runner.run_sequence(&sequence(&["broken", "never"])).await;

        assert_eq!(outcome.exit_code, 1);
        assert_eq!(outcome.completed, 0);
        assert_eq!(controller.spawned().len(), 1);
        assert_eq!(sink.close_codes(SessionId::new(1)), vec![1]);
    }

    #[tokio::test]
    async fn test_cd_carries_into_later_steps() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("build")).unwrap();
        let (runner, controller, _sink) = runner_with(MockProcessController::new());
        let sequence = CommandSequence::new(
            SessionId::new(1),
            vec!["cd build".to_string(), "make".to_string()],
            dir.path().to_path_buf(),
        );

        let outcome = runner.run_sequence(&sequence).await;

        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.cwd, dir.path().join("build"));
        assert_eq!(controller.spawned()[0].cwd, dir.path().join("build"));
    }

    #[tokio::test]
    async fn test_echo_precedes_each_step() {
        let controller =
            MockProcessController::new().script("hello", MockScript::exits(0).with_stdout("hi\n"));
        let (runner, _controller, sink) = runner_with(controller);
        let sequence = sequence(&["hello"]).with_echo(true);

        runner.run_sequence(&sequence).await;

        assert_eq!(
            sink.output_for(SessionId::new(1)),
            "\x1b[36m> hello\x1b[0m\r\nhi\n"
        );
    }

    #[tokio::test]
    async fn test_run_steps_leaves_close_to_caller() {
        let (runner, _controller, sink) = runner_with(MockProcessController::new());
        let outcome = runner
            .run_steps(&sequence(&["true"]), &CancellationToken::new())
            .await;
        assert_eq!(outcome.exit_code, 0);
        assert!(sink.close_codes(SessionId::new(1)).is_empty());
    }

    #[tokio::test]
    async fn test_cancel_stops_remaining_steps() {
        let controller = MockProcessController::new().script("build", MockScript::hangs());
        let (runner, controller, _sink) = runner_with(controller);
        let runner = Arc::new(runner);
        let cancel = CancellationToken::new();

        let job = {
            let runner = Arc::clone(&runner);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                runner
                    .run_steps(&sequence(&["build", "rm-everything"]), &cancel)
                    .await
            })
        };
        for _ in 0..200 {
            if runner.supervisor.has_live_process(SessionId::new(1)) {
                break;
            }
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        assert!(runner.supervisor.kill(SessionId::new(1), crate::usecases::ports::SignalKind::Kill));

        let outcome = job.await.unwrap();
        assert_eq!(outcome.exit_code, 137);
        assert_eq!(outcome.completed, 0);
        let programs: Vec<String> = controller.spawned().into_iter().map(|r| r.program).collect();
        assert_eq!(programs, vec!["build"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let (runner, controller, _sink) = runner_with(MockProcessController::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = runner.run_steps(&sequence(&["a", "b"]), &cancel).await;

        assert_eq!(outcome.exit_code, 137);
        assert!(controller.spawned().is_empty());
    }

    #[tokio::test]
    async fn test_empty_sequence_closes_with_zero() {
        let (runner, _controller, sink) = runner_with(MockProcessController::new());
        let outcome = runner.run_sequence(&sequence(&[])).await;
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(sink.close_codes(SessionId::new(1)), vec![0]);
    }
}
