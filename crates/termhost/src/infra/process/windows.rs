use std::process::Stdio;

use tracing::warn;

use crate::usecases::ports::SignalKind;
use crate::usecases::ports::SignalOutcome;

fn taskkill_args(pid: u32) -> [String; 4] {
    [
        "/PID".to_string(),
        pid.to_string(),
        "/T".to_string(),
        "/F".to_string(),
    ]
}

/// Windows has no process-group SIGINT for detached children, so both kinds
/// terminate the whole tree. Inside a runtime `taskkill` is spawned and
/// reaped on a task so no worker blocks; its failure is only logged.
pub(super) fn signal(pid: u32, kind: SignalKind) -> SignalOutcome {
    let args = taskkill_args(pid);

    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        let result = std::process::Command::new("taskkill")
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();
        return match result {
            Ok(output) if output.status.success() => SignalOutcome::Tree,
            Ok(output) => {
                warn!(
                    pid,
                    ?kind,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "taskkill failed"
                );
                SignalOutcome::Failed
            }
            Err(err) => {
                warn!(pid, ?kind, error = %err, "Failed to run taskkill");
                SignalOutcome::Failed
            }
        };
    };

    let child = tokio::process::Command::new("taskkill")
        .args(&args)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn();
    let child = match child {
        Ok(child) => child,
        Err(err) => {
            warn!(pid, ?kind, error = %err, "Failed to run taskkill");
            return SignalOutcome::Failed;
        }
    };
    runtime.spawn(async move {
        match child.wait_with_output().await {
            Ok(output) if output.status.success() => {}
            Ok(output) => warn!(
                pid,
                ?kind,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "taskkill failed"
            ),
            Err(err) => warn!(pid, ?kind, error = %err, "taskkill did not complete"),
        }
    });
    SignalOutcome::Tree
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taskkill_targets_the_tree() {
        assert_eq!(taskkill_args(42), ["/PID", "42", "/T", "/F"]);
    }
}
