use tracing::warn;

use crate::usecases::ports::SignalKind;
use crate::usecases::ports::SignalOutcome;

fn signal_number(kind: SignalKind) -> libc::c_int {
    match kind {
        SignalKind::Interrupt => libc::SIGINT,
        SignalKind::Kill => libc::SIGKILL,
    }
}

/// Signals the process group led by `pid`, falling back to the process
/// itself. A final failure is logged and reported, never raised.
pub(super) fn signal(pid: u32, kind: SignalKind) -> SignalOutcome {
    let pid_t: libc::pid_t = match pid.try_into() {
        Ok(pid_t) => pid_t,
        Err(_) => {
            warn!(pid, "Pid out of range; not signalling");
            return SignalOutcome::Failed;
        }
    };
    let signal = signal_number(kind);

    // SAFETY: negative pid targets the process group created at spawn.
    if unsafe { libc::kill(-pid_t, signal) } == 0 {
        return SignalOutcome::Group;
    }
    let group_err = std::io::Error::last_os_error();

    // SAFETY: plain kill(2) on a pid this process spawned.
    if unsafe { libc::kill(pid_t, signal) } == 0 {
        return SignalOutcome::Process;
    }
    let err = std::io::Error::last_os_error();
    warn!(
        pid,
        signal,
        group_error = %group_err,
        error = %err,
        "Failed to signal process"
    );
    SignalOutcome::Failed
}
