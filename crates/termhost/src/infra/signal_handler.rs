//! Host signal handling.

use std::io;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use signal_hook::consts::SIGINT;
use signal_hook::consts::SIGTERM;
use signal_hook::iterator::Signals;
use tokio::sync::watch;
use tracing::info;

/// Flips `shutdown` to `true` on the first SIGINT or SIGTERM.
pub struct SignalHandler {
    _handle: JoinHandle<()>,
}

impl SignalHandler {
    pub fn setup(shutdown: Arc<watch::Sender<bool>>) -> io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM])?;

        let handle = thread::Builder::new()
            .name("signal-handler".to_string())
            .spawn(move || {
                if let Some(sig) = signals.forever().next() {
                    info!(signal = sig, "Received signal, shutting down");
                    shutdown.send_replace(true);
                }
            })?;

        Ok(Self { _handle: handle })
    }
}
