//! Composition root: builds the object graph from configuration.

use std::sync::Arc;

use tokio::sync::watch;

use crate::adapters::RouterOptions;
use crate::adapters::RpcRouter;
use crate::infra::CoreConfig;
use crate::infra::IoEventBus;
use crate::infra::NativeProcessController;
use crate::infra::StaticServerToggle;
use crate::usecases::ProcessSupervisor;
use crate::usecases::RegistryOptions;
use crate::usecases::SupervisorOptions;
use crate::usecases::TerminalSessionRegistry;

pub struct Container {
    pub config: CoreConfig,
    pub bus: Arc<IoEventBus>,
    pub registry: Arc<TerminalSessionRegistry>,
    pub server: Arc<StaticServerToggle>,
    pub shutdown: Arc<watch::Sender<bool>>,
}

impl Container {
    pub fn build(config: CoreConfig) -> Self {
        let bus = Arc::new(IoEventBus::new());
        let controller = Arc::new(NativeProcessController::new(config.shell().clone()));
        let supervisor = Arc::new(ProcessSupervisor::new(
            controller,
            bus.clone(),
            SupervisorOptions {
                tokenizer: config.tokenizer(),
                home_dir: config.home_dir().cloned(),
            },
        ));
        let registry = Arc::new(TerminalSessionRegistry::new(
            supervisor,
            bus.clone(),
            RegistryOptions {
                max_sessions: config.max_sessions(),
                history_limit: config.history_limit(),
            },
        ));
        let server = Arc::new(StaticServerToggle::new(config.server_host(), bus.clone()));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            bus,
            registry,
            server,
            shutdown: Arc::new(shutdown),
        }
    }

    pub fn router(&self) -> RpcRouter {
        RpcRouter::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.server),
            RouterOptions {
                property_dir: self.config.property_dir().cloned(),
                server_port: self.config.server_port(),
                default_file: self.config.default_file().to_string(),
            },
            Arc::clone(&self.shutdown),
        )
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Installs the SIGINT/SIGTERM handler that trips the shutdown signal.
    #[cfg(unix)]
    pub fn install_signal_handler(&self) -> std::io::Result<crate::infra::signal_handler::SignalHandler> {
        crate::infra::signal_handler::SignalHandler::setup(Arc::clone(&self.shutdown))
    }

    /// Kills every live process and stops the static server.
    pub async fn shutdown(&self) -> usize {
        let killed = self.registry.shutdown();
        self.server.shutdown().await;
        self.shutdown.send_replace(true);
        killed
    }
}
