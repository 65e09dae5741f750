pub mod config;
pub mod event_bus;
pub mod process;
#[cfg(unix)]
pub mod signal_handler;
pub mod static_server;

pub use config::CoreConfig;
pub use event_bus::EventReceiver;
pub use event_bus::IoEventBus;
pub use process::NativeProcessController;
pub use process::ShellConfig;
pub use static_server::StaticServerToggle;
