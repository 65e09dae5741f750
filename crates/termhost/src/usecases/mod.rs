pub mod autocomplete;
pub mod ports;
pub mod sequence_runner;
pub mod session_registry;
pub mod supervisor;

pub use autocomplete::AutocompleteResolver;
pub use sequence_runner::SequenceOutcome;
pub use sequence_runner::SequenceRunner;
pub use session_registry::DispatchOutcome;
pub use session_registry::JobHandle;
pub use session_registry::KeyOutcome;
pub use session_registry::RegistryOptions;
pub use session_registry::TerminalSessionRegistry;
pub use supervisor::CommandOutcome;
pub use supervisor::ProcessSupervisor;
pub use supervisor::SupervisorOptions;
