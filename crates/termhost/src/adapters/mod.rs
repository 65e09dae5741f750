mod error;
pub mod presenter;
mod router;
mod rpc;

pub use error::server_error_response;
pub use error::session_error_response;
pub use router::RouterOptions;
pub use router::RpcRouter;
pub use rpc::*;
