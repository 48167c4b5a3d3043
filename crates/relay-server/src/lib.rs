pub mod server;
pub mod session;

pub use server::{build_router, start, AppState, ServerConfig, ServerHandle, MAX_MESSAGE_BYTES};
pub use session::{run_session, SessionError};
