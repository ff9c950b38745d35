pub mod auth;
pub mod request_logger;

pub use auth::{require_auth, AuthGuard};
pub use request_logger::request_logger_middleware;
