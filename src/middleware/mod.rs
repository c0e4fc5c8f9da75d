//! Middleware for the lending engine API

mod security;
mod tracing;

pub use security::{hsts_header, security_headers};
pub use tracing::{request_tracing, REQUEST_ID_HEADER};
