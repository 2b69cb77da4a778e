//! HTTP middleware

mod layers;
mod metrics;
mod rate_limit;
mod request_id;
mod security;

pub use layers::{compression, cors};
pub use metrics::metrics_middleware;
pub use rate_limit::rate_limit_middleware;
pub use request_id::request_id_middleware;
pub use security::security_headers_middleware;
