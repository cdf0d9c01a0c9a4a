//! HTTP Middleware
//!
//! - Request logging with latency and client address
//! - Fixed-window rate limiting per client IP
//! - Error diagnostics outside production

pub mod diagnostics;
pub mod logging;
pub mod rate_limit;

pub use diagnostics::error_diagnostics;
pub use logging::request_logging;
pub use rate_limit::{rate_limit_middleware, RateLimitConfig, RateLimiter};

use axum::{extract::ConnectInfo, http::Request};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Peer address when the server was started with connect info; unspecified otherwise
pub fn client_ip<B>(request: &Request<B>) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
