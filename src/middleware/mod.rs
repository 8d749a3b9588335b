// Request-level protections shared by every router

pub mod client;
pub mod rate_limiting;
pub mod security;

pub use client::{ClientInfo, TrustedProxies};
pub use rate_limiting::{rate_limit_middleware, RateLimitProfile, RateLimiter, RateLimiters};
pub use security::{cors_layer, with_security_headers};
