use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::error::ApiError;
use crate::middleware::client::client_ip_from_request;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitProfile {
    pub name: &'static str,
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitProfile {
    pub const LOGIN: Self = Self {
        name: "login",
        max_requests: 5,
        window: Duration::from_secs(15 * 60),
    };
    pub const REGISTER: Self = Self {
        name: "register",
        max_requests: 3,
        window: Duration::from_secs(60 * 60),
    };
    pub const RESEND_VERIFICATION: Self = Self {
        name: "resend_verification",
        max_requests: 3,
        window: Duration::from_secs(60 * 60),
    };
    pub const FORGOT_PASSWORD: Self = Self {
        name: "forgot_password",
        max_requests: 3,
        window: Duration::from_secs(60 * 60),
    };
    pub const RESET_PASSWORD: Self = Self {
        name: "reset_password",
        max_requests: 5,
        window: Duration::from_secs(60 * 60),
    };
    pub const API: Self = Self {
        name: "api",
        max_requests: 100,
        window: Duration::from_secs(60),
    };
}

#[derive(Debug)]
struct RateLimitWindow {
    started: Instant,
    count: u32,
}

/// Fixed-window counter per client key
#[derive(Clone)]
pub struct RateLimiter {
    profile: RateLimitProfile,
    store: Arc<RwLock<HashMap<String, RateLimitWindow>>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").field("profile", &self.profile).finish()
    }
}

impl RateLimiter {
    pub fn new(profile: RateLimitProfile) -> Self {
        Self {
            profile,
            store: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn profile(&self) -> RateLimitProfile {
        self.profile
    }

    /// `Err(seconds until the window resets)` once the budget is spent
    pub fn check_rate_limit(&self, key: &str) -> Result<(), u64> {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> Result<(), u64> {
        let mut store = self.store.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let window = store.entry(key.to_string()).or_insert(RateLimitWindow {
            started: now,
            count: 0,
        });

        let elapsed = now.saturating_duration_since(window.started);
        if elapsed >= self.profile.window {
            window.started = now;
            window.count = 0;
        }

        if window.count >= self.profile.max_requests {
            let remaining = self.profile.window.saturating_sub(elapsed);
            return Err(remaining.as_secs().max(1));
        }

        window.count += 1;
        Ok(())
    }

    pub fn cleanup_old_entries(&self) {
        let now = Instant::now();
        let window = self.profile.window;
        let mut store = self.store.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        store.retain(|_, entry| now.saturating_duration_since(entry.started) < window);
    }
}

/// One limiter per route family; counters are never shared between them
#[derive(Debug, Clone)]
pub struct RateLimiters {
    pub login: RateLimiter,
    pub register: RateLimiter,
    pub resend_verification: RateLimiter,
    pub forgot_password: RateLimiter,
    pub reset_password: RateLimiter,
    pub api: RateLimiter,
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self {
            login: RateLimiter::new(RateLimitProfile::LOGIN),
            register: RateLimiter::new(RateLimitProfile::REGISTER),
            resend_verification: RateLimiter::new(RateLimitProfile::RESEND_VERIFICATION),
            forgot_password: RateLimiter::new(RateLimitProfile::FORGOT_PASSWORD),
            reset_password: RateLimiter::new(RateLimitProfile::RESET_PASSWORD),
            api: RateLimiter::new(RateLimitProfile::API),
        }
    }
}

impl RateLimiters {
    pub fn cleanup_old_entries(&self) {
        self.login.cleanup_old_entries();
        self.register.cleanup_old_entries();
        self.resend_verification.cleanup_old_entries();
        self.forgot_password.cleanup_old_entries();
        self.reset_password.cleanup_old_entries();
        self.api.cleanup_old_entries();
    }
}

pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client_key = client_ip_from_request(request.headers(), request.extensions());

    if let Err(retry_after) = rate_limiter.check_rate_limit(&client_key) {
        tracing::warn!(
            profile = rate_limiter.profile().name,
            client = %client_key,
            retry_after,
            "Rate limit exceeded"
        );
        return Err(ApiError::TooManyRequests { retry_after });
    }

    Ok(next.run(request).await)
}
