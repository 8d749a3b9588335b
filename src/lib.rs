pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::Router;

/// Full application router for the given state
pub fn create_app(state: AppState) -> Router {
    api::create_routes(state)
}
