// HTTP surface: one router per resource, nested under /api

pub mod admin;
pub mod auth;
pub mod chat;
pub mod health;
pub mod orders;
pub mod products;
pub mod response;
pub mod routes;
pub mod sessions;
pub mod subscriptions;
pub mod tracking;
pub mod trainers;

pub use response::{ApiResponse, ValidatedJson};
pub use routes::create_routes;
