// Authentication and authorization

pub mod apple;
pub mod codes;
pub mod errors;
pub mod jwt;
pub mod lockout;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;

pub use errors::AuthError;
pub use jwt::{extract_bearer_token, JwtService};
pub use middleware::{
    admin_only_middleware, jwt_auth_middleware, trainee_only_middleware, trainer_only_middleware,
};
pub use models::*;
pub use service::AuthService;
