use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::FieldErrors;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials { remaining_attempts: Option<u32> },
    #[error("Incorrect password")]
    IncorrectPassword,
    #[error("User not found")]
    UserNotFound,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Token has been revoked")]
    TokenRevoked,
    #[error("Missing authorization header")]
    MissingAuthHeader,
    #[error("Invalid authorization header format")]
    InvalidAuthHeaderFormat,
    #[error("Insufficient permissions")]
    InsufficientPermissions,
    #[error("Account temporarily locked. Please try again in {} minutes.", minutes_ceil(.retry_after))]
    AccountLocked { retry_after: u64 },
    #[error("Account is inactive. Please contact support.")]
    AccountInactive,
    #[error("Please verify your email first. A new verification code has been sent.")]
    EmailNotVerified,
    #[error("Email is already verified")]
    AlreadyVerified,
    #[error("{0}")]
    InvalidCode(String),
    #[error("{0}")]
    InvalidAppleToken(String),
    #[error("Validation failed")]
    Validation(FieldErrors),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Password hashing error: {0}")]
    PasswordHashing(#[from] crate::auth::password::PasswordError),
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

fn minutes_ceil(seconds: &u64) -> u64 {
    (seconds + 59) / 60
}

impl AuthError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        AuthError::Validation(crate::models::single_field_error(field, message))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            AuthError::InvalidCredentials { remaining_attempts } => {
                let mut body = json!({ "success": false, "message": message });
                if let Some(remaining) = remaining_attempts {
                    body["remaining_attempts"] = json!(remaining);
                }
                (StatusCode::UNAUTHORIZED, body)
            }
            AuthError::AccountLocked { retry_after } => {
                let body = json!({
                    "success": false,
                    "message": message,
                    "retry_after": retry_after,
                });
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                return response;
            }
            AuthError::EmailNotVerified => (
                StatusCode::FORBIDDEN,
                json!({
                    "success": false,
                    "message": message,
                    "requires_verification": true,
                }),
            ),
            AuthError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "success": false, "message": message, "errors": errors }),
            ),
            AuthError::Database(ref err) => {
                tracing::error!(error = %err, "database error during authentication");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "message": "Internal server error" }),
                )
            }
            AuthError::PasswordHashing(ref err) => {
                tracing::error!(error = %err, "password hashing failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "message": "Internal server error" }),
                )
            }
            AuthError::Internal(ref err) => {
                tracing::error!(error = %err, "internal authentication error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "message": "Internal server error" }),
                )
            }
            other => {
                let status = match other {
                    AuthError::IncorrectPassword
                    | AuthError::InvalidToken
                    | AuthError::TokenExpired
                    | AuthError::TokenRevoked
                    | AuthError::MissingAuthHeader
                    | AuthError::InvalidAuthHeaderFormat
                    | AuthError::AccountInactive
                    | AuthError::Jwt(_) => StatusCode::UNAUTHORIZED,
                    AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
                    AuthError::UserNotFound => StatusCode::NOT_FOUND,
                    AuthError::AlreadyVerified
                    | AuthError::InvalidCode(_)
                    | AuthError::InvalidAppleToken(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, json!({ "success": false, "message": message }))
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_credentials_reports_remaining_attempts() {
        let response = AuthError::InvalidCredentials { remaining_attempts: Some(3) }.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Invalid credentials");
        assert_eq!(body["remaining_attempts"], 3);
    }

    #[tokio::test]
    async fn test_locked_account_is_429() {
        let response = AuthError::AccountLocked { retry_after: 600 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "600");

        let body = body_json(response).await;
        assert_eq!(body["retry_after"], 600);
        assert_eq!(
            body["message"],
            "Account temporarily locked. Please try again in 10 minutes."
        );
    }

    #[tokio::test]
    async fn test_unverified_flags_verification() {
        let response = AuthError::EmailNotVerified.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["requires_verification"], true);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AuthError::TokenExpired.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InsufficientPermissions.into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::UserNotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AuthError::field("email", "taken").into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
