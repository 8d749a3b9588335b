use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::auth::{extract_bearer_token, AuthError, AuthService, UserRole, UserSession};

/// JWT authentication middleware
pub async fn jwt_auth_middleware(
    State(auth_service): State<AuthService>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(AuthError::MissingAuthHeader)?;

    let token = extract_bearer_token(auth_header)?;
    let session = auth_service.validate_session(token).await?;

    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}

fn require_roles(request: &Request, allowed: &[UserRole]) -> Result<(), AuthError> {
    let session = request
        .extensions()
        .get::<UserSession>()
        .ok_or(AuthError::MissingAuthHeader)?;

    if !allowed.contains(&session.role) {
        return Err(AuthError::InsufficientPermissions);
    }
    Ok(())
}

/// Admin-only middleware
pub async fn admin_only_middleware(request: Request, next: Next) -> Result<Response, AuthError> {
    require_roles(&request, &[UserRole::Admin])?;
    Ok(next.run(request).await)
}

/// Trainer or admin
pub async fn trainer_only_middleware(request: Request, next: Next) -> Result<Response, AuthError> {
    require_roles(&request, &[UserRole::Trainer, UserRole::Admin])?;
    Ok(next.run(request).await)
}

pub async fn trainee_only_middleware(request: Request, next: Next) -> Result<Response, AuthError> {
    require_roles(&request, &[UserRole::Trainee])?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use chrono::Utc;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn session(role: UserRole) -> UserSession {
        UserSession {
            user_id: Uuid::new_v4(),
            email: "member@vitafit.online".to_string(),
            role,
            jti: Uuid::new_v4().to_string(),
            expires_at: Utc::now(),
        }
    }

    async fn status_for(role: Option<UserRole>, gate: &str) -> StatusCode {
        let route = get(|| async { "ok" });
        let router = match gate {
            "admin" => Router::new().route("/", route.layer(middleware::from_fn(admin_only_middleware))),
            "trainer" => Router::new().route("/", route.layer(middleware::from_fn(trainer_only_middleware))),
            _ => Router::new().route("/", route.layer(middleware::from_fn(trainee_only_middleware))),
        };

        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        if let Some(role) = role {
            request.extensions_mut().insert(session(role));
        }
        router.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_role_gates() {
        assert_eq!(status_for(Some(UserRole::Admin), "admin").await, StatusCode::OK);
        assert_eq!(status_for(Some(UserRole::Trainer), "admin").await, StatusCode::FORBIDDEN);
        assert_eq!(status_for(Some(UserRole::Admin), "trainer").await, StatusCode::OK);
        assert_eq!(status_for(Some(UserRole::Trainer), "trainer").await, StatusCode::OK);
        assert_eq!(status_for(Some(UserRole::Trainee), "trainer").await, StatusCode::FORBIDDEN);
        assert_eq!(status_for(Some(UserRole::Trainee), "trainee").await, StatusCode::OK);
        assert_eq!(status_for(Some(UserRole::Admin), "trainee").await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_missing_session_is_unauthorized() {
        assert_eq!(status_for(None, "admin").await, StatusCode::UNAUTHORIZED);
    }
}
