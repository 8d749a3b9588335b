use axum::http::{header, Method, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

use crate::common::{body_json, TestApp};
use vitafit::auth::UserRole;

#[tokio::test]
async fn test_health_check_with_security_headers() {
    let app = TestApp::offline();

    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert!(response.headers().contains_key("strict-transport-security"));

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "vitafit");
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = TestApp::offline();

    for uri in ["/api/auth/me", "/api/orders", "/api/sessions", "/api/chat/conversations"] {
        let response = app.request(Method::GET, uri, None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Missing authorization header");
    }
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let app = TestApp::offline();
    let response = app.request(Method::GET, "/api/admin/dashboard", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_token_is_rejected() {
    let app = TestApp::offline();
    let response = app
        .request(Method::GET, "/api/auth/me", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_token_cannot_authenticate_requests() {
    let app = TestApp::offline();
    let refresh = app
        .state
        .auth_service
        .jwt()
        .create_refresh_token(Uuid::new_v4(), "sara@example.com", UserRole::Trainee)
        .unwrap();

    let response = app
        .request(Method::GET, "/api/tracking/workouts", None, Some(&refresh))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_validation_errors_are_422() {
    let app = TestApp::offline();

    let response = app
        .request(
            Method::POST,
            "/api/auth/register",
            Some(json!({ "name": "S", "email": "not-an-email", "password": "x" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["errors"]["name"].is_array());
    assert!(body["errors"]["email"].is_array());
}

#[tokio::test]
async fn test_register_weak_password_lists_every_rule() {
    let app = TestApp::offline();

    let response = app
        .request(
            Method::POST,
            "/api/auth/register",
            Some(json!({ "name": "Sara", "email": "sara@example.com", "password": "password" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    let messages = body["errors"]["password"].as_array().unwrap();
    assert!(messages.len() >= 3);
    assert!(messages
        .iter()
        .any(|m| m.as_str().unwrap().contains("too common")));
}

#[tokio::test]
async fn test_missing_field_is_422_and_bad_json_is_400() {
    let app = TestApp::offline();

    let response = app
        .request(Method::POST, "/api/auth/login", Some(json!({ "email": "a@b.co" })), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from("{broken"))
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_is_rate_limited() {
    let app = TestApp::offline();
    let invalid = json!({ "name": "S", "email": "bad", "password": "x" });

    for _ in 0..3 {
        let response = app
            .request(Method::POST, "/api/auth/register", Some(invalid.clone()), None)
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    let response = app
        .request(Method::POST, "/api/auth/register", Some(invalid), None)
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    let body = body_json(response).await;
    assert!(body["retry_after"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_unknown_reset_code_is_rejected() {
    let app = TestApp::offline();

    let response = app
        .request(
            Method::POST,
            "/api/auth/verify-reset-code",
            Some(json!({ "email": "nobody@example.com", "code": "123456" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "Invalid reset code");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = TestApp::offline();
    let response = app.request(Method::GET, "/api/does-not-exist", None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_login_limit_ignores_client_written_forwarded_hops() {
    let app = TestApp::offline();
    let body = json!({ "email": "amira@example.com", "password": "Wr0ng!Pass" });

    let mut statuses = Vec::new();
    for i in 0..6 {
        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            // only the left-most, client-controlled entry changes
            .header("x-forwarded-for", format!("1.2.3.{}, 203.0.113.5", i))
            .body(axum::body::Body::from(body.to_string()))
            .unwrap();
        let response = tower::ServiceExt::oneshot(app.router.clone(), request).await.unwrap();
        statuses.push(response.status());
    }

    assert!(statuses[..5].iter().all(|status| *status != StatusCode::TOO_MANY_REQUESTS));
    assert_eq!(statuses[5], StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_reset_routes_do_not_share_a_limit() {
    let app = TestApp::offline();
    let email = json!({ "email": "amira@example.com" });

    for uri in ["/api/auth/resend-verification", "/api/auth/forgot-password"] {
        for _ in 0..3 {
            let response = app.request(Method::POST, uri, Some(email.clone()), None).await;
            assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS, "{}", uri);
        }
    }

    let response = app
        .request(
            Method::POST,
            "/api/auth/reset-password",
            Some(json!({ "email": "amira@example.com", "code": "000000", "new_password": "N3w!Passw0rd" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
