// These run only when TEST_DATABASE_URL points at a disposable Postgres

use axum::http::{Method, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{body_json, unique_email, TestApp, STRONG_PASSWORD};

/// Registers and verifies a fresh trainee, returning the login payload
pub async fn verified_login(app: &TestApp, prefix: &str) -> (String, Value) {
    let email = unique_email(prefix);

    let response = app
        .request(
            Method::POST,
            "/api/auth/register",
            Some(json!({ "name": "Reem Saleh", "email": email, "password": STRONG_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let code = app.last_code_for(&email).expect("verification code mailed");
    let response = app
        .request(
            Method::POST,
            "/api/auth/verify-email",
            Some(json!({ "email": email, "code": code })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": email, "password": STRONG_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    (email, body_json(response).await["data"].clone())
}

#[tokio::test]
async fn test_register_verify_login_refresh() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let email = unique_email("flow");

    let response = app
        .request(
            Method::POST,
            "/api/auth/register",
            Some(json!({ "name": "Reem Saleh", "email": email, "password": STRONG_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["data"]["role"], "trainee");
    assert_eq!(body["data"]["is_verified"], false);
    assert!(body["data"].get("password_hash").is_none());

    let duplicate = app
        .request(
            Method::POST,
            "/api/auth/register",
            Some(json!({ "name": "Reem Saleh", "email": email, "password": STRONG_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": email, "password": STRONG_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["requires_verification"], true);

    let code = app.last_code_for(&email).unwrap();
    let response = app
        .request(
            Method::POST,
            "/api/auth/verify-email",
            Some(json!({ "email": email, "code": code })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": email, "password": STRONG_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = body_json(response).await["data"].clone();
    let access = data["access_token"].as_str().unwrap().to_string();
    let refresh = data["refresh_token"].as_str().unwrap().to_string();
    assert_eq!(data["token_type"], "Bearer");

    let response = app.request(Method::GET, "/api/auth/me", None, Some(&access)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["email"], email.as_str());

    let response = app
        .request(
            Method::POST,
            "/api/auth/refresh-token",
            Some(json!({ "refresh_token": refresh })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["data"]["access_token"].is_string());
}

#[tokio::test]
async fn test_repeated_failures_lock_the_account() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let email = unique_email("lockout");
    let wrong = json!({ "email": email, "password": "Wr0ng!Pass" });

    for expected_remaining in (1..=4).rev() {
        let response = app
            .request(Method::POST, "/api/auth/login", Some(wrong.clone()), None)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["remaining_attempts"], expected_remaining);
    }

    let response = app
        .request(Method::POST, "/api/auth/login", Some(wrong), None)
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Account temporarily locked"));
}

#[tokio::test]
async fn test_password_reset_with_code() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let (email, _) = verified_login(&app, "reset").await;

    let response = app
        .request(Method::POST, "/api/auth/forgot-password", Some(json!({ "email": email })), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let code = app.last_code_for(&email).unwrap();

    let response = app
        .request(
            Method::POST,
            "/api/auth/verify-reset-code",
            Some(json!({ "email": email, "code": code })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let new_password = "N3w!Passw0rd";
    let response = app
        .request(
            Method::POST,
            "/api/auth/reset-password",
            Some(json!({ "email": email, "code": code, "new_password": new_password })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // the code is single use
    let response = app
        .request(
            Method::POST,
            "/api/auth/verify-reset-code",
            Some(json!({ "email": email, "code": code })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": email, "password": new_password })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_logout_revokes_access_token() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let (_, data) = verified_login(&app, "logout").await;
    let access = data["access_token"].as_str().unwrap();

    let response = app.request(Method::POST, "/api/auth/logout", None, Some(access)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.request(Method::GET, "/api/auth/me", None, Some(access)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

fn apple_token(claims: Value) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","kid":"test"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

#[tokio::test]
async fn test_apple_sign_in_does_not_link_by_body_email() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let (email, data) = verified_login(&app, "apple-victim").await;
    let access = data["access_token"].as_str().unwrap().to_string();

    let subject = format!("001234.{}", uuid::Uuid::new_v4().simple());
    let exp = chrono::Utc::now().timestamp() + 600;
    let response = app
        .request(
            Method::POST,
            "/api/auth/apple",
            Some(json!({
                "identity_token": apple_token(json!({ "sub": subject, "exp": exp })),
                "user_identifier": subject,
                "email": email,
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_json(response).await["errors"]["email"].is_array());

    // the password account is untouched and still signs in
    let response = app.request(Method::GET, "/api/auth/me", None, Some(&access)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_apple_sign_in_links_by_token_email() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let (email, data) = verified_login(&app, "apple-owner").await;
    let user_id = data["user"]["id"].as_str().unwrap().to_string();

    let subject = format!("001234.{}", uuid::Uuid::new_v4().simple());
    let exp = chrono::Utc::now().timestamp() + 600;
    let response = app
        .request(
            Method::POST,
            "/api/auth/apple",
            Some(json!({
                "identity_token": apple_token(json!({ "sub": subject, "email": email, "exp": exp })),
                "user_identifier": subject,
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["user"]["id"], user_id.as_str());
}
