use axum::{
    extract::State,
    middleware,
    routing::{delete, get, post, put},
    Extension, Router,
};

use crate::api::response::{ApiResponse, ValidatedJson};
use crate::auth::{
    jwt_auth_middleware, AccessTokenResponse, AppleSignInRequest, AuthError, AuthResponse,
    AuthService, ChangeEmailRequest, DeleteAccountRequest, EmailRequest, FcmTokenRequest,
    LoginRequest, RefreshTokenRequest, RegisterRequest, ResetPasswordRequest, TokenPair,
    UpdatePasswordRequest, UpdateProfileRequest, UserSession, VerifyEmailRequest,
    VerifyResetCodeRequest,
};
use crate::middleware::{rate_limit_middleware, ClientInfo, RateLimiters};
use crate::models::UserResponse;

type AuthResult<T> = Result<ApiResponse<T>, AuthError>;

/// Authentication routes
pub fn auth_routes(auth_service: AuthService, limiters: &RateLimiters) -> Router {
    let public = Router::new()
        .route(
            "/register",
            post(register).route_layer(middleware::from_fn_with_state(
                limiters.register.clone(),
                rate_limit_middleware,
            )),
        )
        .route("/verify-email", post(verify_email))
        .route(
            "/resend-verification",
            post(resend_verification).route_layer(middleware::from_fn_with_state(
                limiters.resend_verification.clone(),
                rate_limit_middleware,
            )),
        )
        .route(
            "/login",
            post(login).route_layer(middleware::from_fn_with_state(
                limiters.login.clone(),
                rate_limit_middleware,
            )),
        )
        .route("/refresh-token", post(refresh_token))
        .route(
            "/forgot-password",
            post(forgot_password).route_layer(middleware::from_fn_with_state(
                limiters.forgot_password.clone(),
                rate_limit_middleware,
            )),
        )
        .route("/verify-reset-code", post(verify_reset_code))
        .route(
            "/reset-password",
            post(reset_password).route_layer(middleware::from_fn_with_state(
                limiters.reset_password.clone(),
                rate_limit_middleware,
            )),
        )
        .route(
            "/apple",
            post(apple_sign_in).route_layer(middleware::from_fn_with_state(
                limiters.login.clone(),
                rate_limit_middleware,
            )),
        );

    let protected = Router::new()
        .route("/me", get(me))
        .route("/profile", put(update_profile))
        .route("/password", put(update_password))
        .route("/fcm-token", put(update_fcm_token))
        .route("/email", put(change_email))
        .route("/logout", post(logout))
        .route("/account", delete(delete_account))
        .route_layer(middleware::from_fn_with_state(
            auth_service.clone(),
            jwt_auth_middleware,
        ));

    public.merge(protected).with_state(auth_service)
}

/// Register a new trainee account
#[tracing::instrument(skip(auth_service, request))]
async fn register(
    State(auth_service): State<AuthService>,
    client: ClientInfo,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> AuthResult<UserResponse> {
    let user = auth_service.register(request, &client).await?;
    Ok(ApiResponse::created(
        "Registration successful. Please check your email for the verification code.",
        user,
    ))
}

#[tracing::instrument(skip(auth_service, request))]
async fn verify_email(
    State(auth_service): State<AuthService>,
    client: ClientInfo,
    ValidatedJson(request): ValidatedJson<VerifyEmailRequest>,
) -> AuthResult<AuthResponse> {
    let response = auth_service.verify_email(request, &client).await?;
    Ok(ApiResponse::with_message("Email verified successfully", response))
}

#[tracing::instrument(skip(auth_service, request))]
async fn resend_verification(
    State(auth_service): State<AuthService>,
    ValidatedJson(request): ValidatedJson<EmailRequest>,
) -> AuthResult<()> {
    auth_service.resend_verification(&request.email).await?;
    Ok(ApiResponse::message(
        "If the account exists, a new verification code has been sent.",
    ))
}

#[tracing::instrument(skip(auth_service, request))]
async fn login(
    State(auth_service): State<AuthService>,
    client: ClientInfo,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> AuthResult<AuthResponse> {
    let response = auth_service.login(request, &client).await?;
    Ok(ApiResponse::with_message("Login successful", response))
}

/// Exchange a refresh token for a new access token
#[tracing::instrument(skip(auth_service, request))]
async fn refresh_token(
    State(auth_service): State<AuthService>,
    ValidatedJson(request): ValidatedJson<RefreshTokenRequest>,
) -> AuthResult<AccessTokenResponse> {
    let response = auth_service.refresh_token(request).await?;
    Ok(ApiResponse::with_message("Token refreshed", response))
}

#[tracing::instrument(skip(auth_service, request))]
async fn forgot_password(
    State(auth_service): State<AuthService>,
    client: ClientInfo,
    ValidatedJson(request): ValidatedJson<EmailRequest>,
) -> AuthResult<()> {
    auth_service.forgot_password(&request.email, &client).await?;
    Ok(ApiResponse::message(
        "If an account with that email exists, a password reset code has been sent.",
    ))
}

#[tracing::instrument(skip(auth_service, request))]
async fn verify_reset_code(
    State(auth_service): State<AuthService>,
    ValidatedJson(request): ValidatedJson<VerifyResetCodeRequest>,
) -> AuthResult<()> {
    auth_service.verify_reset_code(&request)?;
    Ok(ApiResponse::message("OTP verified"))
}

#[tracing::instrument(skip(auth_service, request))]
async fn reset_password(
    State(auth_service): State<AuthService>,
    client: ClientInfo,
    ValidatedJson(request): ValidatedJson<ResetPasswordRequest>,
) -> AuthResult<()> {
    auth_service.reset_password(request, &client).await?;
    Ok(ApiResponse::message("Password reset successfully"))
}

/// Sign in with Apple, linking or creating the account
#[tracing::instrument(skip(auth_service, request))]
async fn apple_sign_in(
    State(auth_service): State<AuthService>,
    client: ClientInfo,
    ValidatedJson(request): ValidatedJson<AppleSignInRequest>,
) -> AuthResult<AuthResponse> {
    let response = auth_service.apple_sign_in(request, &client).await?;
    Ok(ApiResponse::with_message("Login successful", response))
}

#[tracing::instrument(skip(auth_service, session), fields(user_id = %session.user_id))]
async fn me(
    State(auth_service): State<AuthService>,
    Extension(session): Extension<UserSession>,
) -> AuthResult<UserResponse> {
    let user = auth_service.me(session.user_id).await?;
    Ok(ApiResponse::ok(user))
}

#[tracing::instrument(skip(auth_service, session, request), fields(user_id = %session.user_id))]
async fn update_profile(
    State(auth_service): State<AuthService>,
    Extension(session): Extension<UserSession>,
    ValidatedJson(request): ValidatedJson<UpdateProfileRequest>,
) -> AuthResult<UserResponse> {
    let user = auth_service.update_profile(session.user_id, request).await?;
    Ok(ApiResponse::with_message("Profile updated successfully", user))
}

#[tracing::instrument(skip(auth_service, session, request), fields(user_id = %session.user_id))]
async fn update_password(
    State(auth_service): State<AuthService>,
    Extension(session): Extension<UserSession>,
    client: ClientInfo,
    ValidatedJson(request): ValidatedJson<UpdatePasswordRequest>,
) -> AuthResult<TokenPair> {
    let tokens = auth_service.update_password(&session, request, &client).await?;
    Ok(ApiResponse::with_message("Password updated successfully", tokens))
}

#[tracing::instrument(skip(auth_service, session, request), fields(user_id = %session.user_id))]
async fn update_fcm_token(
    State(auth_service): State<AuthService>,
    Extension(session): Extension<UserSession>,
    ValidatedJson(request): ValidatedJson<FcmTokenRequest>,
) -> AuthResult<()> {
    auth_service
        .update_fcm_token(session.user_id, request.fcm_token)
        .await?;
    Ok(ApiResponse::message("FCM token updated successfully"))
}

#[tracing::instrument(skip(auth_service, session, request), fields(user_id = %session.user_id))]
async fn change_email(
    State(auth_service): State<AuthService>,
    Extension(session): Extension<UserSession>,
    client: ClientInfo,
    ValidatedJson(request): ValidatedJson<ChangeEmailRequest>,
) -> AuthResult<UserResponse> {
    let user = auth_service.change_email(&session, request, &client).await?;
    Ok(ApiResponse::with_message(
        "Email updated. Please verify your new email address.",
        user,
    ))
}

#[tracing::instrument(skip(auth_service, session), fields(user_id = %session.user_id))]
async fn logout(
    State(auth_service): State<AuthService>,
    Extension(session): Extension<UserSession>,
    client: ClientInfo,
) -> AuthResult<()> {
    auth_service.logout(&session, &client).await?;
    Ok(ApiResponse::message("Logged out successfully"))
}

#[tracing::instrument(skip(auth_service, session, request), fields(user_id = %session.user_id))]
async fn delete_account(
    State(auth_service): State<AuthService>,
    Extension(session): Extension<UserSession>,
    client: ClientInfo,
    ValidatedJson(request): ValidatedJson<DeleteAccountRequest>,
) -> AuthResult<()> {
    auth_service.delete_account(&session, request, &client).await?;
    Ok(ApiResponse::message("Account deleted successfully"))
}
