use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::apple::decode_identity_token;
use crate::auth::codes::{CodeError, CodePurpose, CodeStore};
use crate::auth::lockout::LoginLockout;
use crate::auth::password::{hash_password, hash_token, verify_password, generate_secure_token, PasswordPolicy};
use crate::auth::{
    AccessTokenResponse, AppleSignInRequest, AuthError, AuthResponse, ChangeEmailRequest,
    DeleteAccountRequest, JwtService, LoginRequest, RefreshTokenRequest, RegisterRequest,
    ResetPasswordRequest, TokenPair, UpdatePasswordRequest, UpdateProfileRequest, UserRole,
    UserSession, VerifyEmailRequest, VerifyResetCodeRequest,
};
use crate::config::AuthConfig;
use crate::middleware::ClientInfo;
use crate::models::{normalize_email, sanitize_opt, sanitize_text, CreateUser, User, UserResponse};
use crate::services::email_service::{LoginContext, Mailer};
use crate::services::security_log_service::{SecurityEvent, SecurityLogService};

/// Account lifecycle: registration, verification, sessions and credential changes
#[derive(Debug, Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_service: JwtService,
    config: Arc<AuthConfig>,
    mailer: Mailer,
    verification_codes: CodeStore,
    reset_codes: CodeStore,
    lockout: LoginLockout,
    security_log: SecurityLogService,
    password_policy: PasswordPolicy,
}

impl AuthService {
    pub fn new(db: PgPool, config: &AuthConfig, mailer: Mailer) -> Self {
        Self {
            jwt_service: JwtService::from_config(config),
            verification_codes: CodeStore::new(
                CodePurpose::EmailVerification,
                chrono::Duration::seconds(config.verification_code_ttl_secs),
            ),
            reset_codes: CodeStore::new(
                CodePurpose::PasswordReset,
                chrono::Duration::seconds(config.reset_code_ttl_secs),
            ),
            lockout: LoginLockout::new(
                config.lockout_max_attempts,
                chrono::Duration::seconds(config.lockout_duration_secs),
            ),
            security_log: SecurityLogService::new(db.clone()),
            password_policy: PasswordPolicy::default(),
            config: Arc::new(config.clone()),
            mailer,
            db,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt_service
    }

    pub fn mailer(&self) -> &Mailer {
        &self.mailer
    }

    pub fn security_log(&self) -> &SecurityLogService {
        &self.security_log
    }

    /// Create an unverified trainee account and email a verification code
    pub async fn register(
        &self,
        request: RegisterRequest,
        client: &ClientInfo,
    ) -> Result<UserResponse, AuthError> {
        self.check_password_policy("password", &request.password)?;

        let email = normalize_email(&request.email);
        if self.find_user_by_email(&email).await?.is_some() {
            return Err(AuthError::field("email", "This email is already registered"));
        }

        let user = self
            .insert_user(CreateUser {
                name: sanitize_text(&request.name),
                email,
                password_hash: hash_password(&request.password, self.config.bcrypt_cost)?,
                role: UserRole::Trainee,
                phone: sanitize_opt(request.phone),
                gender: request.gender,
                apple_id: None,
                is_verified: false,
            })
            .await?;

        self.send_verification(&user).await;
        self.security_log
            .record(
                SecurityEvent::UserRegistered,
                Some(user.id),
                Some(client),
                json!({ "email": user.email }),
            )
            .await;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(UserResponse::from(user))
    }

    /// Accepts either email + code or the link token from the email
    pub async fn verify_email(
        &self,
        request: VerifyEmailRequest,
        client: &ClientInfo,
    ) -> Result<AuthResponse, AuthError> {
        let owner = match (&request.token, &request.email, &request.code) {
            (Some(token), _, _) if !token.is_empty() => self.verification_codes.consume_token(token),
            (_, Some(email), Some(code)) => self.verification_codes.consume_code(email, code),
            (_, None, _) => return Err(AuthError::field("email", "Email is required")),
            (_, Some(_), None) => return Err(AuthError::field("code", "Verification code is required")),
        }
        .map_err(|err| self.code_error(err, CodePurpose::EmailVerification))?;

        let user = self
            .find_user_by_id(owner.user_id)
            .await?
            .filter(|user| user.email == owner.email)
            .ok_or_else(|| self.code_error(CodeError::Invalid, CodePurpose::EmailVerification))?;

        if user.is_verified {
            return Err(AuthError::AlreadyVerified);
        }

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET is_verified = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(user.id)
        .fetch_one(&self.db)
        .await?;

        if let Err(err) = self.mailer.send_welcome_email(&user.email, &user.name).await {
            tracing::warn!(user_id = %user.id, error = %err, "Failed to send welcome email");
        }
        self.security_log
            .record(SecurityEvent::EmailVerified, Some(user.id), Some(client), json!({}))
            .await;

        self.issue_session(user).await
    }

    /// Silent for unknown addresses
    pub async fn resend_verification(&self, email: &str) -> Result<(), AuthError> {
        let Some(user) = self.find_user_by_email(&normalize_email(email)).await? else {
            return Ok(());
        };

        if user.is_verified {
            return Err(AuthError::AlreadyVerified);
        }

        self.send_verification(&user).await;
        Ok(())
    }

    pub async fn login(
        &self,
        request: LoginRequest,
        client: &ClientInfo,
    ) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(&request.email);

        if let Err(retry_after) = self.lockout.check(&email, &client.ip) {
            return Err(AuthError::AccountLocked { retry_after });
        }

        let user = match self.find_user_by_email(&email).await? {
            Some(user) if verify_password(&request.password, &user.password_hash)? => user,
            other => {
                return Err(self
                    .login_failed(&email, other.map(|user| user.id), client)
                    .await)
            }
        };

        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        if !user.is_verified {
            self.send_verification(&user).await;
            return Err(AuthError::EmailNotVerified);
        }

        self.lockout.reset(&email, &client.ip);

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET last_login_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(user.id)
        .fetch_one(&self.db)
        .await?;

        if self.config.send_login_alerts {
            let context = LoginContext {
                ip: client.ip.clone(),
                user_agent: client.user_agent.clone().unwrap_or_else(|| "unknown".to_string()),
                time: Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
            };
            if let Err(err) = self.mailer.send_login_alert(&user.email, &user.name, &context).await {
                tracing::warn!(user_id = %user.id, error = %err, "Failed to send login alert");
            }
        }

        self.security_log
            .record(SecurityEvent::UserLogin, Some(user.id), Some(client), json!({}))
            .await;

        self.issue_session(user).await
    }

    async fn login_failed(&self, email: &str, user_id: Option<Uuid>, client: &ClientInfo) -> AuthError {
        let remaining = self.lockout.record_failure(email, &client.ip);

        self.security_log
            .record(
                SecurityEvent::FailedLogin,
                user_id,
                Some(client),
                json!({ "email": email, "remaining_attempts": remaining }),
            )
            .await;

        if remaining == 0 {
            self.security_log
                .record(SecurityEvent::AccountLocked, user_id, Some(client), json!({ "email": email }))
                .await;
            return AuthError::AccountLocked {
                retry_after: self.config.lockout_duration_secs.max(0) as u64,
            };
        }

        AuthError::InvalidCredentials {
            remaining_attempts: Some(remaining),
        }
    }

    pub async fn refresh_token(
        &self,
        request: RefreshTokenRequest,
    ) -> Result<AccessTokenResponse, AuthError> {
        let claims = self.jwt_service.validate_refresh_token(&request.refresh_token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        if !self.is_refresh_token_valid(user_id, &request.refresh_token).await? {
            return Err(AuthError::TokenRevoked);
        }

        let user = self
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        Ok(AccessTokenResponse {
            access_token: self.jwt_service.create_access_token(user.id, &user.email, user.role)?,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
        })
    }

    /// Always succeeds so callers cannot tell which addresses are registered
    pub async fn forgot_password(&self, email: &str, client: &ClientInfo) -> Result<(), AuthError> {
        let Some(user) = self.find_user_by_email(&normalize_email(email)).await? else {
            return Ok(());
        };
        if !user.is_active {
            return Ok(());
        }

        let issued = self.reset_codes.issue(user.id, &user.email);
        if let Err(err) = self
            .mailer
            .send_password_reset_email(&user.email, &user.name, &issued.code)
            .await
        {
            tracing::warn!(user_id = %user.id, error = %err, "Failed to send password reset email");
        }

        self.security_log
            .record(SecurityEvent::PasswordResetRequested, Some(user.id), Some(client), json!({}))
            .await;
        Ok(())
    }

    pub fn verify_reset_code(&self, request: &VerifyResetCodeRequest) -> Result<(), AuthError> {
        self.reset_codes
            .verify_code(&request.email, &request.code)
            .map(|_| ())
            .map_err(|err| self.code_error(err, CodePurpose::PasswordReset))
    }

    pub async fn reset_password(
        &self,
        request: ResetPasswordRequest,
        client: &ClientInfo,
    ) -> Result<(), AuthError> {
        self.check_password_policy("new_password", &request.new_password)?;

        let owner = self
            .reset_codes
            .consume_code(&request.email, &request.code)
            .map_err(|err| self.code_error(err, CodePurpose::PasswordReset))?;

        let password_hash = hash_password(&request.new_password, self.config.bcrypt_cost)?;
        let updated = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2 AND email = $3",
        )
        .bind(&password_hash)
        .bind(owner.user_id)
        .bind(&owner.email)
        .execute(&self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(self.code_error(CodeError::Invalid, CodePurpose::PasswordReset));
        }

        self.revoke_user_refresh_tokens(owner.user_id).await?;
        self.lockout.reset(&owner.email, &client.ip);
        self.security_log
            .record(SecurityEvent::PasswordReset, Some(owner.user_id), Some(client), json!({}))
            .await;
        Ok(())
    }

    pub async fn me(&self, user_id: Uuid) -> Result<UserResponse, AuthError> {
        Ok(UserResponse::from(self.get_user(user_id).await?))
    }

    /// Only whitelisted fields are written; body metrics are recomputed from the merged profile
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<UserResponse, AuthError> {
        let mut user = self.get_user(user_id).await?;

        if let Some(name) = request.name {
            user.name = sanitize_text(&name);
        }
        if request.phone.is_some() {
            user.phone = sanitize_opt(request.phone);
        }
        if request.gender.is_some() {
            user.gender = request.gender;
        }
        if request.birth_date.is_some() {
            user.birth_date = request.birth_date;
        }
        if request.height_cm.is_some() {
            user.height_cm = request.height_cm;
        }
        if request.weight_kg.is_some() {
            user.weight_kg = request.weight_kg;
        }
        if request.target_weight_kg.is_some() {
            user.target_weight_kg = request.target_weight_kg;
        }
        if let Some(level) = request.activity_level {
            user.activity_level = level;
        }
        if request.goal.is_some() {
            user.goal = sanitize_opt(request.goal);
        }
        if request.avatar.is_some() {
            user.avatar = request.avatar.map(|avatar| avatar.trim().to_string());
        }
        if request.address.is_some() {
            user.address = sanitize_opt(request.address);
        }
        if request.city.is_some() {
            user.city = sanitize_opt(request.city);
        }

        let metrics = user.health_metrics(Utc::now().date_naive());

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET
                name = $2, phone = $3, gender = $4, birth_date = $5, height_cm = $6,
                weight_kg = $7, target_weight_kg = $8, activity_level = $9, goal = $10,
                avatar = $11, address = $12, city = $13, bmi = $14, bmr = $15, tdee = $16,
                updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(user.gender)
        .bind(user.birth_date)
        .bind(user.height_cm)
        .bind(user.weight_kg)
        .bind(user.target_weight_kg)
        .bind(user.activity_level)
        .bind(&user.goal)
        .bind(&user.avatar)
        .bind(&user.address)
        .bind(&user.city)
        .bind(metrics.bmi)
        .bind(metrics.bmr)
        .bind(metrics.tdee)
        .fetch_one(&self.db)
        .await?;

        Ok(UserResponse::from(user))
    }

    /// Rotates the password, revokes every refresh token and returns a fresh pair
    pub async fn update_password(
        &self,
        session: &UserSession,
        request: UpdatePasswordRequest,
        client: &ClientInfo,
    ) -> Result<TokenPair, AuthError> {
        let user = self.get_user(session.user_id).await?;

        if !verify_password(&request.current_password, &user.password_hash)? {
            return Err(AuthError::field("current_password", "Current password is incorrect"));
        }
        if request.current_password == request.new_password {
            return Err(AuthError::field(
                "new_password",
                "New password must be different from current password",
            ));
        }
        self.check_password_policy("new_password", &request.new_password)?;

        let password_hash = hash_password(&request.new_password, self.config.bcrypt_cost)?;
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(&password_hash)
            .bind(user.id)
            .execute(&self.db)
            .await?;

        self.revoke_user_refresh_tokens(user.id).await?;
        self.blacklist_token(&session.jti, session.expires_at).await?;
        self.security_log
            .record(SecurityEvent::PasswordChanged, Some(user.id), Some(client), json!({}))
            .await;

        let tokens = self.jwt_service.create_token_pair(user.id, &user.email, user.role)?;
        self.store_refresh_token(user.id, &tokens.refresh_token).await?;
        Ok(tokens)
    }

    pub async fn update_fcm_token(&self, user_id: Uuid, fcm_token: Option<String>) -> Result<(), AuthError> {
        sqlx::query("UPDATE users SET fcm_token = $1, updated_at = NOW() WHERE id = $2")
            .bind(fcm_token.filter(|token| !token.trim().is_empty()))
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// The account becomes unverified until the new address is confirmed
    pub async fn change_email(
        &self,
        session: &UserSession,
        request: ChangeEmailRequest,
        client: &ClientInfo,
    ) -> Result<UserResponse, AuthError> {
        let user = self.get_user(session.user_id).await?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AuthError::IncorrectPassword);
        }

        let new_email = normalize_email(&request.new_email);
        if new_email == user.email {
            return Err(AuthError::field(
                "new_email",
                "New email must be different from current email",
            ));
        }
        if self.find_user_by_email(&new_email).await?.is_some() {
            return Err(AuthError::field("new_email", "This email is already registered"));
        }

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET email = $1, is_verified = FALSE, updated_at = NOW()
             WHERE id = $2 RETURNING *",
        )
        .bind(&new_email)
        .bind(user.id)
        .fetch_one(&self.db)
        .await?;

        self.send_verification(&user).await;
        self.security_log
            .record(
                SecurityEvent::EmailChanged,
                Some(user.id),
                Some(client),
                json!({ "old_email": session.email, "new_email": new_email }),
            )
            .await;

        Ok(UserResponse::from(user))
    }

    pub async fn logout(&self, session: &UserSession, client: &ClientInfo) -> Result<(), AuthError> {
        self.blacklist_token(&session.jti, session.expires_at).await?;
        self.revoke_user_refresh_tokens(session.user_id).await?;
        self.update_fcm_token(session.user_id, None).await?;

        self.security_log
            .record(SecurityEvent::Logout, Some(session.user_id), Some(client), json!({}))
            .await;
        Ok(())
    }

    /// Soft delete: the row stays, deactivated, with its email rewritten to free the address
    pub async fn delete_account(
        &self,
        session: &UserSession,
        request: DeleteAccountRequest,
        client: &ClientInfo,
    ) -> Result<(), AuthError> {
        let user = self.get_user(session.user_id).await?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AuthError::IncorrectPassword);
        }

        sqlx::query(
            "UPDATE users SET is_active = FALSE, email = $1, fcm_token = NULL, apple_id = NULL,
                trainer_id = NULL, updated_at = NOW()
             WHERE id = $2",
        )
        .bind(deleted_email(user.id, &user.email))
        .bind(user.id)
        .execute(&self.db)
        .await?;

        self.revoke_user_refresh_tokens(user.id).await?;
        self.blacklist_token(&session.jti, session.expires_at).await?;
        self.security_log
            .record(SecurityEvent::AccountDeleted, Some(user.id), Some(client), json!({}))
            .await;
        Ok(())
    }

    /// Links the Apple identity to an existing account or creates a verified one
    pub async fn apple_sign_in(
        &self,
        request: AppleSignInRequest,
        client: &ClientInfo,
    ) -> Result<AuthResponse, AuthError> {
        let identity = decode_identity_token(&request.identity_token, &request.user_identifier)?;
        let token_email = identity.email.as_deref().map(normalize_email);

        // Only an email asserted inside the token may link an existing account
        let existing = match self.find_user_by_apple_id(&identity.sub).await? {
            Some(user) => Some(user),
            None => match &token_email {
                Some(email) => self.find_user_by_email(email).await?,
                None => None,
            },
        };

        let user = match existing {
            Some(user) => {
                sqlx::query_as::<_, User>(
                    "UPDATE users SET apple_id = $1, is_verified = TRUE, last_login_at = NOW(),
                        updated_at = NOW()
                     WHERE id = $2 RETURNING *",
                )
                .bind(&identity.sub)
                .bind(user.id)
                .fetch_one(&self.db)
                .await?
            }
            None => {
                let email = token_email
                    .or_else(|| request.email.as_deref().map(normalize_email))
                    .ok_or_else(|| AuthError::field("email", "Email is required to create an account"))?;
                if self.find_user_by_email(&email).await?.is_some() {
                    return Err(AuthError::field(
                        "email",
                        "This email is already registered. Sign in with your password instead.",
                    ));
                }
                let name = request
                    .full_name
                    .as_deref()
                    .map(sanitize_text)
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| "VitaFit User".to_string());

                let user = self
                    .insert_user(CreateUser {
                        name,
                        email,
                        password_hash: hash_password(&generate_secure_token(), self.config.bcrypt_cost)?,
                        role: UserRole::Trainee,
                        phone: None,
                        gender: None,
                        apple_id: Some(identity.sub.clone()),
                        is_verified: true,
                    })
                    .await?;
                if let Err(err) = self.mailer.send_welcome_email(&user.email, &user.name).await {
                    tracing::warn!(user_id = %user.id, error = %err, "Failed to send welcome email");
                }
                user
            }
        };

        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        self.security_log
            .record(SecurityEvent::AppleSignIn, Some(user.id), Some(client), json!({}))
            .await;

        self.issue_session(user).await
    }

    /// Validated access token, not revoked, owned by an active user
    pub async fn validate_session(&self, token: &str) -> Result<UserSession, AuthError> {
        let session = self.jwt_service.extract_user_session(token)?;

        if self.is_token_blacklisted(&session.jti).await? {
            return Err(AuthError::TokenRevoked);
        }

        let is_active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM users WHERE id = $1")
            .bind(session.user_id)
            .fetch_optional(&self.db)
            .await?;

        match is_active {
            Some(true) => Ok(session),
            Some(false) => Err(AuthError::AccountInactive),
            None => Err(AuthError::InvalidToken),
        }
    }

    pub async fn is_token_blacklisted(&self, jti: &str) -> Result<bool, AuthError> {
        let result = sqlx::query("SELECT 1 FROM token_blacklist WHERE jti = $1 AND expires_at > NOW()")
            .bind(jti)
            .fetch_optional(&self.db)
            .await?;

        Ok(result.is_some())
    }

    /// Drop expired codes, lockouts, blacklist entries and refresh tokens
    pub async fn cleanup_expired(&self) -> Result<(), AuthError> {
        let codes = self.verification_codes.purge_expired() + self.reset_codes.purge_expired();
        self.lockout.cleanup();

        let blacklisted = sqlx::query("DELETE FROM token_blacklist WHERE expires_at <= NOW()")
            .execute(&self.db)
            .await?
            .rows_affected();
        let refresh = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= NOW() OR revoked")
            .execute(&self.db)
            .await?
            .rows_affected();

        tracing::debug!(codes, blacklisted, refresh, "Expired auth state removed");
        Ok(())
    }

    // Private helper methods

    fn check_password_policy(&self, field: &str, password: &str) -> Result<(), AuthError> {
        let violations = self.password_policy.violations(password);
        if violations.is_empty() {
            return Ok(());
        }

        let mut errors = crate::models::FieldErrors::new();
        errors.insert(field.to_string(), violations);
        Err(AuthError::Validation(errors))
    }

    fn code_error(&self, err: CodeError, purpose: CodePurpose) -> AuthError {
        AuthError::InvalidCode(err.message(purpose).to_string())
    }

    async fn send_verification(&self, user: &User) {
        let issued = self.verification_codes.issue(user.id, &user.email);
        if let Err(err) = self
            .mailer
            .send_verification_email(&user.email, &user.name, &issued.code, &issued.token)
            .await
        {
            tracing::warn!(user_id = %user.id, error = %err, "Failed to send verification email");
        }
    }

    async fn issue_session(&self, user: User) -> Result<AuthResponse, AuthError> {
        let tokens = self.jwt_service.create_token_pair(user.id, &user.email, user.role)?;
        self.store_refresh_token(user.id, &tokens.refresh_token).await?;

        Ok(AuthResponse {
            user: UserResponse::from(user),
            tokens,
        })
    }

    async fn get_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.find_user_by_id(user_id).await?.ok_or(AuthError::UserNotFound)
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_user_by_apple_id(&self, apple_id: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE apple_id = $1")
            .bind(apple_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: CreateUser) -> Result<User, AuthError> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, name, email, password_hash, role, phone, gender, apple_id, is_verified)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(&user.phone)
        .bind(user.gender)
        .bind(&user.apple_id)
        .bind(user.is_verified)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn store_refresh_token(&self, user_id: Uuid, refresh_token: &str) -> Result<(), AuthError> {
        let expires_at = Utc::now() + self.jwt_service.refresh_token_expires_in();

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(hash_token(refresh_token))
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn is_refresh_token_valid(&self, user_id: Uuid, refresh_token: &str) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "SELECT 1 FROM refresh_tokens
             WHERE user_id = $1 AND token_hash = $2 AND revoked = FALSE AND expires_at > NOW()",
        )
        .bind(user_id)
        .bind(hash_token(refresh_token))
        .fetch_optional(&self.db)
        .await?;

        Ok(result.is_some())
    }

    async fn revoke_user_refresh_tokens(&self, user_id: Uuid) -> Result<(), AuthError> {
        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND revoked = FALSE")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn blacklist_token(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO token_blacklist (jti, expires_at) VALUES ($1, $2)
             ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

fn deleted_email(user_id: Uuid, email: &str) -> String {
    format!("deleted_{}_{}", user_id, email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deleted_email_frees_address() {
        let id = Uuid::nil();
        assert_eq!(
            deleted_email(id, "sara@example.com"),
            "deleted_00000000-0000-0000-0000-000000000000_sara@example.com"
        );
    }
}
