use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::middleware::ClientInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    UserRegistered,
    EmailVerified,
    UserLogin,
    FailedLogin,
    AccountLocked,
    Logout,
    PasswordResetRequested,
    PasswordReset,
    PasswordChanged,
    EmailChanged,
    AccountDeleted,
    AppleSignIn,
    RoleChanged,
    AccountStatusChanged,
}

impl SecurityEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEvent::UserRegistered => "USER_REGISTERED",
            SecurityEvent::EmailVerified => "EMAIL_VERIFIED",
            SecurityEvent::UserLogin => "USER_LOGIN",
            SecurityEvent::FailedLogin => "FAILED_LOGIN",
            SecurityEvent::AccountLocked => "ACCOUNT_LOCKED",
            SecurityEvent::Logout => "LOGOUT",
            SecurityEvent::PasswordResetRequested => "PASSWORD_RESET_REQUESTED",
            SecurityEvent::PasswordReset => "PASSWORD_RESET",
            SecurityEvent::PasswordChanged => "PASSWORD_CHANGED",
            SecurityEvent::EmailChanged => "EMAIL_CHANGED",
            SecurityEvent::AccountDeleted => "ACCOUNT_DELETED",
            SecurityEvent::AppleSignIn => "APPLE_SIGN_IN",
            SecurityEvent::RoleChanged => "ROLE_CHANGED",
            SecurityEvent::AccountStatusChanged => "ACCOUNT_STATUS_CHANGED",
        }
    }

    fn is_warning(&self) -> bool {
        matches!(self, SecurityEvent::FailedLogin | SecurityEvent::AccountLocked)
    }
}

/// Writes security events to `activity_logs`. Never fails the caller.
#[derive(Debug, Clone)]
pub struct SecurityLogService {
    db: PgPool,
}

impl SecurityLogService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn record(
        &self,
        event: SecurityEvent,
        user_id: Option<Uuid>,
        client: Option<&ClientInfo>,
        details: Value,
    ) {
        let ip = client.map(|c| c.ip.as_str());
        if event.is_warning() {
            tracing::warn!(event = event.as_str(), ?user_id, ip, %details, "Security event");
        } else {
            tracing::info!(event = event.as_str(), ?user_id, ip, "Security event");
        }

        let result = sqlx::query(
            "INSERT INTO activity_logs (id, user_id, action, ip_address, user_agent, details)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(event.as_str())
        .bind(ip)
        .bind(client.and_then(|c| c.user_agent.as_deref()))
        .bind(sqlx::types::Json(details))
        .execute(&self.db)
        .await;

        if let Err(err) = result {
            tracing::warn!(event = event.as_str(), error = %err, "Failed to persist security event");
        }
    }
}
