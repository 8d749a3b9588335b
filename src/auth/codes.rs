use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::password::{generate_numeric_code, generate_secure_token, hash_token};

const MAX_FAILED_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePurpose {
    EmailVerification,
    PasswordReset,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    #[error("invalid code")]
    Invalid,
    #[error("code expired")]
    Expired,
    #[error("too many attempts")]
    TooManyAttempts,
}

impl CodeError {
    /// User-facing message for the given purpose
    pub fn message(&self, purpose: CodePurpose) -> &'static str {
        match (purpose, self) {
            (CodePurpose::EmailVerification, CodeError::Invalid) => "Invalid verification code",
            (CodePurpose::EmailVerification, CodeError::Expired) => "Verification code has expired",
            (CodePurpose::PasswordReset, CodeError::Invalid) => "Invalid reset code",
            (CodePurpose::PasswordReset, CodeError::Expired) => "Reset code has expired",
            (_, CodeError::TooManyAttempts) => "Too many incorrect attempts. Please request a new code",
        }
    }
}

/// Constant-time comparison of a stored code with a submitted one
fn codes_match(stored: &str, submitted: &str) -> bool {
    stored.len() == submitted.len() && bool::from(stored.as_bytes().ct_eq(submitted.as_bytes()))
}

/// Returned once at issue time; only the hash of `token` is kept
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub token: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Owner of a successfully checked code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeOwner {
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone)]
struct CodeRecord {
    user_id: Uuid,
    email: String,
    code: String,
    expires_at: DateTime<Utc>,
    failed_attempts: u32,
}

/// In-memory one-time codes for a single purpose, keyed by the SHA-256 of the link token.
/// At most one live record exists per email.
#[derive(Debug, Clone)]
pub struct CodeStore {
    purpose: CodePurpose,
    ttl: Duration,
    records: Arc<Mutex<HashMap<String, CodeRecord>>>,
}

impl CodeStore {
    pub fn new(purpose: CodePurpose, ttl: Duration) -> Self {
        Self {
            purpose,
            ttl,
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn purpose(&self) -> CodePurpose {
        self.purpose
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, CodeRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn issue(&self, user_id: Uuid, email: &str) -> IssuedCode {
        self.issue_at(user_id, email, Utc::now())
    }

    pub fn issue_at(&self, user_id: Uuid, email: &str, now: DateTime<Utc>) -> IssuedCode {
        let email = email.to_lowercase();
        let token = generate_secure_token();
        let code = generate_numeric_code();
        let expires_at = now + self.ttl;

        let mut records = self.records();
        records.retain(|_, record| record.email != email);
        records.insert(
            hash_token(&token),
            CodeRecord {
                user_id,
                email,
                code: code.clone(),
                expires_at,
                failed_attempts: 0,
            },
        );

        IssuedCode { token, code, expires_at }
    }

    /// Check a code without consuming it
    pub fn verify_code(&self, email: &str, code: &str) -> Result<CodeOwner, CodeError> {
        self.check_code(email, code, false, Utc::now())
    }

    pub fn verify_code_at(&self, email: &str, code: &str, now: DateTime<Utc>) -> Result<CodeOwner, CodeError> {
        self.check_code(email, code, false, now)
    }

    /// Check a code and remove it on success
    pub fn consume_code(&self, email: &str, code: &str) -> Result<CodeOwner, CodeError> {
        self.check_code(email, code, true, Utc::now())
    }

    pub fn consume_code_at(&self, email: &str, code: &str, now: DateTime<Utc>) -> Result<CodeOwner, CodeError> {
        self.check_code(email, code, true, now)
    }

    fn check_code(
        &self,
        email: &str,
        code: &str,
        consume: bool,
        now: DateTime<Utc>,
    ) -> Result<CodeOwner, CodeError> {
        let email = email.to_lowercase();
        let mut records = self.records();

        let key = records
            .iter()
            .find(|(_, record)| record.email == email)
            .map(|(key, _)| key.clone())
            .ok_or(CodeError::Invalid)?;

        let Some(record) = records.get_mut(&key) else {
            return Err(CodeError::Invalid);
        };

        if now > record.expires_at {
            records.remove(&key);
            return Err(CodeError::Expired);
        }

        if !codes_match(&record.code, code) {
            record.failed_attempts += 1;
            if record.failed_attempts >= MAX_FAILED_ATTEMPTS {
                records.remove(&key);
                return Err(CodeError::TooManyAttempts);
            }
            return Err(CodeError::Invalid);
        }

        let owner = CodeOwner {
            user_id: record.user_id,
            email: record.email.clone(),
        };
        if consume {
            records.remove(&key);
        }

        Ok(owner)
    }

    /// Redeem a link token; single use
    pub fn consume_token(&self, token: &str) -> Result<CodeOwner, CodeError> {
        self.consume_token_at(token, Utc::now())
    }

    pub fn consume_token_at(&self, token: &str, now: DateTime<Utc>) -> Result<CodeOwner, CodeError> {
        let record = self
            .records()
            .remove(&hash_token(token))
            .ok_or(CodeError::Invalid)?;

        if now > record.expires_at {
            return Err(CodeError::Expired);
        }

        Ok(CodeOwner {
            user_id: record.user_id,
            email: record.email,
        })
    }

    pub fn invalidate(&self, email: &str) {
        let email = email.to_lowercase();
        self.records().retain(|_, record| record.email != email);
    }

    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut records = self.records();
        let before = records.len();
        records.retain(|_, record| record.expires_at >= now);
        before - records.len()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
