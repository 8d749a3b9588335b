use bcrypt::{hash, verify};
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Failed to hash password")]
    HashingFailed(#[source] bcrypt::BcryptError),
    #[error("Failed to verify password")]
    VerificationFailed(#[source] bcrypt::BcryptError),
}

const SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

const WEAK_PASSWORDS: [&str; 5] = ["password", "12345678", "qwerty", "abc123", "password123"];

/// Password strength requirements
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_number: bool,
    pub require_special_char: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_uppercase: true,
            require_lowercase: true,
            require_number: true,
            require_special_char: true,
        }
    }
}

impl PasswordPolicy {
    /// Every rule the password breaks; empty when it is acceptable
    pub fn violations(&self, password: &str) -> Vec<String> {
        let mut errors = Vec::new();
        let length = password.chars().count();

        if length < self.min_length {
            errors.push(format!("Password must be at least {} characters long", self.min_length));
        }
        if length > self.max_length {
            errors.push(format!("Password must be no more than {} characters long", self.max_length));
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
            errors.push("Password must contain at least one uppercase letter".to_string());
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
            errors.push("Password must contain at least one lowercase letter".to_string());
        }
        if self.require_number && !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push("Password must contain at least one number".to_string());
        }
        if self.require_special_char && !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
            errors.push("Password must contain at least one special character (!@#$%^&*(),.?\":{}|<>)".to_string());
        }

        let lowered = password.to_lowercase();
        if WEAK_PASSWORDS.contains(&lowered.as_str()) {
            errors.push("Password is too common. Please choose a stronger password".to_string());
        }

        errors
    }

    pub fn is_valid(&self, password: &str) -> bool {
        self.violations(password).is_empty()
    }
}

/// Hash a password using bcrypt
pub fn hash_password(password: &str, cost: u32) -> Result<String, PasswordError> {
    hash(password, cost).map_err(PasswordError::HashingFailed)
}

/// Verify a password against its hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    verify(password, hash).map_err(PasswordError::VerificationFailed)
}

/// 32 random bytes, hex encoded
pub fn generate_secure_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Six digit one-time code
pub fn generate_numeric_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_password_passes() {
        let policy = PasswordPolicy::default();
        assert!(policy.is_valid("Str0ng!Pass"));
        assert!(policy.is_valid("Yalla#Gym2024"));
    }

    #[test]
    fn test_all_violations_are_collected() {
        let policy = PasswordPolicy::default();
        let errors = policy.violations("abc");

        assert!(errors.iter().any(|e| e.contains("at least 8 characters")));
        assert!(errors.iter().any(|e| e.contains("uppercase")));
        assert!(errors.iter().any(|e| e.contains("number")));
        assert!(errors.iter().any(|e| e.contains("special character")));
        assert!(!errors.iter().any(|e| e.contains("lowercase")));
    }

    #[test]
    fn test_weak_passwords_rejected() {
        let policy = PasswordPolicy::default();
        let errors = policy.violations("Password123");
        assert!(errors.iter().any(|e| e.contains("too common")));
        assert!(errors.iter().any(|e| e.contains("special character")));

        // Only exact matches count as common
        assert!(policy.is_valid("Password123!"));
    }

    #[test]
    fn test_special_chars_limited_to_known_set() {
        let policy = PasswordPolicy::default();
        assert!(!policy.is_valid("Abcdefg1~"));
        assert!(policy.is_valid("Abcdefg1?"));
    }

    #[test]
    fn test_too_long_password() {
        let policy = PasswordPolicy::default();
        let long = format!("Aa1!{}", "x".repeat(130));
        assert!(policy
            .violations(&long)
            .iter()
            .any(|e| e.contains("no more than 128")));
    }

    #[test]
    fn test_hash_and_verify() {
        let hashed = hash_password("Str0ng!Pass", 4).unwrap();
        assert_ne!(hashed, "Str0ng!Pass");
        assert!(hashed.starts_with("$2"));
        assert!(verify_password("Str0ng!Pass", &hashed).unwrap());
        assert!(!verify_password("Wr0ng!Pass", &hashed).unwrap());
    }

    #[test]
    fn test_numeric_code_shape() {
        for _ in 0..100 {
            let code = generate_numeric_code();
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&value));
        }
    }

    #[test]
    fn test_secure_token_and_hash() {
        let token = generate_secure_token();
        assert_eq!(token.len(), 64);
        assert_ne!(token, generate_secure_token());

        let hashed = hash_token(&token);
        assert_eq!(hashed.len(), 64);
        assert_eq!(hashed, hash_token(&token));
        assert_ne!(hashed, token);
    }
}
