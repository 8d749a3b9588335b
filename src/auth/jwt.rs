use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::{AuthError, Claims, TokenPair, TokenType, UserRole, UserSession};
use crate::config::AuthConfig;

/// Issues and validates access and refresh tokens, each signed with its own secret
#[derive(Clone)]
pub struct JwtService {
    access_encoding_key: EncodingKey,
    access_decoding_key: DecodingKey,
    refresh_encoding_key: EncodingKey,
    refresh_decoding_key: DecodingKey,
    access_token_expires_in: Duration,
    refresh_token_expires_in: Duration,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("access_keys", &"[REDACTED]")
            .field("refresh_keys", &"[REDACTED]")
            .field("access_token_expires_in", &self.access_token_expires_in)
            .field("refresh_token_expires_in", &self.refresh_token_expires_in)
            .finish()
    }
}

impl JwtService {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_token_expires_in: Duration,
        refresh_token_expires_in: Duration,
    ) -> Self {
        Self {
            access_encoding_key: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding_key: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding_key: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding_key: DecodingKey::from_secret(refresh_secret.as_bytes()),
            access_token_expires_in,
            refresh_token_expires_in,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            &config.jwt_refresh_secret,
            Duration::minutes(config.access_token_ttl_minutes),
            Duration::days(config.refresh_token_ttl_days),
        )
    }

    pub fn create_access_token(
        &self,
        user_id: Uuid,
        email: &str,
        role: UserRole,
    ) -> Result<String, AuthError> {
        self.sign(user_id, email, role, TokenType::Access)
    }

    pub fn create_refresh_token(
        &self,
        user_id: Uuid,
        email: &str,
        role: UserRole,
    ) -> Result<String, AuthError> {
        self.sign(user_id, email, role, TokenType::Refresh)
    }

    fn sign(
        &self,
        user_id: Uuid,
        email: &str,
        role: UserRole,
        token_type: TokenType,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let (lifetime, key) = match token_type {
            TokenType::Access => (self.access_token_expires_in, &self.access_encoding_key),
            TokenType::Refresh => (self.refresh_token_expires_in, &self.refresh_encoding_key),
        };

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role,
            token_type,
            exp: (now + lifetime).timestamp() as usize,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, key).map_err(AuthError::Jwt)
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.validate(token, &self.access_decoding_key, TokenType::Access)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.validate(token, &self.refresh_decoding_key, TokenType::Refresh)
    }

    fn validate(&self, token: &str, key: &DecodingKey, expected: TokenType) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, key, &validation)
            .map(|token_data| token_data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })?;

        if claims.token_type != expected {
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }

    pub fn extract_user_session(&self, token: &str) -> Result<UserSession, AuthError> {
        let claims = self.validate_access_token(token)?;
        UserSession::from_claims(&claims).map_err(|_| AuthError::InvalidToken)
    }

    pub fn access_token_expires_in_seconds(&self) -> usize {
        self.access_token_expires_in.num_seconds() as usize
    }

    pub fn refresh_token_expires_in(&self) -> Duration {
        self.refresh_token_expires_in
    }

    pub fn create_token_pair(
        &self,
        user_id: Uuid,
        email: &str,
        role: UserRole,
    ) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.create_access_token(user_id, email, role)?,
            refresh_token: self.create_refresh_token(user_id, email, role)?,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expires_in_seconds(),
        })
    }
}

/// Extract bearer token from authorization header
pub fn extract_bearer_token(auth_header: &str) -> Result<&str, AuthError> {
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeaderFormat)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeaderFormat);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn service() -> JwtService {
        JwtService::new("access_secret", "refresh_secret", Duration::minutes(60), Duration::days(90))
    }

    #[test]
    fn test_access_token_round_trip() {
        let jwt_service = service();
        let user_id = Uuid::new_v4();

        let token = jwt_service
            .create_access_token(user_id, "noor@example.com", UserRole::Trainee)
            .unwrap();
        let claims = jwt_service.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "noor@example.com");
        assert_eq!(claims.role, UserRole::Trainee);
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn test_refresh_token_rejected_as_access_token() {
        let jwt_service = service();
        let pair = jwt_service
            .create_token_pair(Uuid::new_v4(), "noor@example.com", UserRole::Trainee)
            .unwrap();

        assert!(jwt_service.validate_refresh_token(&pair.refresh_token).is_ok());
        assert_matches!(
            jwt_service.validate_access_token(&pair.refresh_token),
            Err(AuthError::InvalidToken)
        );
        assert_matches!(
            jwt_service.validate_refresh_token(&pair.access_token),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_same_secret_still_checks_token_type() {
        let jwt_service = JwtService::new("shared", "shared", Duration::minutes(5), Duration::days(1));
        let refresh = jwt_service
            .create_refresh_token(Uuid::new_v4(), "a@b.co", UserRole::Admin)
            .unwrap();

        assert_matches!(
            jwt_service.validate_access_token(&refresh),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_expired_token() {
        let jwt_service = JwtService::new("s", "r", Duration::seconds(-120), Duration::days(1));
        let token = jwt_service
            .create_access_token(Uuid::new_v4(), "a@b.co", UserRole::Trainee)
            .unwrap();

        assert_matches!(
            jwt_service.validate_access_token(&token),
            Err(AuthError::TokenExpired)
        );
    }

    #[test]
    fn test_tampered_token() {
        let jwt_service = service();
        let other = JwtService::new("other", "other_refresh", Duration::minutes(60), Duration::days(90));
        let token = other
            .create_access_token(Uuid::new_v4(), "a@b.co", UserRole::Trainee)
            .unwrap();

        assert_matches!(jwt_service.validate_access_token(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(extract_bearer_token("Bearer test_token").unwrap(), "test_token");
        assert!(extract_bearer_token("Invalid header").is_err());
        assert!(extract_bearer_token("Bearer ").is_err());
        assert!(extract_bearer_token("bearer abc").is_err());
    }

    #[test]
    fn test_user_session_extraction() {
        let jwt_service = service();
        let user_id = Uuid::new_v4();
        let token = jwt_service
            .create_access_token(user_id, "coach@example.com", UserRole::Trainer)
            .unwrap();

        let session = jwt_service.extract_user_session(&token).unwrap();
        assert_eq!(session.user_id, user_id);
        assert_eq!(session.role, UserRole::Trainer);
        assert!(!session.jti.is_empty());
        assert!(session.expires_at > Utc::now());
    }
}
