use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use serde::Deserialize;

use crate::auth::AuthError;

/// Claims read from an Apple identity token payload
#[derive(Debug, Clone, Deserialize)]
pub struct AppleIdentity {
    pub sub: String,
    pub email: Option<String>,
    pub exp: Option<i64>,
    #[serde(default)]
    pub iss: Option<String>,
}

/// Decode the payload segment of an Apple identity token.
///
/// The signature is not checked against Apple's keys; the subject must match the
/// identifier the client sent and the token must not be expired.
pub fn decode_identity_token(identity_token: &str, user_identifier: &str) -> Result<AppleIdentity, AuthError> {
    decode_identity_token_at(identity_token, user_identifier, Utc::now().timestamp())
}

pub fn decode_identity_token_at(
    identity_token: &str,
    user_identifier: &str,
    now: i64,
) -> Result<AppleIdentity, AuthError> {
    let malformed = || AuthError::InvalidAppleToken("Invalid Apple identity token".to_string());

    let segments: Vec<&str> = identity_token.split('.').collect();
    if segments.len() != 3 {
        return Err(malformed());
    }

    // Some clients pad the segment
    let payload = URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .map_err(|_| malformed())?;
    let identity: AppleIdentity = serde_json::from_slice(&payload).map_err(|_| malformed())?;

    if identity.sub != user_identifier {
        return Err(AuthError::InvalidAppleToken(
            "Apple identity token does not match user".to_string(),
        ));
    }

    if let Some(exp) = identity.exp {
        if exp <= now {
            return Err(AuthError::InvalidAppleToken("Apple identity token has expired".to_string()));
        }
    }

    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn token(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","kid":"test"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{}.{}.signature", header, body)
    }

    #[test]
    fn test_decodes_valid_token() {
        let now = 1_700_000_000;
        let identity = decode_identity_token_at(
            &token(json!({ "sub": "001234.abc", "email": "rana@privaterelay.appleid.com", "exp": now + 600 })),
            "001234.abc",
            now,
        )
        .unwrap();

        assert_eq!(identity.sub, "001234.abc");
        assert_eq!(identity.email.as_deref(), Some("rana@privaterelay.appleid.com"));
    }

    #[test]
    fn test_rejects_mismatched_subject() {
        let result = decode_identity_token_at(&token(json!({ "sub": "someone-else" })), "001234.abc", 0);
        assert_matches!(result, Err(AuthError::InvalidAppleToken(message)) if message.contains("does not match"));
    }

    #[test]
    fn test_rejects_expired_token() {
        let now = 1_700_000_000;
        let result = decode_identity_token_at(&token(json!({ "sub": "x", "exp": now - 1 })), "x", now);
        assert_matches!(result, Err(AuthError::InvalidAppleToken(message)) if message.contains("expired"));
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        assert!(decode_identity_token_at("not-a-jwt", "x", 0).is_err());
        assert!(decode_identity_token_at("a.!!!.c", "x", 0).is_err());
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("plain text"));
        assert!(decode_identity_token_at(&not_json, "x", 0).is_err());
    }
}
