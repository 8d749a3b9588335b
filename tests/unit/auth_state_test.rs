use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use vitafit::auth::codes::{CodeError, CodePurpose, CodeStore};
use vitafit::auth::lockout::LoginLockout;
use vitafit::auth::password::PasswordPolicy;

#[test]
fn test_reset_code_flow_verify_then_consume() {
    let store = CodeStore::new(CodePurpose::PasswordReset, Duration::minutes(15));
    let now = Utc.with_ymd_and_hms(2026, 5, 2, 8, 0, 0).unwrap();
    let user_id = Uuid::new_v4();

    let issued = store.issue_at(user_id, "Noor@Example.com", now);

    // verification leaves the code usable for the actual reset
    let owner = store.verify_code_at("noor@example.com", &issued.code, now).unwrap();
    assert_eq!(owner.user_id, user_id);

    store
        .consume_code_at("noor@example.com", &issued.code, now + Duration::minutes(1))
        .unwrap();
    assert_eq!(
        store.consume_code_at("noor@example.com", &issued.code, now + Duration::minutes(2)),
        Err(CodeError::Invalid)
    );
}

#[test]
fn test_reissue_replaces_previous_code() {
    let store = CodeStore::new(CodePurpose::EmailVerification, Duration::minutes(15));
    let now = Utc::now();
    let user_id = Uuid::new_v4();

    let first = store.issue_at(user_id, "noor@example.com", now);
    let second = store.issue_at(user_id, "noor@example.com", now);

    assert_eq!(store.len(), 1);
    assert!(store.consume_token_at(&first.token, now).is_err());
    assert!(store.consume_token_at(&second.token, now).is_ok());
}

#[test]
fn test_code_expires() {
    let store = CodeStore::new(CodePurpose::PasswordReset, Duration::minutes(15));
    let now = Utc::now();
    let issued = store.issue_at(Uuid::new_v4(), "noor@example.com", now);

    assert_eq!(
        store.verify_code_at("noor@example.com", &issued.code, now + Duration::minutes(16)),
        Err(CodeError::Expired)
    );
}

#[test]
fn test_lockout_is_scoped_to_email_and_ip() {
    let lockout = LoginLockout::new(5, Duration::minutes(15));
    let now = Utc::now();

    for _ in 0..5 {
        lockout.record_failure_at("huda@example.com", "10.0.0.1", now);
    }

    assert!(lockout.check_at("huda@example.com", "10.0.0.1", now).is_err());
    assert!(lockout.check_at("huda@example.com", "10.0.0.2", now).is_ok());
    assert!(lockout.check_at("other@example.com", "10.0.0.1", now).is_ok());
    assert!(lockout
        .check_at("huda@example.com", "10.0.0.1", now + Duration::minutes(16))
        .is_ok());
}

#[test]
fn test_password_policy() {
    let policy = PasswordPolicy::default();
    assert!(policy.is_valid("Str0ng!Pass"));
    assert!(!policy.is_valid("alllowercase1!"));
    assert!(!policy.is_valid("Sh0rt!"));
}
