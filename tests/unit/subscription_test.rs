use chrono::{Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal_macros::dec;
use uuid::Uuid;

use vitafit::models::{DomainError, Subscription, SubscriptionStatus};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
}

fn subscription(status: SubscriptionStatus, sessions_count: i32) -> Subscription {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    Subscription {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        trainer_id: None,
        plan_id: Uuid::new_v4(),
        plan_name: "Progress".to_string(),
        price: dec!(349.00),
        sessions_count,
        sessions_used: 0,
        start_date: today(),
        end_date: today() + Duration::days(30),
        status,
        payment_method: None,
        cancelled_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn test_quota_runs_out() {
    let mut sub = subscription(SubscriptionStatus::Active, 2);

    assert_eq!(sub.use_session(today()).unwrap(), 1);
    assert_eq!(sub.use_session(today()).unwrap(), 0);
    assert!(matches!(sub.use_session(today()), Err(DomainError::NoSessionsRemaining)));
    assert_eq!(sub.sessions_used, 2);
    assert!(!sub.is_active(today()));
}

#[test]
fn test_pending_subscription_cannot_be_used() {
    let mut sub = subscription(SubscriptionStatus::Pending, 4);
    assert!(matches!(sub.use_session(today()), Err(DomainError::SubscriptionNotActive)));
}

#[test]
fn test_activate_rebases_period() {
    let mut sub = subscription(SubscriptionStatus::Pending, 4);
    let later = today() + Duration::days(3);

    sub.activate(later, Utc::now()).unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Active);
    assert_eq!(sub.start_date, later);
    assert_eq!(sub.end_date, later + Duration::days(30));
    assert!(sub.activate(later, Utc::now()).is_err());
}

#[test]
fn test_lapsed_subscription_expires_and_stays_expired() {
    let mut sub = subscription(SubscriptionStatus::Active, 4);
    let after_end = today() + Duration::days(31);

    assert!(matches!(sub.use_session(after_end), Err(DomainError::SubscriptionNotActive)));
    sub.expire(after_end, Utc::now()).unwrap();
    assert!(sub.is_expired(after_end));
    assert!(sub.cancel(Utc::now()).is_err());
}

proptest! {
    #[test]
    fn prop_sessions_used_never_exceeds_count(count in 0i32..40, attempts in 0usize..60) {
        let mut sub = subscription(SubscriptionStatus::Active, count);
        for _ in 0..attempts {
            let _ = sub.use_session(today());
            prop_assert!(sub.sessions_used <= sub.sessions_count);
        }
        prop_assert_eq!(sub.sessions_used, count.min(attempts as i32));
    }
}
