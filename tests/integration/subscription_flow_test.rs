use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

use super::auth_flow_test::verified_login;
use crate::common::TestApp;
use vitafit::models::{CreatePlan, DomainError, PaymentMethod, SubscribeRequest, SubscriptionStatus};
use vitafit::services::SubscriptionFilter;
use vitafit::ApiError;

#[tokio::test]
async fn test_lapsed_pending_subscription_cannot_become_second_active() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let subscriptions = &app.state.subscription_service;

    let plan = subscriptions
        .create_plan(CreatePlan {
            name: format!("Monthly {}", Uuid::new_v4().simple()),
            description: None,
            price: dec!(199.00),
            duration_days: 30,
            sessions_count: 4,
            features: vec![],
            is_active: true,
        })
        .await
        .unwrap();

    let (_, data) = verified_login(&app, "subscriber").await;
    let user_id = Uuid::parse_str(data["user"]["id"].as_str().unwrap()).unwrap();

    // pending subscription whose period ran out before anyone activated it
    let today = Utc::now().date_naive();
    let stale_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO subscriptions
            (id, user_id, plan_id, plan_name, price, sessions_count, start_date, end_date, status)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending')",
    )
    .bind(stale_id)
    .bind(user_id)
    .bind(plan.id)
    .bind(&plan.name)
    .bind(plan.price)
    .bind(plan.sessions_count)
    .bind(today - Duration::days(40))
    .bind(today - Duration::days(10))
    .execute(&app.state.db)
    .await
    .unwrap();

    let fresh = subscriptions
        .subscribe(
            user_id,
            SubscribeRequest {
                plan_id: plan.id,
                trainer_id: None,
                payment_method: PaymentMethod::Card,
            },
        )
        .await
        .unwrap();
    subscriptions.activate(fresh.subscription.id).await.unwrap();

    let result = subscriptions.activate(stale_id).await;
    assert!(matches!(
        result,
        Err(ApiError::Domain(DomainError::ActiveSubscriptionExists))
    ));

    subscriptions.expire_overdue().await.unwrap();
    let page = subscriptions
        .list_subscriptions(
            &SubscriptionFilter {
                status: None,
                user_id: Some(user_id),
            },
            Default::default(),
        )
        .await
        .unwrap();
    let active = page
        .items
        .iter()
        .filter(|s| s.subscription.status == SubscriptionStatus::Active)
        .count();
    let stale = page
        .items
        .iter()
        .find(|s| s.subscription.id == stale_id)
        .unwrap();
    assert_eq!(active, 1);
    assert_eq!(stale.subscription.status, SubscriptionStatus::Expired);
}
