use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::auth::{UserRole, UserSession};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    sanitize_opt, sanitize_text, single_field_error, subscription_period, CreatePlan, DomainError,
    PageParams, Paginated, SubscribeRequest, Subscription, SubscriptionPlan, SubscriptionResponse,
    SubscriptionStatus, UpdatePlan,
};
use crate::services::user_service::ensure_trainer_capacity;

#[derive(Debug, Deserialize, Default)]
pub struct SubscriptionFilter {
    pub status: Option<SubscriptionStatus>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct SubscriptionService {
    db: PgPool,
}

impl SubscriptionService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_plans(&self, include_inactive: bool) -> ApiResult<Vec<SubscriptionPlan>> {
        let plans = sqlx::query_as::<_, SubscriptionPlan>(
            "SELECT * FROM subscription_plans WHERE ($1 OR is_active) ORDER BY price",
        )
        .bind(include_inactive)
        .fetch_all(&self.db)
        .await?;
        Ok(plans)
    }

    pub async fn get_plan(&self, plan_id: Uuid) -> ApiResult<SubscriptionPlan> {
        sqlx::query_as::<_, SubscriptionPlan>("SELECT * FROM subscription_plans WHERE id = $1")
            .bind(plan_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::not_found("Subscription plan"))
    }

    pub async fn create_plan(&self, request: CreatePlan) -> ApiResult<SubscriptionPlan> {
        if request.price.is_sign_negative() {
            return Err(ApiError::Validation(single_field_error("price", "Price cannot be negative")));
        }

        let plan = sqlx::query_as::<_, SubscriptionPlan>(
            "INSERT INTO subscription_plans
                (id, name, description, price, duration_days, sessions_count, features, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(sanitize_text(&request.name))
        .bind(sanitize_opt(request.description))
        .bind(request.price)
        .bind(request.duration_days)
        .bind(request.sessions_count)
        .bind(Json(request.features))
        .bind(request.is_active)
        .fetch_one(&self.db)
        .await?;
        Ok(plan)
    }

    /// Existing subscriptions keep their snapshot of the plan
    pub async fn update_plan(&self, plan_id: Uuid, request: UpdatePlan) -> ApiResult<SubscriptionPlan> {
        if request.price.is_some_and(|price| price.is_sign_negative()) {
            return Err(ApiError::Validation(single_field_error("price", "Price cannot be negative")));
        }

        sqlx::query_as::<_, SubscriptionPlan>(
            "UPDATE subscription_plans SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                duration_days = COALESCE($5, duration_days),
                sessions_count = COALESCE($6, sessions_count),
                features = COALESCE($7, features),
                is_active = COALESCE($8, is_active),
                updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(plan_id)
        .bind(request.name.as_deref().map(sanitize_text))
        .bind(sanitize_opt(request.description))
        .bind(request.price)
        .bind(request.duration_days)
        .bind(request.sessions_count)
        .bind(request.features.map(Json))
        .bind(request.is_active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Subscription plan"))
    }

    /// Plans with subscribers are deactivated instead of removed
    pub async fn delete_plan(&self, plan_id: Uuid) -> ApiResult<()> {
        let used: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM subscriptions WHERE plan_id = $1)")
                .bind(plan_id)
                .fetch_one(&self.db)
                .await?;

        let query = if used {
            "UPDATE subscription_plans SET is_active = FALSE, updated_at = NOW() WHERE id = $1"
        } else {
            "DELETE FROM subscription_plans WHERE id = $1"
        };
        let result = sqlx::query(query).bind(plan_id).execute(&self.db).await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("Subscription plan"));
        }
        Ok(())
    }

    /// Creates a pending subscription; an admin activates it once paid
    pub async fn subscribe(&self, user_id: Uuid, request: SubscribeRequest) -> ApiResult<SubscriptionResponse> {
        let today = Utc::now().date_naive();
        let mut tx = self.db.begin().await?;

        // Serialises concurrent subscribe calls for the same user
        sqlx::query("SELECT 1 FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let existing: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM subscriptions
                WHERE user_id = $1 AND status IN ('pending', 'active') AND end_date >= $2
             )",
        )
        .bind(user_id)
        .bind(today)
        .fetch_one(&mut *tx)
        .await?;
        if existing {
            return Err(DomainError::ActiveSubscriptionExists.into());
        }

        let plan = sqlx::query_as::<_, SubscriptionPlan>(
            "SELECT * FROM subscription_plans WHERE id = $1 AND is_active",
        )
        .bind(request.plan_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Subscription plan"))?;

        if let Some(trainer_id) = request.trainer_id {
            let trainer: Option<(UserRole, bool)> =
                sqlx::query_as("SELECT role, is_active FROM users WHERE id = $1")
                    .bind(trainer_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if !matches!(trainer, Some((UserRole::Trainer, true))) {
                return Err(ApiError::field("trainer_id", "Selected trainer is not available"));
            }

            let current: Option<Uuid> = sqlx::query_scalar("SELECT trainer_id FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
            if current != Some(trainer_id) {
                ensure_trainer_capacity(&mut tx, trainer_id).await?;
                sqlx::query("UPDATE users SET trainer_id = $1, updated_at = NOW() WHERE id = $2")
                    .bind(trainer_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let (start_date, end_date) = subscription_period(&plan, today);
        let subscription = sqlx::query_as::<_, Subscription>(
            "INSERT INTO subscriptions
                (id, user_id, trainer_id, plan_id, plan_name, price, sessions_count,
                 start_date, end_date, status, payment_method)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending', $10)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(request.trainer_id)
        .bind(plan.id)
        .bind(&plan.name)
        .bind(plan.price)
        .bind(plan.sessions_count)
        .bind(start_date)
        .bind(end_date)
        .bind(request.payment_method)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(subscription_id = %subscription.id, plan = %plan.name, "Subscription created");
        Ok(SubscriptionResponse::new(subscription, today))
    }

    pub async fn user_subscriptions(
        &self,
        user_id: Uuid,
        page: PageParams,
    ) -> ApiResult<Paginated<SubscriptionResponse>> {
        self.list_subscriptions(
            &SubscriptionFilter {
                status: None,
                user_id: Some(user_id),
            },
            page,
        )
        .await
    }

    /// The subscription sessions are currently drawn from, if any
    pub async fn current_subscription(&self, user_id: Uuid) -> ApiResult<Option<SubscriptionResponse>> {
        let today = Utc::now().date_naive();
        let subscription = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions
             WHERE user_id = $1 AND status IN ('pending', 'active') AND end_date >= $2
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(user_id)
        .bind(today)
        .fetch_optional(&self.db)
        .await?;

        Ok(subscription.map(|subscription| SubscriptionResponse::new(subscription, today)))
    }

    pub async fn list_subscriptions(
        &self,
        filter: &SubscriptionFilter,
        page: PageParams,
    ) -> ApiResult<Paginated<SubscriptionResponse>> {
        let today = Utc::now().date_naive();

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM subscriptions
             WHERE ($1::subscription_status IS NULL OR status = $1)
               AND ($2::uuid IS NULL OR user_id = $2)",
        )
        .bind(filter.status)
        .bind(filter.user_id)
        .fetch_one(&self.db)
        .await?;

        let subscriptions = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions
             WHERE ($1::subscription_status IS NULL OR status = $1)
               AND ($2::uuid IS NULL OR user_id = $2)
             ORDER BY created_at DESC
             LIMIT $3 OFFSET $4",
        )
        .bind(filter.status)
        .bind(filter.user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Paginated::new(subscriptions, page, total)
            .map(|subscription| SubscriptionResponse::new(subscription, today)))
    }

    pub async fn cancel(&self, session: &UserSession, subscription_id: Uuid) -> ApiResult<SubscriptionResponse> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let mut subscription = lock_subscription(&mut tx, subscription_id).await?;
        if !session.is_admin() && subscription.user_id != session.user_id {
            return Err(ApiError::not_found("Subscription"));
        }

        subscription.cancel(now)?;
        let subscription = save_subscription(&mut tx, &subscription).await?;
        tx.commit().await?;

        tracing::info!(subscription_id = %subscription.id, "Subscription cancelled");
        Ok(SubscriptionResponse::new(subscription, now.date_naive()))
    }

    /// Admin activation; the paid period starts today
    pub async fn activate(&self, subscription_id: Uuid) -> ApiResult<SubscriptionResponse> {
        let now = Utc::now();
        let today = now.date_naive();
        let mut tx = self.db.begin().await?;

        let user_id: Uuid = sqlx::query_scalar("SELECT user_id FROM subscriptions WHERE id = $1")
            .bind(subscription_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found("Subscription"))?;

        // Same lock order as subscribe: user row first
        sqlx::query("SELECT 1 FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let mut subscription = lock_subscription(&mut tx, subscription_id).await?;

        let other_active: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM subscriptions
                WHERE user_id = $1 AND id <> $2 AND status = 'active' AND end_date >= $3
             )",
        )
        .bind(user_id)
        .bind(subscription_id)
        .bind(today)
        .fetch_one(&mut *tx)
        .await?;
        if other_active {
            return Err(DomainError::ActiveSubscriptionExists.into());
        }

        subscription.activate(today, now)?;
        let subscription = save_subscription(&mut tx, &subscription).await?;
        tx.commit().await?;

        tracing::info!(subscription_id = %subscription.id, "Subscription activated");
        Ok(SubscriptionResponse::new(subscription, today))
    }

    /// Active subscriptions past their end date, and pending ones never activated
    /// within their period, become expired
    pub async fn expire_overdue(&self) -> ApiResult<u64> {
        let expired = sqlx::query(
            "UPDATE subscriptions SET status = 'expired', updated_at = NOW()
             WHERE status IN ('active', 'pending') AND end_date < $1",
        )
        .bind(Utc::now().date_naive())
        .execute(&self.db)
        .await?
        .rows_affected();

        if expired > 0 {
            tracing::info!(expired, "Expired overdue subscriptions");
        }
        Ok(expired)
    }
}

/// Use one session from the trainee's active subscription, if one has quota left.
/// The guard in the UPDATE keeps `sessions_used <= sessions_count` under concurrency.
pub async fn consume_session(
    conn: &mut PgConnection,
    trainee_id: Uuid,
    today: NaiveDate,
) -> ApiResult<Option<Subscription>> {
    let subscription = sqlx::query_as::<_, Subscription>(
        "UPDATE subscriptions SET sessions_used = sessions_used + 1, updated_at = NOW()
         WHERE id = (
             SELECT id FROM subscriptions
             WHERE user_id = $1 AND status = 'active' AND end_date >= $2
               AND sessions_used < sessions_count
             ORDER BY end_date
             LIMIT 1
             FOR UPDATE
         )
         AND sessions_used < sessions_count
         RETURNING *",
    )
    .bind(trainee_id)
    .bind(today)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(subscription)
}

async fn lock_subscription(conn: &mut PgConnection, subscription_id: Uuid) -> ApiResult<Subscription> {
    sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE id = $1 FOR UPDATE")
        .bind(subscription_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::not_found("Subscription"))
}

async fn save_subscription(conn: &mut PgConnection, subscription: &Subscription) -> ApiResult<Subscription> {
    let subscription = sqlx::query_as::<_, Subscription>(
        "UPDATE subscriptions SET
            status = $2, start_date = $3, end_date = $4, cancelled_at = $5, updated_at = $6
         WHERE id = $1
         RETURNING *",
    )
    .bind(subscription.id)
    .bind(subscription.status)
    .bind(subscription.start_date)
    .bind(subscription.end_date)
    .bind(subscription.cancelled_at)
    .bind(subscription.updated_at)
    .fetch_one(&mut *conn)
    .await?;
    Ok(subscription)
}
