use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::error::ApiResult;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DashboardStats {
    pub total_trainees: i64,
    pub total_trainers: i64,
    pub active_subscriptions: i64,
    pub pending_subscriptions: i64,
    pub pending_orders: i64,
    pub total_revenue: Decimal,
    pub sessions_today: i64,
}

#[derive(Debug, Clone)]
pub struct DashboardService {
    db: PgPool,
}

impl DashboardService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Revenue counts paid orders only; "today" is the current UTC day
    pub async fn stats(&self) -> ApiResult<DashboardStats> {
        let day_start = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|start| start.and_utc())
            .unwrap_or_else(Utc::now);
        let day_end = day_start + Duration::days(1);

        let stats = sqlx::query_as::<_, DashboardStats>(
            "SELECT
                (SELECT COUNT(*) FROM users WHERE role = 'trainee' AND is_active) AS total_trainees,
                (SELECT COUNT(*) FROM users WHERE role = 'trainer' AND is_active) AS total_trainers,
                (SELECT COUNT(*) FROM subscriptions WHERE status = 'active') AS active_subscriptions,
                (SELECT COUNT(*) FROM subscriptions WHERE status = 'pending') AS pending_subscriptions,
                (SELECT COUNT(*) FROM orders WHERE status = 'pending') AS pending_orders,
                (SELECT COALESCE(SUM(total), 0) FROM orders WHERE payment_status = 'paid') AS total_revenue,
                (SELECT COUNT(*) FROM training_sessions
                  WHERE scheduled_at >= $1 AND scheduled_at < $2
                    AND status IN ('scheduled', 'in_progress', 'completed')) AS sessions_today",
        )
        .bind(day_start)
        .bind(day_end)
        .fetch_one(&self.db)
        .await?;

        Ok(stats)
    }
}
