use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::{DomainError, PaymentMethod};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Expired,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SubscriptionPlan {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub duration_days: i32,
    pub sessions_count: i32,
    pub features: Json<Vec<String>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub trainer_id: Option<Uuid>,
    pub plan_id: Uuid,
    pub plan_name: String,
    pub price: Decimal,
    pub sessions_count: i32,
    pub sessions_used: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: SubscriptionStatus,
    pub payment_method: Option<PaymentMethod>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn remaining_sessions(&self) -> i32 {
        (self.sessions_count - self.sessions_used).max(0)
    }

    pub fn is_active(&self, today: NaiveDate) -> bool {
        self.status == SubscriptionStatus::Active
            && self.end_date >= today
            && self.sessions_used < self.sessions_count
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.end_date < today || self.status == SubscriptionStatus::Expired
    }

    /// Consume one session; refuses once the quota is used up
    pub fn use_session(&mut self, today: NaiveDate) -> Result<i32, DomainError> {
        if self.status != SubscriptionStatus::Active || self.end_date < today {
            return Err(DomainError::SubscriptionNotActive);
        }
        if self.remaining_sessions() == 0 {
            return Err(DomainError::NoSessionsRemaining);
        }
        self.sessions_used += 1;
        Ok(self.remaining_sessions())
    }

    /// Start the paid period today, keeping the plan length.
    /// A pending subscription whose original period has lapsed can no longer be activated.
    pub fn activate(&mut self, today: NaiveDate, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Pending || self.end_date < today {
            return Err(self.invalid(SubscriptionStatus::Active));
        }
        let length = self.end_date - self.start_date;
        self.start_date = today;
        self.end_date = today + length;
        self.status = SubscriptionStatus::Active;
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !matches!(self.status, SubscriptionStatus::Pending | SubscriptionStatus::Active) {
            return Err(self.invalid(SubscriptionStatus::Cancelled));
        }
        self.status = SubscriptionStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn expire(&mut self, today: NaiveDate, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Active || self.end_date >= today {
            return Err(self.invalid(SubscriptionStatus::Expired));
        }
        self.status = SubscriptionStatus::Expired;
        self.updated_at = now;
        Ok(())
    }

    fn invalid(&self, to: SubscriptionStatus) -> DomainError {
        DomainError::InvalidSubscriptionTransition {
            from: self.status.as_str().to_string(),
            to: to.as_str().to_string(),
        }
    }
}

/// Initial period for a new subscription to `plan`
pub fn subscription_period(plan: &SubscriptionPlan, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today, today + Duration::days(plan.duration_days as i64))
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub remaining_sessions: i32,
    pub is_active: bool,
}

impl SubscriptionResponse {
    pub fn new(subscription: Subscription, today: NaiveDate) -> Self {
        Self {
            remaining_sessions: subscription.remaining_sessions(),
            is_active: subscription.is_active(today),
            subscription,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubscribeRequest {
    pub plan_id: Uuid,
    pub trainer_id: Option<Uuid>,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePlan {
    #[validate(length(min = 2, max = 255))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub price: Decimal,
    #[validate(range(min = 1, max = 3650))]
    pub duration_days: i32,
    #[validate(range(min = 0, max = 1000))]
    pub sessions_count: i32,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePlan {
    #[validate(length(min = 2, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub price: Option<Decimal>,
    #[validate(range(min = 1, max = 3650))]
    pub duration_days: Option<i32>,
    #[validate(range(min = 0, max = 1000))]
    pub sessions_count: Option<i32>,
    pub features: Option<Vec<String>>,
    pub is_active: Option<bool>,
}
