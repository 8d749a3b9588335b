use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::auth::UserRole;
use crate::models::health::{BodyProfile, HealthMetrics};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "gender", rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "activity_level", rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    #[default]
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    pub fn multiplier(&self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
            ActivityLevel::VeryActive => 1.9,
        }
    }
}

/// Account row. Not serializable: responses go through `UserResponse`
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub gender: Option<Gender>,
    pub birth_date: Option<NaiveDate>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub target_weight_kg: Option<f64>,
    pub activity_level: ActivityLevel,
    pub goal: Option<String>,
    pub avatar: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub bmi: Option<f64>,
    pub bmr: Option<f64>,
    pub tdee: Option<f64>,
    pub trainer_id: Option<Uuid>,
    pub apple_id: Option<String>,
    pub fcm_token: Option<String>,
    pub is_verified: bool,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn body_profile(&self) -> BodyProfile {
        BodyProfile {
            weight_kg: self.weight_kg,
            height_cm: self.height_cm,
            birth_date: self.birth_date,
            gender: self.gender,
            activity_level: self.activity_level,
        }
    }

    pub fn health_metrics(&self, today: NaiveDate) -> HealthMetrics {
        self.body_profile().metrics(today)
    }

    pub fn is_trainee(&self) -> bool {
        self.role == UserRole::Trainee
    }

    pub fn is_trainer(&self) -> bool {
        self.role == UserRole::Trainer
    }
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub gender: Option<Gender>,
    pub apple_id: Option<String>,
    pub is_verified: bool,
}

/// Whitelisted profile fields; `None` leaves the column unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<Gender>,
    pub birth_date: Option<NaiveDate>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub target_weight_kg: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub goal: Option<String>,
    pub avatar: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub gender: Option<Gender>,
    pub birth_date: Option<NaiveDate>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub target_weight_kg: Option<f64>,
    pub activity_level: ActivityLevel,
    pub goal: Option<String>,
    pub avatar: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub bmi: Option<f64>,
    pub bmr: Option<f64>,
    pub tdee: Option<f64>,
    pub trainer_id: Option<Uuid>,
    pub is_verified: bool,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            phone: user.phone.clone(),
            gender: user.gender,
            birth_date: user.birth_date,
            height_cm: user.height_cm,
            weight_kg: user.weight_kg,
            target_weight_kg: user.target_weight_kg,
            activity_level: user.activity_level,
            goal: user.goal.clone(),
            avatar: user.avatar.clone(),
            address: user.address.clone(),
            city: user.city.clone(),
            bmi: user.bmi,
            bmr: user.bmr,
            tdee: user.tdee,
            trainer_id: user.trainer_id,
            is_verified: user.is_verified,
            is_active: user.is_active,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse::from(&user)
    }
}

/// Compact view used in listings and embedded records
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: UserRole,
}

#[derive(Debug, Deserialize, Default)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangeRoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignTrainerRequest {
    pub trainer_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::faker::internet::en::SafeEmail;
    use fake::faker::name::en::Name;
    use fake::Fake;

    pub fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: Name().fake(),
            email: SafeEmail().fake(),
            password_hash: "$2b$04$abcdefghijklmnopqrstuv".to_string(),
            role: UserRole::Trainee,
            phone: None,
            gender: Some(Gender::Female),
            birth_date: NaiveDate::from_ymd_opt(1995, 3, 10),
            height_cm: Some(160.0),
            weight_kg: Some(58.0),
            target_weight_kg: Some(55.0),
            activity_level: ActivityLevel::Light,
            goal: Some("lose weight".to_string()),
            avatar: None,
            address: None,
            city: Some("Riyadh".to_string()),
            bmi: None,
            bmr: None,
            tdee: None,
            trainer_id: None,
            apple_id: None,
            fcm_token: Some("fcm".to_string()),
            is_verified: true,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_response_never_contains_password_hash() {
        let user = sample_user();
        let json = serde_json::to_value(UserResponse::from(&user)).unwrap();

        assert!(json.get("password_hash").is_none());
        assert!(json.get("fcm_token").is_none());
        assert!(!json.to_string().contains(&user.password_hash));
        assert_eq!(json["role"], "trainee");
        assert_eq!(json["activity_level"], "light");
    }

    #[test]
    fn test_health_metrics_from_user() {
        let user = sample_user();
        let metrics = user.health_metrics(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        assert_eq!(metrics.bmi, Some(22.66));
        assert!(metrics.bmr.is_some());
        assert!(metrics.tdee.unwrap() > metrics.bmr.unwrap());
    }
}
