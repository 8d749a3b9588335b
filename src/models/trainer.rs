use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TrainerProfile {
    pub user_id: Uuid,
    pub specialization: Option<String>,
    pub bio: Option<String>,
    pub experience_years: i32,
    pub max_trainees: i32,
    pub rating: f64,
    pub rating_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrainerProfile {
    pub fn has_capacity(&self, current_trainees: i64) -> bool {
        current_trainees < self.max_trainees as i64
    }
}

/// Running average after one more rating
pub fn updated_rating(current: f64, count: i32, new_rating: i32) -> f64 {
    let total = current * count as f64 + new_rating as f64;
    let average = total / (count + 1) as f64;
    (average * 100.0).round() / 100.0
}

/// Public trainer card
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TrainerListing {
    pub id: Uuid,
    pub name: String,
    pub avatar: Option<String>,
    pub specialization: Option<String>,
    pub bio: Option<String>,
    pub experience_years: Option<i32>,
    pub rating: Option<f64>,
    pub rating_count: Option<i32>,
    pub max_trainees: Option<i32>,
    pub trainee_count: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertTrainerProfile {
    #[validate(length(max = 255))]
    pub specialization: Option<String>,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
    #[validate(range(min = 0, max = 60))]
    pub experience_years: Option<i32>,
    #[validate(range(min = 0, max = 500))]
    pub max_trainees: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_average() {
        assert_eq!(updated_rating(0.0, 0, 5), 5.0);
        assert_eq!(updated_rating(5.0, 1, 4), 4.5);
        assert_eq!(updated_rating(4.5, 2, 3), 4.0);
        assert_eq!(updated_rating(4.0, 2, 5), 4.33);
    }

    #[test]
    fn test_capacity() {
        let now = Utc::now();
        let profile = TrainerProfile {
            user_id: Uuid::new_v4(),
            specialization: None,
            bio: None,
            experience_years: 3,
            max_trainees: 2,
            rating: 0.0,
            rating_count: 0,
            created_at: now,
            updated_at: now,
        };
        assert!(profile.has_capacity(1));
        assert!(!profile.has_capacity(2));
    }
}
