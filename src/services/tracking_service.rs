use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::health::bmi;
use crate::models::{
    meal_totals, sanitize_opt, sanitize_text, CreateMeal, CreateProgress, CreateWorkout, Meal,
    PageParams, Paginated, ProgressEntry, Workout,
};

/// Personal workout, meal and body-progress logs
#[derive(Debug, Clone)]
pub struct TrackingService {
    db: PgPool,
}

impl TrackingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_workout(&self, user_id: Uuid, request: CreateWorkout) -> ApiResult<Workout> {
        let mut exercises = request.exercises;
        for exercise in &mut exercises {
            exercise.name = sanitize_text(&exercise.name);
        }

        let workout = sqlx::query_as::<_, Workout>(
            "INSERT INTO workouts
                (id, user_id, name, category, duration_minutes, calories_burned, exercises, notes, performed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(sanitize_text(&request.name))
        .bind(sanitize_opt(request.category))
        .bind(request.duration_minutes)
        .bind(request.calories_burned)
        .bind(Json(exercises))
        .bind(sanitize_opt(request.notes))
        .bind(request.performed_at.unwrap_or_else(Utc::now))
        .fetch_one(&self.db)
        .await?;
        Ok(workout)
    }

    pub async fn list_workouts(&self, user_id: Uuid, page: PageParams) -> ApiResult<Paginated<Workout>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workouts WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        let workouts = sqlx::query_as::<_, Workout>(
            "SELECT * FROM workouts WHERE user_id = $1 ORDER BY performed_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Paginated::new(workouts, page, total))
    }

    pub async fn delete_workout(&self, user_id: Uuid, workout_id: Uuid) -> ApiResult<()> {
        self.delete_owned("workouts", "Workout", user_id, workout_id).await
    }

    /// Totals are derived from the food entries, never taken from the client
    pub async fn create_meal(&self, user_id: Uuid, request: CreateMeal) -> ApiResult<Meal> {
        let mut foods = request.foods;
        for food in &mut foods {
            food.name = sanitize_text(&food.name);
        }
        let totals = meal_totals(&foods);

        let meal = sqlx::query_as::<_, Meal>(
            "INSERT INTO meals
                (id, user_id, meal_type, foods, total_calories, total_protein, total_carbs, total_fat, notes, eaten_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(request.meal_type)
        .bind(Json(foods))
        .bind(totals.calories)
        .bind(totals.protein)
        .bind(totals.carbs)
        .bind(totals.fat)
        .bind(sanitize_opt(request.notes))
        .bind(request.eaten_at.unwrap_or_else(Utc::now))
        .fetch_one(&self.db)
        .await?;
        Ok(meal)
    }

    pub async fn list_meals(&self, user_id: Uuid, page: PageParams) -> ApiResult<Paginated<Meal>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM meals WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        let meals = sqlx::query_as::<_, Meal>(
            "SELECT * FROM meals WHERE user_id = $1 ORDER BY eaten_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Paginated::new(meals, page, total))
    }

    pub async fn delete_meal(&self, user_id: Uuid, meal_id: Uuid) -> ApiResult<()> {
        self.delete_owned("meals", "Meal", user_id, meal_id).await
    }

    /// BMI comes from the user's stored height. The profile weight follows the newest entry.
    pub async fn create_progress(&self, user_id: Uuid, request: CreateProgress) -> ApiResult<ProgressEntry> {
        let height_cm: Option<f64> = sqlx::query_scalar("SELECT height_cm FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::not_found("User"))?;
        let entry_bmi = height_cm.and_then(|height| bmi(request.weight_kg, height));
        let recorded_at = request.recorded_at.unwrap_or_else(Utc::now);

        let mut tx = self.db.begin().await?;

        let entry = sqlx::query_as::<_, ProgressEntry>(
            "INSERT INTO progress_entries
                (id, user_id, weight_kg, body_fat_percent, bmi, measurements, notes, recorded_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(request.weight_kg)
        .bind(request.body_fat_percent)
        .bind(entry_bmi)
        .bind(Json(request.measurements))
        .bind(sanitize_opt(request.notes))
        .bind(recorded_at)
        .fetch_one(&mut *tx)
        .await?;

        let is_latest: bool = sqlx::query_scalar(
            "SELECT NOT EXISTS (
                SELECT 1 FROM progress_entries WHERE user_id = $1 AND recorded_at > $2
             )",
        )
        .bind(user_id)
        .bind(recorded_at)
        .fetch_one(&mut *tx)
        .await?;

        if is_latest {
            sqlx::query("UPDATE users SET weight_kg = $1, bmi = $2, updated_at = NOW() WHERE id = $3")
                .bind(request.weight_kg)
                .bind(entry_bmi)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(entry)
    }

    pub async fn list_progress(&self, user_id: Uuid, page: PageParams) -> ApiResult<Paginated<ProgressEntry>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM progress_entries WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        let entries = sqlx::query_as::<_, ProgressEntry>(
            "SELECT * FROM progress_entries WHERE user_id = $1
             ORDER BY recorded_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Paginated::new(entries, page, total))
    }

    pub async fn delete_progress(&self, user_id: Uuid, entry_id: Uuid) -> ApiResult<()> {
        self.delete_owned("progress_entries", "Progress entry", user_id, entry_id).await
    }

    async fn delete_owned(&self, table: &str, what: &str, user_id: Uuid, id: Uuid) -> ApiResult<()> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1 AND user_id = $2", table))
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found(what));
        }
        Ok(())
    }
}
