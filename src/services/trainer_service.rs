use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    sanitize_opt, updated_rating, PageParams, Paginated, TrainerListing, TrainerProfile,
    UpsertTrainerProfile, User, UserResponse,
};

const LISTING_SELECT: &str = "
    SELECT u.id, u.name, u.avatar,
           p.specialization, p.bio, p.experience_years, p.rating, p.rating_count, p.max_trainees,
           (SELECT COUNT(*) FROM users t WHERE t.trainer_id = u.id AND t.is_active) AS trainee_count
    FROM users u
    LEFT JOIN trainer_profiles p ON p.user_id = u.id
    WHERE u.role = 'trainer' AND u.is_active";

#[derive(Debug, Clone)]
pub struct TrainerService {
    db: PgPool,
}

impl TrainerService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Public listing, best rated first
    pub async fn list_trainers(&self, page: PageParams) -> ApiResult<Paginated<TrainerListing>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'trainer' AND is_active")
                .fetch_one(&self.db)
                .await?;

        let trainers = sqlx::query_as::<_, TrainerListing>(&format!(
            "{} ORDER BY p.rating DESC NULLS LAST, u.name LIMIT $1 OFFSET $2",
            LISTING_SELECT
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Paginated::new(trainers, page, total))
    }

    pub async fn get_trainer(&self, trainer_id: Uuid) -> ApiResult<TrainerListing> {
        sqlx::query_as::<_, TrainerListing>(&format!("{} AND u.id = $1", LISTING_SELECT))
            .bind(trainer_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::not_found("Trainer"))
    }

    pub async fn get_profile(&self, trainer_id: Uuid) -> ApiResult<TrainerProfile> {
        let profile = sqlx::query_as::<_, TrainerProfile>(
            "INSERT INTO trainer_profiles (user_id) VALUES ($1)
             ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
             RETURNING *",
        )
        .bind(trainer_id)
        .fetch_one(&self.db)
        .await?;
        Ok(profile)
    }

    pub async fn upsert_profile(
        &self,
        trainer_id: Uuid,
        request: UpsertTrainerProfile,
    ) -> ApiResult<TrainerProfile> {
        let profile = sqlx::query_as::<_, TrainerProfile>(
            "INSERT INTO trainer_profiles (user_id, specialization, bio, experience_years, max_trainees)
             VALUES ($1, $2, $3, COALESCE($4, 0), COALESCE($5, 20))
             ON CONFLICT (user_id) DO UPDATE SET
                specialization = COALESCE($2, trainer_profiles.specialization),
                bio = COALESCE($3, trainer_profiles.bio),
                experience_years = COALESCE($4, trainer_profiles.experience_years),
                max_trainees = COALESCE($5, trainer_profiles.max_trainees),
                updated_at = NOW()
             RETURNING *",
        )
        .bind(trainer_id)
        .bind(sanitize_opt(request.specialization))
        .bind(sanitize_opt(request.bio))
        .bind(request.experience_years)
        .bind(request.max_trainees)
        .fetch_one(&self.db)
        .await?;

        Ok(profile)
    }

    pub async fn list_trainees(
        &self,
        trainer_id: Uuid,
        page: PageParams,
    ) -> ApiResult<Paginated<UserResponse>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE trainer_id = $1")
            .bind(trainer_id)
            .fetch_one(&self.db)
            .await?;

        let trainees = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE trainer_id = $1 ORDER BY name LIMIT $2 OFFSET $3",
        )
        .bind(trainer_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Paginated::new(trainees, page, total).map(UserResponse::from))
    }
}

/// Fold one more rating into the trainer's running average
pub async fn apply_trainer_rating(
    conn: &mut PgConnection,
    trainer_id: Uuid,
    rating: i32,
) -> ApiResult<f64> {
    let current: Option<(f64, i32)> = sqlx::query_as(
        "SELECT rating, rating_count FROM trainer_profiles WHERE user_id = $1 FOR UPDATE",
    )
    .bind(trainer_id)
    .fetch_optional(&mut *conn)
    .await?;

    let (average, count) = current.unwrap_or((0.0, 0));
    let average = updated_rating(average, count, rating);

    sqlx::query(
        "INSERT INTO trainer_profiles (user_id, rating, rating_count) VALUES ($1, $2, 1)
         ON CONFLICT (user_id) DO UPDATE SET
            rating = $2, rating_count = trainer_profiles.rating_count + 1, updated_at = NOW()",
    )
    .bind(trainer_id)
    .bind(average)
    .execute(&mut *conn)
    .await?;

    Ok(average)
}
