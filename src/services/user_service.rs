use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{UserRole, UserSession};
use crate::error::{ApiError, ApiResult};
use crate::models::{PageParams, Paginated, TrainerProfile, User, UserFilter, UserResponse};
use crate::services::security_log_service::{SecurityEvent, SecurityLogService};

/// Admin management of accounts and trainer assignment
#[derive(Debug, Clone)]
pub struct UserService {
    db: PgPool,
    security_log: SecurityLogService,
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self {
            security_log: SecurityLogService::new(db.clone()),
            db,
        }
    }

    pub async fn list_users(
        &self,
        filter: &UserFilter,
        page: PageParams,
    ) -> ApiResult<Paginated<UserResponse>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(|term| format!("%{}%", term));

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users
             WHERE ($1::user_role IS NULL OR role = $1)
               AND ($2::text IS NULL OR name ILIKE $2 OR email ILIKE $2)
               AND ($3::boolean IS NULL OR is_active = $3)",
        )
        .bind(filter.role)
        .bind(&search)
        .bind(filter.is_active)
        .fetch_one(&self.db)
        .await?;

        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users
             WHERE ($1::user_role IS NULL OR role = $1)
               AND ($2::text IS NULL OR name ILIKE $2 OR email ILIKE $2)
               AND ($3::boolean IS NULL OR is_active = $3)
             ORDER BY created_at DESC
             LIMIT $4 OFFSET $5",
        )
        .bind(filter.role)
        .bind(&search)
        .bind(filter.is_active)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Paginated::new(users, page, total).map(UserResponse::from))
    }

    pub async fn get_user(&self, user_id: Uuid) -> ApiResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::not_found("User"))
    }

    /// Promoting to trainer creates an empty profile; demoting releases assigned trainees
    pub async fn change_role(
        &self,
        actor: &UserSession,
        user_id: Uuid,
        role: UserRole,
    ) -> ApiResult<UserResponse> {
        if actor.user_id == user_id {
            return Err(ApiError::BadRequest("You cannot change your own role".to_string()));
        }

        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET role = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(role)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

        if role == UserRole::Trainer {
            sqlx::query("INSERT INTO trainer_profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query("UPDATE users SET trainer_id = NULL WHERE trainer_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }
        if role != UserRole::Trainee {
            sqlx::query("UPDATE users SET trainer_id = NULL WHERE id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.security_log
            .record(
                SecurityEvent::RoleChanged,
                Some(user_id),
                None,
                json!({ "role": role.as_str(), "changed_by": actor.user_id }),
            )
            .await;

        let user = self.get_user(user.id).await?;
        Ok(UserResponse::from(user))
    }

    /// Deactivation also revokes the user's refresh tokens
    pub async fn set_active(
        &self,
        actor: &UserSession,
        user_id: Uuid,
        is_active: bool,
    ) -> ApiResult<UserResponse> {
        if actor.user_id == user_id && !is_active {
            return Err(ApiError::BadRequest("You cannot deactivate your own account".to_string()));
        }

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET is_active = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(is_active)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

        if !is_active {
            sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1")
                .bind(user_id)
                .execute(&self.db)
                .await?;
        }

        self.security_log
            .record(
                SecurityEvent::AccountStatusChanged,
                Some(user_id),
                None,
                json!({ "is_active": is_active, "changed_by": actor.user_id }),
            )
            .await;

        Ok(UserResponse::from(user))
    }

    /// `None` unassigns. The trainer profile row is locked while capacity is checked.
    pub async fn assign_trainer(
        &self,
        trainee_id: Uuid,
        trainer_id: Option<Uuid>,
    ) -> ApiResult<UserResponse> {
        let mut tx = self.db.begin().await?;

        let trainee = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(trainee_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found("User"))?;

        if !trainee.is_trainee() {
            return Err(ApiError::field("user_id", "Only trainees can be assigned a trainer"));
        }

        if let Some(trainer_id) = trainer_id {
            if trainee.trainer_id == Some(trainer_id) {
                tx.commit().await?;
                return Ok(UserResponse::from(trainee));
            }

            let trainer_role: Option<(UserRole, bool)> =
                sqlx::query_as("SELECT role, is_active FROM users WHERE id = $1")
                    .bind(trainer_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            match trainer_role {
                Some((UserRole::Trainer, true)) => {}
                Some(_) => return Err(ApiError::field("trainer_id", "Selected user is not an active trainer")),
                None => return Err(ApiError::not_found("Trainer")),
            }

            ensure_trainer_capacity(&mut tx, trainer_id).await?;
        }

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET trainer_id = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(trainer_id)
        .bind(trainee_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(trainee_id = %trainee_id, trainer_id = ?trainer_id, "Trainer assignment updated");
        Ok(UserResponse::from(user))
    }
}

/// Fails when the trainer is full. The upsert holds the profile row lock until commit.
pub async fn ensure_trainer_capacity(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    trainer_id: Uuid,
) -> ApiResult<()> {
    let profile = sqlx::query_as::<_, TrainerProfile>(
        "INSERT INTO trainer_profiles (user_id) VALUES ($1)
         ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
         RETURNING *",
    )
    .bind(trainer_id)
    .fetch_one(&mut **tx)
    .await?;

    let current: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE trainer_id = $1 AND is_active")
        .bind(trainer_id)
        .fetch_one(&mut **tx)
        .await?;

    if !profile.has_capacity(current) {
        return Err(crate::models::DomainError::TrainerAtCapacity.into());
    }
    Ok(())
}
