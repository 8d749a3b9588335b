use chrono::Utc;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::auth::{UserRole, UserSession};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    sanitize_opt, sanitize_text, CreateSessionRequest, DomainError, PageParams, Paginated,
    RateSessionRequest, RescheduleRequest, SessionFilter, SessionStatus, TrainingSession, User,
};
use crate::services::subscription_service::consume_session;
use crate::services::trainer_service::apply_trainer_rating;

#[derive(Debug, Serialize)]
pub struct CompletedSession {
    #[serde(flatten)]
    pub session: TrainingSession,
    /// Sessions left on the trainee's subscription; `None` when nothing was consumed
    pub remaining_sessions: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct TrainingSessionService {
    db: PgPool,
}

impl TrainingSessionService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Trainers book their own trainees; admins book on behalf of the assigned trainer
    pub async fn create_session(
        &self,
        actor: &UserSession,
        request: CreateSessionRequest,
    ) -> ApiResult<TrainingSession> {
        let now = Utc::now();
        if request.scheduled_at <= now {
            return Err(ApiError::field("scheduled_at", "Session must be scheduled in the future"));
        }

        let trainee = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(request.trainee_id)
            .fetch_optional(&self.db)
            .await?
            .filter(|user| user.is_trainee() && user.is_active)
            .ok_or_else(|| ApiError::field("trainee_id", "Selected trainee does not exist"))?;

        let trainer_id = match actor.role {
            UserRole::Trainer if trainee.trainer_id == Some(actor.user_id) => actor.user_id,
            UserRole::Trainer => {
                return Err(ApiError::Forbidden(
                    "You can only schedule sessions with your own trainees".to_string(),
                ))
            }
            UserRole::Admin => trainee
                .trainer_id
                .ok_or_else(|| ApiError::field("trainee_id", "Trainee has no assigned trainer"))?,
            UserRole::Trainee => return Err(ApiError::forbidden()),
        };

        let session = sqlx::query_as::<_, TrainingSession>(
            "INSERT INTO training_sessions
                (id, trainer_id, trainee_id, title, description, scheduled_at, duration_minutes,
                 session_type, training_mode, meeting_id, meeting_url, meeting_password)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(trainer_id)
        .bind(trainee.id)
        .bind(sanitize_text(&request.title))
        .bind(sanitize_opt(request.description))
        .bind(request.scheduled_at)
        .bind(request.duration_minutes)
        .bind(request.session_type)
        .bind(request.training_mode)
        .bind(sanitize_opt(request.meeting_id))
        .bind(request.meeting_url.map(|url| url.trim().to_string()))
        .bind(request.meeting_password)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(session_id = %session.id, trainer_id = %trainer_id, "Training session scheduled");
        Ok(session)
    }

    /// Trainers see sessions they run, trainees their own, admins everything
    pub async fn list_sessions(
        &self,
        actor: &UserSession,
        filter: &SessionFilter,
        page: PageParams,
    ) -> ApiResult<Paginated<TrainingSession>> {
        let (trainer_id, trainee_id) = match actor.role {
            UserRole::Admin => (None, None),
            UserRole::Trainer => (Some(actor.user_id), None),
            UserRole::Trainee => (None, Some(actor.user_id)),
        };
        let upcoming = filter.upcoming.unwrap_or(false);
        let filters = "
            WHERE ($1::uuid IS NULL OR trainer_id = $1)
              AND ($2::uuid IS NULL OR trainee_id = $2)
              AND ($3::session_status IS NULL OR status = $3)
              AND (NOT $4 OR (status = 'scheduled' AND scheduled_at >= NOW()))";
        let order = if upcoming { "ASC" } else { "DESC" };

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM training_sessions {}", filters))
            .bind(trainer_id)
            .bind(trainee_id)
            .bind(filter.status)
            .bind(upcoming)
            .fetch_one(&self.db)
            .await?;

        let sessions = sqlx::query_as::<_, TrainingSession>(&format!(
            "SELECT * FROM training_sessions {} ORDER BY scheduled_at {} LIMIT $5 OFFSET $6",
            filters, order
        ))
        .bind(trainer_id)
        .bind(trainee_id)
        .bind(filter.status)
        .bind(upcoming)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Paginated::new(sessions, page, total))
    }

    pub async fn get_session(&self, actor: &UserSession, session_id: Uuid) -> ApiResult<TrainingSession> {
        sqlx::query_as::<_, TrainingSession>("SELECT * FROM training_sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(&self.db)
            .await?
            .filter(|session| actor.is_admin() || session.is_participant(actor.user_id))
            .ok_or_else(|| ApiError::not_found("Session"))
    }

    pub async fn start_session(&self, actor: &UserSession, session_id: Uuid) -> ApiResult<TrainingSession> {
        let mut tx = self.db.begin().await?;
        let mut session = lock_session(&mut tx, session_id).await?;
        ensure_trainer(actor, &session)?;

        session.start(Utc::now())?;
        let session = save_session(&mut tx, &session).await?;
        tx.commit().await?;

        tracing::info!(session_id = %session.id, "Training session started");
        Ok(session)
    }

    /// Completing draws one session from the trainee's active subscription when there is one
    pub async fn complete_session(
        &self,
        actor: &UserSession,
        session_id: Uuid,
        notes: Option<String>,
    ) -> ApiResult<CompletedSession> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut session = lock_session(&mut tx, session_id).await?;
        ensure_trainer(actor, &session)?;

        session.complete(sanitize_opt(notes), now)?;
        let session = save_session(&mut tx, &session).await?;
        let subscription = consume_session(&mut tx, session.trainee_id, now.date_naive()).await?;
        tx.commit().await?;

        let remaining_sessions = subscription.map(|subscription| subscription.remaining_sessions());
        tracing::info!(session_id = %session.id, ?remaining_sessions, "Training session completed");
        Ok(CompletedSession {
            session,
            remaining_sessions,
        })
    }

    /// Either participant may cancel
    pub async fn cancel_session(
        &self,
        actor: &UserSession,
        session_id: Uuid,
        reason: Option<String>,
    ) -> ApiResult<TrainingSession> {
        let mut tx = self.db.begin().await?;
        let mut session = lock_session(&mut tx, session_id).await?;
        if !actor.is_admin() && !session.is_participant(actor.user_id) {
            return Err(ApiError::not_found("Session"));
        }

        session.cancel(sanitize_opt(reason), Utc::now())?;
        let session = save_session(&mut tx, &session).await?;
        tx.commit().await?;

        tracing::info!(session_id = %session.id, cancelled_by = %actor.user_id, "Training session cancelled");
        Ok(session)
    }

    pub async fn mark_no_show(&self, actor: &UserSession, session_id: Uuid) -> ApiResult<TrainingSession> {
        let mut tx = self.db.begin().await?;
        let mut session = lock_session(&mut tx, session_id).await?;
        ensure_trainer(actor, &session)?;

        session.mark_no_show(Utc::now())?;
        let session = save_session(&mut tx, &session).await?;
        tx.commit().await?;
        Ok(session)
    }

    pub async fn reschedule_session(
        &self,
        actor: &UserSession,
        session_id: Uuid,
        request: RescheduleRequest,
    ) -> ApiResult<TrainingSession> {
        if request.scheduled_at <= Utc::now() {
            return Err(ApiError::field("scheduled_at", "Session must be scheduled in the future"));
        }

        let mut tx = self.db.begin().await?;
        let mut session = lock_session(&mut tx, session_id).await?;
        ensure_trainer(actor, &session)?;

        if session.status != SessionStatus::Scheduled {
            return Err(DomainError::InvalidSessionTransition {
                from: session.status.as_str().to_string(),
                to: SessionStatus::Scheduled.as_str().to_string(),
            }
            .into());
        }

        session.scheduled_at = request.scheduled_at;
        if let Some(duration) = request.duration_minutes {
            session.duration_minutes = duration;
        }
        session.updated_at = Utc::now();

        let session = save_session(&mut tx, &session).await?;
        tx.commit().await?;
        Ok(session)
    }

    pub async fn update_notes(
        &self,
        actor: &UserSession,
        session_id: Uuid,
        notes: Option<String>,
    ) -> ApiResult<TrainingSession> {
        let mut tx = self.db.begin().await?;
        let mut session = lock_session(&mut tx, session_id).await?;
        ensure_trainer(actor, &session)?;

        session.notes = sanitize_opt(notes);
        session.updated_at = Utc::now();
        let session = save_session(&mut tx, &session).await?;
        tx.commit().await?;
        Ok(session)
    }

    /// Only the trainee rates, once, after completion. The trainer's average moves in the same transaction.
    pub async fn rate_session(
        &self,
        actor: &UserSession,
        session_id: Uuid,
        request: RateSessionRequest,
    ) -> ApiResult<TrainingSession> {
        let mut tx = self.db.begin().await?;
        let mut session = lock_session(&mut tx, session_id).await?;
        if session.trainee_id != actor.user_id {
            return Err(ApiError::Forbidden("Only the trainee can rate this session".to_string()));
        }

        session.rate(request.rating, sanitize_opt(request.feedback), Utc::now())?;
        let session = save_session(&mut tx, &session).await?;
        let average = apply_trainer_rating(&mut tx, session.trainer_id, request.rating).await?;
        tx.commit().await?;

        tracing::info!(session_id = %session.id, rating = request.rating, trainer_rating = average, "Training session rated");
        Ok(session)
    }
}

fn ensure_trainer(actor: &UserSession, session: &TrainingSession) -> ApiResult<()> {
    if actor.is_admin() || session.trainer_id == actor.user_id {
        return Ok(());
    }
    if session.trainee_id == actor.user_id {
        return Err(ApiError::Forbidden("Only the trainer can manage this session".to_string()));
    }
    Err(ApiError::not_found("Session"))
}

async fn lock_session(conn: &mut PgConnection, session_id: Uuid) -> ApiResult<TrainingSession> {
    sqlx::query_as::<_, TrainingSession>("SELECT * FROM training_sessions WHERE id = $1 FOR UPDATE")
        .bind(session_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::not_found("Session"))
}

async fn save_session(conn: &mut PgConnection, session: &TrainingSession) -> ApiResult<TrainingSession> {
    let session = sqlx::query_as::<_, TrainingSession>(
        "UPDATE training_sessions SET
            status = $2, scheduled_at = $3, duration_minutes = $4, started_at = $5, ended_at = $6,
            notes = $7, rating = $8, feedback = $9, updated_at = $10
         WHERE id = $1
         RETURNING *",
    )
    .bind(session.id)
    .bind(session.status)
    .bind(session.scheduled_at)
    .bind(session.duration_minutes)
    .bind(session.started_at)
    .bind(session.ended_at)
    .bind(&session.notes)
    .bind(session.rating)
    .bind(&session.feedback)
    .bind(session.updated_at)
    .fetch_one(&mut *conn)
    .await?;
    Ok(session)
}
