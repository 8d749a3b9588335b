use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::DomainError;

pub const START_WINDOW_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "session_status", rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::NoShow => "no_show",
        }
    }

    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Scheduled, InProgress)
                | (InProgress, Completed)
                | (Scheduled | InProgress, Cancelled)
                | (Scheduled, NoShow)
        )
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "session_type", rename_all = "snake_case")]
pub enum SessionType {
    #[default]
    Private,
    Group,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "training_mode", rename_all = "snake_case")]
pub enum TrainingMode {
    #[default]
    Online,
    Gym,
    Home,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TrainingSession {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub trainee_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub session_type: SessionType,
    pub training_mode: TrainingMode,
    pub status: SessionStatus,
    pub meeting_id: Option<String>,
    pub meeting_url: Option<String>,
    pub meeting_password: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub rating: Option<i32>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrainingSession {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.trainer_id == user_id || self.trainee_id == user_id
    }

    /// Scheduled and within the start window either side of `scheduled_at`
    pub fn can_start(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Scheduled
            && (now - self.scheduled_at).num_seconds().abs() <= START_WINDOW_MINUTES * 60
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(self.duration_minutes as i64)
    }

    fn check(&self, next: SessionStatus) -> Result<(), DomainError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::InvalidSessionTransition {
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.check(SessionStatus::InProgress)?;
        if !self.can_start(now) {
            return Err(DomainError::SessionNotStartable);
        }
        self.status = SessionStatus::InProgress;
        self.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn complete(&mut self, notes: Option<String>, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.check(SessionStatus::Completed)?;
        self.status = SessionStatus::Completed;
        self.ended_at = Some(now);
        if notes.is_some() {
            self.notes = notes;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.check(SessionStatus::Cancelled)?;
        self.status = SessionStatus::Cancelled;
        if reason.is_some() {
            self.notes = reason;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Only once the scheduled time has passed
    pub fn mark_no_show(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.check(SessionStatus::NoShow)?;
        if now < self.scheduled_at {
            return Err(DomainError::InvalidSessionTransition {
                from: self.status.as_str().to_string(),
                to: SessionStatus::NoShow.as_str().to_string(),
            });
        }
        self.status = SessionStatus::NoShow;
        self.updated_at = now;
        Ok(())
    }

    pub fn rate(&mut self, rating: i32, feedback: Option<String>, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != SessionStatus::Completed {
            return Err(DomainError::SessionNotCompleted);
        }
        if self.rating.is_some() {
            return Err(DomainError::SessionAlreadyRated);
        }
        self.rating = Some(rating);
        self.feedback = feedback;
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    pub trainee_id: Uuid,
    #[validate(length(min = 2, max = 255, message = "Title must be between 2 and 255 characters"))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    #[validate(range(min = 15, max = 180, message = "Duration must be between 15 and 180 minutes"))]
    pub duration_minutes: i32,
    #[serde(default)]
    pub session_type: SessionType,
    #[serde(default)]
    pub training_mode: TrainingMode,
    #[validate(length(max = 255))]
    pub meeting_id: Option<String>,
    #[validate(url(message = "Meeting URL must be a valid URL"))]
    pub meeting_url: Option<String>,
    #[validate(length(max = 100))]
    pub meeting_password: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RescheduleRequest {
    pub scheduled_at: DateTime<Utc>,
    #[validate(range(min = 15, max = 180, message = "Duration must be between 15 and 180 minutes"))]
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SessionNotesRequest {
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RateSessionRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(max = 2000))]
    pub feedback: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    pub upcoming: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn session(status: SessionStatus, scheduled_at: DateTime<Utc>) -> TrainingSession {
        TrainingSession {
            id: Uuid::new_v4(),
            trainer_id: Uuid::new_v4(),
            trainee_id: Uuid::new_v4(),
            title: "Pilates".to_string(),
            description: None,
            scheduled_at,
            duration_minutes: 45,
            session_type: SessionType::Private,
            training_mode: TrainingMode::Online,
            status,
            meeting_id: None,
            meeting_url: None,
            meeting_password: None,
            started_at: None,
            ended_at: None,
            notes: None,
            rating: None,
            feedback: None,
            created_at: scheduled_at,
            updated_at: scheduled_at,
        }
    }

    #[test]
    fn test_start_window() {
        let at = Utc::now();
        let s = session(SessionStatus::Scheduled, at);

        assert!(s.can_start(at - Duration::minutes(15)));
        assert!(s.can_start(at + Duration::minutes(10)));
        assert!(!s.can_start(at - Duration::minutes(16)));
        assert!(!s.can_start(at + Duration::minutes(16)));
    }

    #[test]
    fn test_full_lifecycle() {
        let at = Utc::now();
        let mut s = session(SessionStatus::Scheduled, at);

        s.start(at).unwrap();
        assert_eq!(s.status, SessionStatus::InProgress);
        assert!(s.started_at.is_some());

        s.complete(Some("Great form".to_string()), at + Duration::minutes(45)).unwrap();
        assert_eq!(s.status, SessionStatus::Completed);
        assert_eq!(s.notes.as_deref(), Some("Great form"));

        s.rate(5, Some("Loved it".to_string()), at).unwrap();
        assert_eq!(s.rating, Some(5));
        assert_eq!(s.rate(4, None, at), Err(DomainError::SessionAlreadyRated));
    }

    #[test]
    fn test_start_too_early() {
        let at = Utc::now() + Duration::hours(2);
        let mut s = session(SessionStatus::Scheduled, at);
        assert_eq!(s.start(Utc::now()), Err(DomainError::SessionNotStartable));
    }

    #[test]
    fn test_invalid_transitions() {
        let at = Utc::now();
        let mut s = session(SessionStatus::Scheduled, at);
        assert_matches!(s.complete(None, at), Err(DomainError::InvalidSessionTransition { .. }));

        let mut done = session(SessionStatus::Completed, at);
        assert_matches!(done.cancel(None, at), Err(DomainError::InvalidSessionTransition { .. }));
    }

    #[test]
    fn test_rating_requires_completion() {
        let at = Utc::now();
        let mut s = session(SessionStatus::InProgress, at);
        assert_eq!(s.rate(5, None, at), Err(DomainError::SessionNotCompleted));
    }

    #[test]
    fn test_no_show_only_after_scheduled_time() {
        let at = Utc::now();
        let mut s = session(SessionStatus::Scheduled, at);
        assert!(s.mark_no_show(at - Duration::minutes(1)).is_err());
        s.mark_no_show(at + Duration::minutes(30)).unwrap();
        assert_eq!(s.status, SessionStatus::NoShow);

        let mut running = session(SessionStatus::InProgress, at);
        assert!(running.mark_no_show(at + Duration::hours(1)).is_err());
    }

    #[test]
    fn test_cancel_in_progress() {
        let at = Utc::now();
        let mut s = session(SessionStatus::InProgress, at);
        s.cancel(Some("Trainee unwell".to_string()), at).unwrap();
        assert_eq!(s.status, SessionStatus::Cancelled);
    }
}
