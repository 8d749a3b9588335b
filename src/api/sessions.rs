use axum::{
    extract::{Path, Query, State},
    middleware,
    routing::{get, post, put},
    Extension, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::response::{ApiResponse, ValidatedJson};
use crate::auth::{
    jwt_auth_middleware, trainee_only_middleware, trainer_only_middleware, AuthService,
    UserSession,
};
use crate::error::ApiResult;
use crate::models::{
    CreateSessionRequest, PageParams, Paginated, RateSessionRequest, RescheduleRequest,
    SessionFilter, SessionNotesRequest, TrainingSession,
};
use crate::services::{CompletedSession, TrainingSessionService};

#[derive(Debug, Deserialize, Validate)]
struct CancelSessionRequest {
    #[validate(length(max = 1000))]
    reason: Option<String>,
}

/// Training sessions; every route requires a signed-in user
pub fn session_routes(session_service: TrainingSessionService, auth_service: AuthService) -> Router {
    let trainer_only = || middleware::from_fn(trainer_only_middleware);

    Router::new()
        .route(
            "/",
            get(list_sessions).merge(post(create_session).route_layer(trainer_only())),
        )
        .route("/:id", get(get_session))
        .route("/:id/start", post(start_session).route_layer(trainer_only()))
        .route("/:id/complete", post(complete_session).route_layer(trainer_only()))
        .route("/:id/cancel", post(cancel_session))
        .route("/:id/no-show", post(mark_no_show).route_layer(trainer_only()))
        .route("/:id/reschedule", put(reschedule_session).route_layer(trainer_only()))
        .route("/:id/notes", put(update_notes).route_layer(trainer_only()))
        .route(
            "/:id/rate",
            post(rate_session).route_layer(middleware::from_fn(trainee_only_middleware)),
        )
        .route_layer(middleware::from_fn_with_state(
            auth_service,
            jwt_auth_middleware,
        ))
        .with_state(session_service)
}

#[tracing::instrument(skip(session_service, session, request), fields(user_id = %session.user_id))]
async fn create_session(
    State(session_service): State<TrainingSessionService>,
    Extension(session): Extension<UserSession>,
    ValidatedJson(request): ValidatedJson<CreateSessionRequest>,
) -> ApiResult<ApiResponse<TrainingSession>> {
    let created = session_service.create_session(&session, request).await?;
    Ok(ApiResponse::created("Session scheduled successfully", created))
}

#[tracing::instrument(skip(session_service, session), fields(user_id = %session.user_id))]
async fn list_sessions(
    State(session_service): State<TrainingSessionService>,
    Extension(session): Extension<UserSession>,
    Query(page): Query<PageParams>,
    Query(filter): Query<SessionFilter>,
) -> ApiResult<ApiResponse<Paginated<TrainingSession>>> {
    let sessions = session_service.list_sessions(&session, &filter, page).await?;
    Ok(ApiResponse::ok(sessions))
}

async fn get_session(
    State(session_service): State<TrainingSessionService>,
    Extension(session): Extension<UserSession>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<ApiResponse<TrainingSession>> {
    Ok(ApiResponse::ok(session_service.get_session(&session, session_id).await?))
}

#[tracing::instrument(skip(session_service, session), fields(user_id = %session.user_id))]
async fn start_session(
    State(session_service): State<TrainingSessionService>,
    Extension(session): Extension<UserSession>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<ApiResponse<TrainingSession>> {
    let started = session_service.start_session(&session, session_id).await?;
    Ok(ApiResponse::with_message("Session started", started))
}

#[tracing::instrument(skip(session_service, session, request), fields(user_id = %session.user_id))]
async fn complete_session(
    State(session_service): State<TrainingSessionService>,
    Extension(session): Extension<UserSession>,
    Path(session_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<SessionNotesRequest>,
) -> ApiResult<ApiResponse<CompletedSession>> {
    let completed = session_service
        .complete_session(&session, session_id, request.notes)
        .await?;
    Ok(ApiResponse::with_message("Session completed", completed))
}

#[tracing::instrument(skip(session_service, session, request), fields(user_id = %session.user_id))]
async fn cancel_session(
    State(session_service): State<TrainingSessionService>,
    Extension(session): Extension<UserSession>,
    Path(session_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<CancelSessionRequest>,
) -> ApiResult<ApiResponse<TrainingSession>> {
    let cancelled = session_service
        .cancel_session(&session, session_id, request.reason)
        .await?;
    Ok(ApiResponse::with_message("Session cancelled successfully", cancelled))
}

#[tracing::instrument(skip(session_service, session), fields(user_id = %session.user_id))]
async fn mark_no_show(
    State(session_service): State<TrainingSessionService>,
    Extension(session): Extension<UserSession>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<ApiResponse<TrainingSession>> {
    let updated = session_service.mark_no_show(&session, session_id).await?;
    Ok(ApiResponse::with_message("Session marked as no-show", updated))
}

#[tracing::instrument(skip(session_service, session, request), fields(user_id = %session.user_id))]
async fn reschedule_session(
    State(session_service): State<TrainingSessionService>,
    Extension(session): Extension<UserSession>,
    Path(session_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<RescheduleRequest>,
) -> ApiResult<ApiResponse<TrainingSession>> {
    let updated = session_service
        .reschedule_session(&session, session_id, request)
        .await?;
    Ok(ApiResponse::with_message("Session rescheduled", updated))
}

async fn update_notes(
    State(session_service): State<TrainingSessionService>,
    Extension(session): Extension<UserSession>,
    Path(session_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<SessionNotesRequest>,
) -> ApiResult<ApiResponse<TrainingSession>> {
    let updated = session_service
        .update_notes(&session, session_id, request.notes)
        .await?;
    Ok(ApiResponse::with_message("Notes updated successfully", updated))
}

#[tracing::instrument(skip(session_service, session, request), fields(user_id = %session.user_id))]
async fn rate_session(
    State(session_service): State<TrainingSessionService>,
    Extension(session): Extension<UserSession>,
    Path(session_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<RateSessionRequest>,
) -> ApiResult<ApiResponse<TrainingSession>> {
    let rated = session_service
        .rate_session(&session, session_id, request)
        .await?;
    Ok(ApiResponse::with_message("Rating submitted successfully", rated))
}
