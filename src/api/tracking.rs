use axum::{
    extract::{Path, Query, State},
    middleware,
    routing::{delete, get},
    Extension, Router,
};
use uuid::Uuid;

use crate::api::response::{ApiResponse, ValidatedJson};
use crate::auth::{jwt_auth_middleware, AuthService, UserSession};
use crate::error::ApiResult;
use crate::models::{
    CreateMeal, CreateProgress, CreateWorkout, Meal, PageParams, Paginated, ProgressEntry, Workout,
};
use crate::services::TrackingService;

/// Personal workout, meal and progress logs
pub fn tracking_routes(tracking_service: TrackingService, auth_service: AuthService) -> Router {
    Router::new()
        .route("/workouts", get(list_workouts).post(create_workout))
        .route("/workouts/:id", delete(delete_workout))
        .route("/meals", get(list_meals).post(create_meal))
        .route("/meals/:id", delete(delete_meal))
        .route("/progress", get(list_progress).post(create_progress))
        .route("/progress/:id", delete(delete_progress))
        .route_layer(middleware::from_fn_with_state(
            auth_service,
            jwt_auth_middleware,
        ))
        .with_state(tracking_service)
}

#[tracing::instrument(skip(tracking_service, session, request), fields(user_id = %session.user_id))]
async fn create_workout(
    State(tracking_service): State<TrackingService>,
    Extension(session): Extension<UserSession>,
    ValidatedJson(request): ValidatedJson<CreateWorkout>,
) -> ApiResult<ApiResponse<Workout>> {
    let workout = tracking_service.create_workout(session.user_id, request).await?;
    Ok(ApiResponse::created("Workout logged", workout))
}

async fn list_workouts(
    State(tracking_service): State<TrackingService>,
    Extension(session): Extension<UserSession>,
    Query(page): Query<PageParams>,
) -> ApiResult<ApiResponse<Paginated<Workout>>> {
    Ok(ApiResponse::ok(
        tracking_service.list_workouts(session.user_id, page).await?,
    ))
}

async fn delete_workout(
    State(tracking_service): State<TrackingService>,
    Extension(session): Extension<UserSession>,
    Path(workout_id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    tracking_service.delete_workout(session.user_id, workout_id).await?;
    Ok(ApiResponse::message("Workout deleted"))
}

#[tracing::instrument(skip(tracking_service, session, request), fields(user_id = %session.user_id))]
async fn create_meal(
    State(tracking_service): State<TrackingService>,
    Extension(session): Extension<UserSession>,
    ValidatedJson(request): ValidatedJson<CreateMeal>,
) -> ApiResult<ApiResponse<Meal>> {
    let meal = tracking_service.create_meal(session.user_id, request).await?;
    Ok(ApiResponse::created("Meal logged", meal))
}

async fn list_meals(
    State(tracking_service): State<TrackingService>,
    Extension(session): Extension<UserSession>,
    Query(page): Query<PageParams>,
) -> ApiResult<ApiResponse<Paginated<Meal>>> {
    Ok(ApiResponse::ok(
        tracking_service.list_meals(session.user_id, page).await?,
    ))
}

async fn delete_meal(
    State(tracking_service): State<TrackingService>,
    Extension(session): Extension<UserSession>,
    Path(meal_id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    tracking_service.delete_meal(session.user_id, meal_id).await?;
    Ok(ApiResponse::message("Meal deleted"))
}

#[tracing::instrument(skip(tracking_service, session, request), fields(user_id = %session.user_id))]
async fn create_progress(
    State(tracking_service): State<TrackingService>,
    Extension(session): Extension<UserSession>,
    ValidatedJson(request): ValidatedJson<CreateProgress>,
) -> ApiResult<ApiResponse<ProgressEntry>> {
    let entry = tracking_service.create_progress(session.user_id, request).await?;
    Ok(ApiResponse::created("Progress recorded", entry))
}

async fn list_progress(
    State(tracking_service): State<TrackingService>,
    Extension(session): Extension<UserSession>,
    Query(page): Query<PageParams>,
) -> ApiResult<ApiResponse<Paginated<ProgressEntry>>> {
    Ok(ApiResponse::ok(
        tracking_service.list_progress(session.user_id, page).await?,
    ))
}

async fn delete_progress(
    State(tracking_service): State<TrackingService>,
    Extension(session): Extension<UserSession>,
    Path(entry_id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    tracking_service.delete_progress(session.user_id, entry_id).await?;
    Ok(ApiResponse::message("Progress entry deleted"))
}
