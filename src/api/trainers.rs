use axum::{
    extract::{Path, Query, State},
    middleware,
    routing::get,
    Extension, Router,
};
use uuid::Uuid;

use crate::api::response::{ApiResponse, ValidatedJson};
use crate::auth::{jwt_auth_middleware, AuthService, UserRole, UserSession};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    PageParams, Paginated, TrainerListing, TrainerProfile, UpsertTrainerProfile, UserResponse,
};
use crate::services::TrainerService;

/// Public trainer directory plus the trainer's own profile and roster
pub fn trainer_routes(trainer_service: TrainerService, auth_service: AuthService) -> Router {
    let directory = Router::new()
        .route("/", get(list_trainers))
        .route("/:id", get(get_trainer));

    let own = Router::new()
        .route("/me/profile", get(my_profile).put(update_my_profile))
        .route("/me/trainees", get(my_trainees))
        .route_layer(middleware::from_fn_with_state(
            auth_service,
            jwt_auth_middleware,
        ));

    directory.merge(own).with_state(trainer_service)
}

/// The `/me` routes belong to trainer accounts only; admins manage profiles elsewhere
fn own_trainer_id(session: &UserSession) -> ApiResult<Uuid> {
    if session.role != UserRole::Trainer {
        return Err(ApiError::Forbidden("Only trainers have a trainer profile".to_string()));
    }
    Ok(session.user_id)
}

async fn list_trainers(
    State(trainer_service): State<TrainerService>,
    Query(page): Query<PageParams>,
) -> ApiResult<ApiResponse<Paginated<TrainerListing>>> {
    Ok(ApiResponse::ok(trainer_service.list_trainers(page).await?))
}

async fn get_trainer(
    State(trainer_service): State<TrainerService>,
    Path(trainer_id): Path<Uuid>,
) -> ApiResult<ApiResponse<TrainerListing>> {
    Ok(ApiResponse::ok(trainer_service.get_trainer(trainer_id).await?))
}

async fn my_profile(
    State(trainer_service): State<TrainerService>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<ApiResponse<TrainerProfile>> {
    Ok(ApiResponse::ok(trainer_service.get_profile(own_trainer_id(&session)?).await?))
}

#[tracing::instrument(skip(trainer_service, session, request), fields(user_id = %session.user_id))]
async fn update_my_profile(
    State(trainer_service): State<TrainerService>,
    Extension(session): Extension<UserSession>,
    ValidatedJson(request): ValidatedJson<UpsertTrainerProfile>,
) -> ApiResult<ApiResponse<TrainerProfile>> {
    let profile = trainer_service
        .upsert_profile(own_trainer_id(&session)?, request)
        .await?;
    Ok(ApiResponse::with_message("Profile updated successfully", profile))
}

async fn my_trainees(
    State(trainer_service): State<TrainerService>,
    Extension(session): Extension<UserSession>,
    Query(page): Query<PageParams>,
) -> ApiResult<ApiResponse<Paginated<UserResponse>>> {
    Ok(ApiResponse::ok(
        trainer_service.list_trainees(own_trainer_id(&session)?, page).await?,
    ))
}
