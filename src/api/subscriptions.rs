use axum::{
    extract::{Path, Query, State},
    middleware,
    routing::{get, post},
    Extension, Router,
};
use uuid::Uuid;

use crate::api::response::{ApiResponse, ValidatedJson};
use crate::auth::{jwt_auth_middleware, AuthService, UserSession};
use crate::error::{ApiError, ApiResult};
use crate::models::{PageParams, Paginated, SubscribeRequest, SubscriptionPlan, SubscriptionResponse};
use crate::services::SubscriptionService;

/// Public plan catalogue plus the signed-in user's subscriptions
pub fn subscription_routes(
    subscription_service: SubscriptionService,
    auth_service: AuthService,
) -> Router {
    let plans = Router::new()
        .route("/plans", get(list_plans))
        .route("/plans/:id", get(get_plan));

    let protected = Router::new()
        .route("/", get(my_subscriptions).post(subscribe))
        .route("/current", get(current_subscription))
        .route("/:id/cancel", post(cancel_subscription))
        .route_layer(middleware::from_fn_with_state(
            auth_service,
            jwt_auth_middleware,
        ));

    plans.merge(protected).with_state(subscription_service)
}

async fn list_plans(
    State(subscription_service): State<SubscriptionService>,
) -> ApiResult<ApiResponse<Vec<SubscriptionPlan>>> {
    Ok(ApiResponse::ok(subscription_service.list_plans(false).await?))
}

async fn get_plan(
    State(subscription_service): State<SubscriptionService>,
    Path(plan_id): Path<Uuid>,
) -> ApiResult<ApiResponse<SubscriptionPlan>> {
    let plan = subscription_service.get_plan(plan_id).await?;
    if !plan.is_active {
        return Err(ApiError::not_found("Plan"));
    }
    Ok(ApiResponse::ok(plan))
}

#[tracing::instrument(skip(subscription_service, session, request), fields(user_id = %session.user_id))]
async fn subscribe(
    State(subscription_service): State<SubscriptionService>,
    Extension(session): Extension<UserSession>,
    ValidatedJson(request): ValidatedJson<SubscribeRequest>,
) -> ApiResult<ApiResponse<SubscriptionResponse>> {
    let subscription = subscription_service.subscribe(session.user_id, request).await?;
    Ok(ApiResponse::created("Subscription created successfully", subscription))
}

#[tracing::instrument(skip(subscription_service, session), fields(user_id = %session.user_id))]
async fn my_subscriptions(
    State(subscription_service): State<SubscriptionService>,
    Extension(session): Extension<UserSession>,
    Query(page): Query<PageParams>,
) -> ApiResult<ApiResponse<Paginated<SubscriptionResponse>>> {
    let subscriptions = subscription_service
        .user_subscriptions(session.user_id, page)
        .await?;
    Ok(ApiResponse::ok(subscriptions))
}

#[tracing::instrument(skip(subscription_service, session), fields(user_id = %session.user_id))]
async fn current_subscription(
    State(subscription_service): State<SubscriptionService>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<ApiResponse<Option<SubscriptionResponse>>> {
    let current = subscription_service.current_subscription(session.user_id).await?;
    let message = if current.is_some() {
        "Success"
    } else {
        "No active subscription"
    };
    Ok(ApiResponse::with_message(message, current))
}

#[tracing::instrument(skip(subscription_service, session), fields(user_id = %session.user_id))]
async fn cancel_subscription(
    State(subscription_service): State<SubscriptionService>,
    Extension(session): Extension<UserSession>,
    Path(subscription_id): Path<Uuid>,
) -> ApiResult<ApiResponse<SubscriptionResponse>> {
    let subscription = subscription_service.cancel(&session, subscription_id).await?;
    Ok(ApiResponse::with_message(
        "Subscription cancelled successfully",
        subscription,
    ))
}
