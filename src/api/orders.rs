use axum::{
    extract::{Path, Query, State},
    middleware,
    routing::{get, post},
    Extension, Router,
};
use uuid::Uuid;

use crate::api::response::{ApiResponse, ValidatedJson};
use crate::auth::{jwt_auth_middleware, AuthService, UserSession};
use crate::error::ApiResult;
use crate::models::{CreateOrderRequest, Order, OrderWithItems, PageParams, Paginated};
use crate::services::OrderService;

/// Orders placed by the signed-in user
pub fn order_routes(order_service: OrderService, auth_service: AuthService) -> Router {
    Router::new()
        .route("/", get(list_my_orders).post(create_order))
        .route("/:id", get(get_order))
        .route("/:id/cancel", post(cancel_order))
        .route_layer(middleware::from_fn_with_state(
            auth_service,
            jwt_auth_middleware,
        ))
        .with_state(order_service)
}

#[tracing::instrument(skip(order_service, session, request), fields(user_id = %session.user_id))]
async fn create_order(
    State(order_service): State<OrderService>,
    Extension(session): Extension<UserSession>,
    ValidatedJson(request): ValidatedJson<CreateOrderRequest>,
) -> ApiResult<ApiResponse<OrderWithItems>> {
    let order = order_service.create_order(session.user_id, request).await?;
    Ok(ApiResponse::created("Order created successfully", order))
}

#[tracing::instrument(skip(order_service, session), fields(user_id = %session.user_id))]
async fn list_my_orders(
    State(order_service): State<OrderService>,
    Extension(session): Extension<UserSession>,
    Query(page): Query<PageParams>,
) -> ApiResult<ApiResponse<Paginated<Order>>> {
    let orders = order_service.list_user_orders(session.user_id, page).await?;
    Ok(ApiResponse::ok(orders))
}

#[tracing::instrument(skip(order_service, session), fields(user_id = %session.user_id))]
async fn get_order(
    State(order_service): State<OrderService>,
    Extension(session): Extension<UserSession>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<ApiResponse<OrderWithItems>> {
    let order = order_service.get_order(&session, order_id).await?;
    Ok(ApiResponse::ok(order))
}

#[tracing::instrument(skip(order_service, session), fields(user_id = %session.user_id))]
async fn cancel_order(
    State(order_service): State<OrderService>,
    Extension(session): Extension<UserSession>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Order>> {
    let order = order_service.cancel_order(&session, order_id).await?;
    Ok(ApiResponse::with_message("Order cancelled successfully", order))
}
